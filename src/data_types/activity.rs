use serde::de::Deserializer;
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::common::{ActivityId, Identifiable, LatLng};

/// One activity as listed by the remote. Fields the pipeline does not use
/// are kept in `extra` so the cached copy stays identical to the remote one.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ActivityRecord {
    pub id: ActivityId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub r#type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sport_type: Option<String>,

    /// UTC, e.g. "2023-05-01T14:02:11Z".
    #[serde(default)]
    pub start_date: String,

    /// Local wall-clock time with a misleading "Z" suffix.
    #[serde(default)]
    pub start_date_local: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,

    #[serde(default, deserialize_with = "nullable_latlng")]
    pub start_latlng: Vec<f64>,

    #[serde(default, deserialize_with = "nullable_latlng")]
    pub end_latlng: Vec<f64>,

    #[serde(default)]
    pub private: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kudos_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_kudoed: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn nullable_latlng<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let latlng: Option<Vec<f64>> = serde::Deserialize::deserialize(deserializer)?;
    Ok(latlng.unwrap_or_default())
}

impl ActivityRecord {
    /// The remote sends `[]` (or `null`) for activities recorded without GPS.
    pub fn start_latlng(&self) -> Option<LatLng> {
        match self.start_latlng.as_slice() {
            [lat, lng, ..] => Some([*lat, *lng]),
            _ => None,
        }
    }

    /// True when anything but the social counters changed.
    pub fn metadata_differs(&self, other: &ActivityRecord) -> bool {
        self.without_volatile() != other.without_volatile()
    }

    fn without_volatile(&self) -> ActivityRecord {
        ActivityRecord {
            kudos_count: None,
            has_kudoed: None,
            ..self.clone()
        }
    }

    /// `start_date_local` without its time of day.
    pub fn local_date_only(&self) -> &str {
        match self.start_date_local.find('T') {
            Some(idx) => &self.start_date_local[..idx],
            None => &self.start_date_local,
        }
    }
}

impl Identifiable for ActivityRecord {
    fn as_i64(&self) -> ActivityId {
        self.id
    }
}

/// The locally mirrored activity list, newest first.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct ActivityListCache {
    activities: Vec<ActivityRecord>,
}

impl ActivityListCache {
    pub fn new(activities: Vec<ActivityRecord>) -> Self {
        Self { activities }
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn as_slice(&self) -> &[ActivityRecord] {
        &self.activities
    }

    pub fn into_inner(self) -> Vec<ActivityRecord> {
        self.activities
    }

    /// First entry, which is the newest once the list is normalized.
    pub fn newest(&self) -> Option<&ActivityRecord> {
        self.activities.first()
    }

    pub fn position(&self, id: ActivityId) -> Option<usize> {
        self.activities.iter().position(|a| a.as_i64() == id)
    }

    pub fn get(&self, index: usize) -> Option<&ActivityRecord> {
        self.activities.get(index)
    }

    pub fn replace(&mut self, index: usize, activity: ActivityRecord) {
        self.activities[index] = activity;
    }

    pub fn push(&mut self, activity: ActivityRecord) {
        self.activities.push(activity);
    }

    pub fn extend(&mut self, activities: impl IntoIterator<Item = ActivityRecord>) {
        self.activities.extend(activities);
    }

    /// Sorts newest first by comparing `start_date_local` as plain strings,
    /// then drops entries whose id equals the one right before them.
    ///
    /// Only neighbours are compared: two copies of an id separated by a
    /// different activity with the same local start time both survive.
    pub fn normalize(&mut self) {
        self.activities
            .sort_by(|a, b| b.start_date_local.cmp(&a.start_date_local));
        self.activities.dedup_by_key(|a| a.as_i64());
    }
}
