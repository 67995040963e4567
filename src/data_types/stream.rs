use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::common::LatLng;

pub const LATLNG_CHANNEL: &str = "latlng";

/// One channel of an activity stream (`time`, `distance`, `latlng`, ...).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamChannel {
    pub r#type: String,

    #[serde(default)]
    pub data: Vec<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Raw multi-channel samples as returned by the remote. Channels can come
/// in any order.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct TrackStream {
    channels: Vec<StreamChannel>,
}

impl TrackStream {
    pub fn new(channels: Vec<StreamChannel>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[StreamChannel] {
        &self.channels
    }

    pub fn channel(&self, kind: &str) -> Option<&StreamChannel> {
        self.channels.iter().find(|channel| channel.r#type == kind)
    }

    /// GPS samples in `[lat, lng]` order. Malformed samples are dropped.
    pub fn latlngs(&self) -> Vec<LatLng> {
        let Some(channel) = self.channel(LATLNG_CHANNEL) else {
            return Vec::new();
        };

        channel
            .data
            .iter()
            .filter_map(|sample| match sample.as_array()?.as_slice() {
                [lat, lng, ..] => Some([lat.as_f64()?, lng.as_f64()?]),
                _ => None,
            })
            .collect()
    }
}
