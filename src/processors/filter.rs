use crate::{
    config::Config,
    data_types::{activity::ActivityRecord, common::LatLng},
    logln,
    util::DateTimeUtils,
};

/// Latitude/longitude window. Either corner may be left open.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub min: Option<LatLng>,
    pub max: Option<LatLng>,
}

impl BoundingBox {
    /// `center` plus or minus `distance` degrees on each axis.
    pub fn around(center: LatLng, distance: [f64; 2]) -> Self {
        Self {
            min: Some([center[0] - distance[0], center[1] - distance[1]]),
            max: Some([center[0] + distance[0], center[1] + distance[1]]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub category: Option<String>,
    pub include_private: bool,
    pub bounding_box: Option<BoundingBox>,
    /// Unix seconds, inclusive, compared with the UTC start date.
    pub from_stamp: Option<i64>,
    pub to_stamp: Option<i64>,
}

/// The independent predicates a criteria set is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStep {
    Category,
    Privacy,
    MinCorner,
    MaxCorner,
    FromStamp,
    ToStamp,
}

impl FilterStep {
    pub const ORDER: [FilterStep; 6] = [
        FilterStep::Category,
        FilterStep::Privacy,
        FilterStep::MinCorner,
        FilterStep::MaxCorner,
        FilterStep::FromStamp,
        FilterStep::ToStamp,
    ];

    fn label(self) -> &'static str {
        match self {
            FilterStep::Category => "type",
            FilterStep::Privacy => "excluding private",
            FilterStep::MinCorner => "min latlng",
            FilterStep::MaxCorner => "max latlng",
            FilterStep::FromStamp => "fromStamp",
            FilterStep::ToStamp => "toStamp",
        }
    }
}

pub struct FilterEngine<'a> {
    config: &'a Config,
}

impl<'a> FilterEngine<'a> {
    const CC: &'static str = "FilterEngine";

    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn filter(
        &self,
        activities: &[ActivityRecord],
        criteria: &FilterCriteria,
    ) -> Vec<ActivityRecord> {
        self.filter_in_order(activities, criteria, &FilterStep::ORDER)
    }

    /// Applies the active steps of `order` one after the other, logging how
    /// many activities survive each one.
    pub fn filter_in_order(
        &self,
        activities: &[ActivityRecord],
        criteria: &FilterCriteria,
        order: &[FilterStep],
    ) -> Vec<ActivityRecord> {
        logln!("initial activities: {}", activities.len());

        let mut desired: Vec<ActivityRecord> = activities.to_vec();
        for step in order {
            if !self.is_active(*step, criteria) {
                continue;
            }

            desired.retain(|activity| self.keeps(*step, activity, criteria));
            logln!("desired by {}: {}", step.label(), desired.len());
        }

        desired
    }

    fn is_active(&self, step: FilterStep, criteria: &FilterCriteria) -> bool {
        let bbox = criteria.bounding_box.unwrap_or_default();

        match step {
            FilterStep::Category => self.raw_types(criteria).is_some(),
            FilterStep::Privacy => !criteria.include_private,
            FilterStep::MinCorner => bbox.min.is_some(),
            FilterStep::MaxCorner => bbox.max.is_some(),
            FilterStep::FromStamp => criteria.from_stamp.is_some(),
            FilterStep::ToStamp => criteria.to_stamp.is_some(),
        }
    }

    fn keeps(&self, step: FilterStep, activity: &ActivityRecord, criteria: &FilterCriteria) -> bool {
        let bbox = criteria.bounding_box.unwrap_or_default();
        let start = activity.start_latlng();
        let started_at = || DateTimeUtils::zulu2ts(&activity.start_date);

        match step {
            FilterStep::Category => self
                .raw_types(criteria)
                .map_or(true, |types| types.iter().any(|t| *t == activity.r#type)),
            FilterStep::Privacy => !activity.private,
            // No start coordinate never passes a location filter.
            FilterStep::MinCorner => match (start, bbox.min) {
                (Some([lat, lng]), Some([min_lat, min_lng])) => lat > min_lat && lng > min_lng,
                (_, None) => true,
                (None, Some(_)) => false,
            },
            FilterStep::MaxCorner => match (start, bbox.max) {
                (Some([lat, lng]), Some([max_lat, max_lng])) => lat < max_lat && lng < max_lng,
                (_, None) => true,
                (None, Some(_)) => false,
            },
            FilterStep::FromStamp => match criteria.from_stamp {
                Some(from) => started_at().is_some_and(|ts| ts >= from),
                None => true,
            },
            FilterStep::ToStamp => match criteria.to_stamp {
                Some(to) => started_at().is_some_and(|ts| ts <= to),
                None => true,
            },
        }
    }

    fn raw_types(&self, criteria: &FilterCriteria) -> Option<&'a [String]> {
        self.config.raw_types_for(criteria.category.as_deref())
    }
}
