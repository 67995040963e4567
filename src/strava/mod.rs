//! Remote activity source.
//!
//! `ActivitySource` is the seam between the pipeline and the remote: the
//! synchronizer pages through `list_activities`, the track fetcher calls
//! `fetch_stream`. `api::StravaApi` is the real implementation; tests plug
//! in in-memory doubles.

use crate::{
    data_types::{
        activity::ActivityRecord, athlete::AthleteId, common::ActivityId, stream::TrackStream,
    },
    error::Result,
};

pub mod api;
pub mod auth;

pub const STREAM_CHANNELS: [&str; 3] = ["time", "distance", "latlng"];
pub const STREAM_RESOLUTION: &str = "medium";

#[allow(async_fn_in_trait)]
pub trait ActivitySource {
    /// One page of the athlete's activities started in `(after, before)`.
    /// An empty page marks the end of the listing.
    async fn list_activities(
        &self,
        athlete_id: AthleteId,
        after: i64,
        before: i64,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ActivityRecord>>;

    /// Fails with `Error::NotFound` when the remote has no such stream.
    async fn fetch_stream(
        &self,
        activity_id: ActivityId,
        channels: &[&str],
        resolution: &str,
    ) -> Result<TrackStream>;
}
