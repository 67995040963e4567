use futures_util::stream::{self, StreamExt};

use crate::{
    config::Config,
    data_types::{activity::ActivityRecord, stream::TrackStream},
    database::{list_cache::ListCacheStore, stream_cache::StreamCache},
    error::Result,
    logerrln, logln, logvbln,
    strava::ActivitySource,
    util::{facilities::Facilities, DateTimeUtils},
};

use self::{
    filter::{FilterCriteria, FilterEngine},
    kml::{KmlSerializer, Placemark, TrackDocument, DEFAULT_TITLE},
    simplifier::Simplifier,
    synchronizer::{ActivityListSync, SyncMode},
    track_fetcher::{RunContext, RunStats, TrackFetcher},
};

pub mod filter;
pub mod kml;
pub mod simplifier;
pub mod synchronizer;
pub mod track_fetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    LoadingCache,
    Refreshing,
    CheckingNewer,
    CacheOnly,
    Filtering,
    FetchingTracks,
    /// A fetch failed for a reason other than not-found; no new fetches start.
    ErrorAbort,
    Simplifying,
    Serializing,
    Done,
}

/// Everything one invocation needs beyond the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub mode: SyncMode,
    pub criteria: FilterCriteria,
    /// Overrides the configured tolerance when set.
    pub tolerance: Option<f64>,
    pub title: String,
}

impl RunRequest {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            criteria: FilterCriteria::default(),
            tolerance: None,
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// The filtered activities, newest first, including those without a track.
    pub activities: Vec<ActivityRecord>,
    pub document: TrackDocument,
    pub stats: RunStats,
    pub transitions: Vec<PipelineState>,
}

pub struct ActivitiesMapPipeline<'a, S: ActivitySource> {
    config: &'a Config,
    dependencies: &'a Facilities<'a, S>,
    list_store: ListCacheStore,
    state: PipelineState,
    transitions: Vec<PipelineState>,
}

impl<'a, S: ActivitySource> ActivitiesMapPipeline<'a, S> {
    const CC: &'static str = "Pipeline";

    pub fn new(config: &'a Config, dependencies: &'a Facilities<'a, S>) -> Self {
        Self {
            config,
            dependencies,
            list_store: ListCacheStore::new(config.list_cache_file()),
            state: PipelineState::Idle,
            transitions: vec![PipelineState::Idle],
        }
    }

    pub fn with_list_store(mut self, list_store: ListCacheStore) -> Self {
        self.list_store = list_store;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        logvbln!("{:?} -> {:?}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    /// Runs one invocation: synchronize, filter, resolve tracks, simplify
    /// and serialize. The document is produced even when fetching aborted.
    pub async fn run(&mut self, request: &RunRequest) -> Result<RunOutcome> {
        let config = self.config;
        let ctx = RunContext::new(config.max_tracks_at_a_time);
        let stream_cache = StreamCache::new(&config.cache_dir);
        let fetcher = TrackFetcher::new(self.dependencies.optional_activity_source(), &stream_cache);

        self.transition(PipelineState::LoadingCache);
        self.transition(match request.mode {
            SyncMode::Refresh => PipelineState::Refreshing,
            SyncMode::CheckForNewer => PipelineState::CheckingNewer,
            SyncMode::CacheOnly => PipelineState::CacheOnly,
        });

        let cache = ActivityListSync::new(
            self.dependencies,
            &self.list_store,
            config.athlete_id,
            config.page_size,
        )
        .synchronize(
            request.mode,
            request.criteria.from_stamp,
            request.criteria.to_stamp,
            &fetcher,
            &ctx,
        )
        .await?;

        self.transition(PipelineState::Filtering);
        let activities = FilterEngine::new(config).filter(cache.as_slice(), &request.criteria);

        self.transition(PipelineState::FetchingTracks);
        let tracks = self.fetch_tracks(&activities, &fetcher, &ctx).await;
        if ctx.is_aborted() {
            self.transition(PipelineState::ErrorAbort);
        } else {
            self.transition(PipelineState::Simplifying);
        }

        let tolerance = request.tolerance.or(config.tolerance);
        let placemarks: Vec<Placemark> = activities
            .iter()
            .zip(&tracks)
            .filter_map(|(activity, track)| {
                let points = track.as_ref()?.latlngs();
                if points.is_empty() {
                    logvbln!("{} has no GPS samples", activity.id);
                    return None;
                }

                Some(Placemark::for_activity(
                    activity,
                    Simplifier::simplify(&points, tolerance),
                ))
            })
            .collect();

        self.transition(PipelineState::Serializing);
        let document = KmlSerializer::serialize(
            &request.title,
            &placemarks,
            config.default_latitude,
            config.default_longitude,
            DateTimeUtils::now_millis(),
        );

        let stats = ctx.stats();
        logln!(
            "{} of {} activities mapped (remote calls: {}, cached: {}, skipped: {}, aborted: {})",
            document.placemark_count,
            activities.len(),
            stats.called,
            stats.cached,
            stats.skipped,
            stats.aborted
        );

        self.transition(PipelineState::Done);

        Ok(RunOutcome {
            activities,
            document,
            stats,
            transitions: self.transitions.clone(),
        })
    }

    /// Resolves every track with at most `max_concurrent_fetches` in flight,
    /// returning them in the order of `activities`.
    async fn fetch_tracks(
        &self,
        activities: &[ActivityRecord],
        fetcher: &TrackFetcher<'_, S>,
        ctx: &RunContext,
    ) -> Vec<Option<TrackStream>> {
        let mut resolved: Vec<(usize, Option<TrackStream>)> =
            stream::iter(activities.iter().enumerate())
                .map(|(index, activity)| async move {
                    match fetcher.resolve_track(activity, false, ctx).await {
                        Ok(resolved) => (index, resolved.into_track()),
                        Err(e) => {
                            logerrln!("no track for {}: {}", activity.id, e);
                            (index, None)
                        }
                    }
                })
                .buffer_unordered(self.config.max_concurrent_fetches.max(1))
                .collect()
                .await;

        resolved.sort_by_key(|(index, _)| *index);
        resolved.into_iter().map(|(_, track)| track).collect()
    }
}
