use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
    data_types::{activity::ActivityRecord, stream::TrackStream},
    database::stream_cache::StreamCache,
    error::Result,
    logerrln, logvbln, logwarnln,
    strava::{ActivitySource, STREAM_CHANNELS, STREAM_RESOLUTION},
};

/// Counters shared by every fetch of one invocation.
///
/// The budget is reserved before a remote call is issued, so concurrent
/// fetches can never exceed it.
#[derive(Debug)]
pub struct RunContext {
    remaining: AtomicUsize,
    called: AtomicUsize,
    cached: AtomicUsize,
    skipped: AtomicUsize,
    aborted: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub called: usize,
    pub cached: usize,
    pub skipped: usize,
    pub aborted: bool,
}

impl RunContext {
    pub fn new(budget: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(budget),
            called: AtomicUsize::new(0),
            cached: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            aborted: AtomicBool::new(false),
        }
    }

    /// Takes one unit of budget if any is left.
    fn try_reserve(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }

    fn skip(&self) -> usize {
        self.skipped.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            called: self.called.load(Ordering::SeqCst),
            cached: self.cached.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            aborted: self.is_aborted(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BudgetExhausted,
    MissingGeometry,
    NotFound,
    /// Nothing cached and no remote to ask.
    NoSource,
    /// An earlier fetch in the batch failed; nothing new is issued.
    BatchAborted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Track(TrackStream),
    Skipped(SkipReason),
}

impl Resolved {
    pub fn into_track(self) -> Option<TrackStream> {
        match self {
            Resolved::Track(stream) => Some(stream),
            Resolved::Skipped(_) => None,
        }
    }
}

pub struct TrackFetcher<'a, S: ActivitySource> {
    source: Option<&'a S>,
    cache: &'a StreamCache,
}

impl<'a, S: ActivitySource> TrackFetcher<'a, S> {
    const CC: &'static str = "TrackFetcher";

    /// Without a source only cached streams can be resolved.
    pub fn new(source: Option<&'a S>, cache: &'a StreamCache) -> Self {
        Self { source, cache }
    }

    /// Resolves one activity's stream, from the cache unless `force`,
    /// otherwise with a budgeted remote call.
    ///
    /// Not-found and missing-geometry cases come back as `Skipped`. Any other
    /// remote failure flags the batch as aborted and is returned as `Err`.
    pub async fn resolve_track(
        &self,
        activity: &ActivityRecord,
        force: bool,
        ctx: &RunContext,
    ) -> Result<Resolved> {
        let id = activity.id;

        if !force {
            if let Some(stream) = self.cache.load(id)? {
                ctx.cached.fetch_add(1, Ordering::SeqCst);
                return Ok(Resolved::Track(stream));
            }
        }

        if ctx.is_aborted() {
            logvbln!("not requesting {}: batch aborted", id);
            return Ok(Resolved::Skipped(SkipReason::BatchAborted));
        }

        let Some(source) = self.source else {
            let skipped = ctx.skip();
            logvbln!("not downloading {}: no remote source (skipped: {})", id, skipped);
            return Ok(Resolved::Skipped(SkipReason::NoSource));
        };

        if ctx.remaining() > 0 && activity.start_latlng().is_none() {
            let skipped = ctx.skip();
            logvbln!("not downloading {}: no start latlng (skipped: {})", id, skipped);
            return Ok(Resolved::Skipped(SkipReason::MissingGeometry));
        }

        // Another fetch may have taken the last unit since the check above.
        if !ctx.try_reserve() {
            let skipped = ctx.skip();
            logvbln!("not downloading {}: remote call budget spent (skipped: {})", id, skipped);
            return Ok(Resolved::Skipped(SkipReason::BudgetExhausted));
        }

        ctx.called.fetch_add(1, Ordering::SeqCst);
        match source
            .fetch_stream(id, &STREAM_CHANNELS, STREAM_RESOLUTION)
            .await
        {
            Ok(stream) => {
                if let Err(e) = self.cache.store(id, &stream) {
                    logwarnln!("stream of {} used but not cached: {}", id, e);
                }
                Ok(Resolved::Track(stream))
            }
            Err(e) if e.is_not_found() => {
                let skipped = ctx.skip();
                logwarnln!("{} {} not found (skipped: {})", id, activity.name, skipped);
                Ok(Resolved::Skipped(SkipReason::NotFound))
            }
            Err(e) => {
                ctx.skip();
                ctx.abort();
                logerrln!("fetching {} failed, no further requests this run: {}", id, e);
                Err(e)
            }
        }
    }
}
