use crate::{
    data_types::{activity::{ActivityListCache, ActivityRecord}, athlete::AthleteId},
    database::list_cache::ListCacheStore,
    error::Result,
    logerrln, logln, logvbln, logwarnln,
    strava::ActivitySource,
    util::{
        facilities::{Facilities, Required},
        DateTimeUtils,
    },
};

use super::track_fetcher::{RunContext, TrackFetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Re-list the whole range and refetch tracks of changed activities.
    Refresh,
    /// Only list what started after the newest cached activity.
    CheckForNewer,
    /// Use the stored list as is.
    CacheOnly,
}

impl SyncMode {
    pub fn needs_remote(self) -> bool {
        self != SyncMode::CacheOnly
    }
}

pub struct ActivityListSync<'a, S: ActivitySource> {
    athlete_id: AthleteId,
    page_size: usize,
    store: &'a ListCacheStore,
    dependencies: &'a Facilities<'a, S>,
}

impl<'a, S: ActivitySource> ActivityListSync<'a, S> {
    const CC: &'static str = "ActivityListSync";

    pub fn new(
        dependencies: &'a Facilities<'a, S>,
        store: &'a ListCacheStore,
        athlete_id: AthleteId,
        page_size: usize,
    ) -> Self {
        Self {
            athlete_id,
            page_size: page_size.max(1),
            store,
            dependencies,
        }
    }

    /// Pages through `(after, before)` until an empty page. A failing page
    /// ends the listing; whatever was gathered so far is returned.
    pub async fn list_new_activities(&self, after: i64, before: i64) -> Result<Vec<ActivityRecord>> {
        let source = self.dependencies.activity_source()?;

        logln!(
            "listing from {} to {}",
            DateTimeUtils::timestamp_to_str(after),
            DateTimeUtils::timestamp_to_str(before)
        );

        let mut activities = Vec::new();
        let mut page = 1;

        loop {
            match source
                .list_activities(self.athlete_id, after, before, page, self.page_size)
                .await
            {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    logvbln!("page {}: {} activities", page, batch.len());
                    activities.extend(batch);
                    page += 1;
                }
                Err(e) => {
                    logwarnln!("listing stopped at page {}: {}", page, e);
                    break;
                }
            }
        }

        logln!("listed {} activities", activities.len());
        Ok(activities)
    }

    /// Brings the stored list up to date according to `mode` and returns it.
    /// Failing to save the merged list is logged, not returned.
    ///
    /// Refresh forces a track fetch for every new or changed activity,
    /// drawing on the same budget as the later fetch phase.
    pub async fn synchronize(
        &self,
        mode: SyncMode,
        from_stamp: Option<i64>,
        to_stamp: Option<i64>,
        fetcher: &TrackFetcher<'_, S>,
        ctx: &RunContext,
    ) -> Result<ActivityListCache> {
        let mut cache = self.store.load()?;

        if mode.needs_remote() {
            self.dependencies.check(&[Required::ActivitySource])?;
        }

        match mode {
            SyncMode::CacheOnly => {
                logln!("using {} cached activities", cache.len());
                return Ok(cache);
            }
            SyncMode::CheckForNewer => {
                let after = cache
                    .newest()
                    .and_then(|newest| DateTimeUtils::zulu2ts(&newest.start_date))
                    .unwrap_or(0);
                let fetched = self
                    .list_new_activities(after, DateTimeUtils::now_ts())
                    .await?;

                logln!("{} newer activities", fetched.len());
                cache.extend(fetched);
            }
            SyncMode::Refresh => {
                let fetched = self
                    .list_new_activities(
                        from_stamp.unwrap_or(0),
                        to_stamp.unwrap_or_else(DateTimeUtils::now_ts),
                    )
                    .await?;

                let mut changed = Vec::new();
                for activity in fetched {
                    match cache.position(activity.id) {
                        None => {
                            logvbln!("new activity {}", activity.id);
                            changed.push(activity.clone());
                            cache.push(activity);
                        }
                        Some(index) => {
                            let differs = cache
                                .get(index)
                                .is_some_and(|cached| cached.metadata_differs(&activity));
                            if differs {
                                logvbln!("activity {} changed", activity.id);
                                changed.push(activity.clone());
                                cache.replace(index, activity);
                            }
                        }
                    }
                }

                logln!("{} new or changed activities", changed.len());
                for activity in &changed {
                    if let Err(e) = fetcher.resolve_track(activity, true, ctx).await {
                        logerrln!("track refresh of {} failed: {}", activity.id, e);
                    }
                }
            }
        }

        cache.normalize();
        // A failed store leaves the previous file in place.
        if let Err(e) = self.store.store(&cache) {
            logerrln!(
                "activity list not saved to {}, previous file kept: {}",
                self.store.path().display(),
                e
            );
        }

        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::{
        activity::tests::activity, common::ActivityId, stream::TrackStream,
    };
    use crate::database::stream_cache::StreamCache;
    use crate::error::Error;
    use crate::util::facilities::DependenciesBuilder;
    use std::sync::Mutex;

    /// Serves `listing` in pages; fails on `failing_page` if set.
    struct PagedSource {
        listing: Vec<ActivityRecord>,
        failing_page: Option<usize>,
        requests: Mutex<Vec<(i64, i64, usize, usize)>>,
        streams: Mutex<Vec<ActivityId>>,
    }

    impl PagedSource {
        fn new(listing: Vec<ActivityRecord>) -> Self {
            Self {
                listing,
                failing_page: None,
                requests: Mutex::new(vec![]),
                streams: Mutex::new(vec![]),
            }
        }
    }

    impl ActivitySource for PagedSource {
        async fn list_activities(
            &self,
            _athlete_id: AthleteId,
            after: i64,
            before: i64,
            page: usize,
            per_page: usize,
        ) -> Result<Vec<ActivityRecord>> {
            self.requests
                .lock()
                .unwrap()
                .push((after, before, page, per_page));

            if self.failing_page == Some(page) {
                return Err(Error::Remote {
                    status: 500,
                    message: "boom".to_string(),
                });
            }

            Ok(self
                .listing
                .iter()
                .skip((page - 1) * per_page)
                .take(per_page)
                .cloned()
                .collect())
        }

        async fn fetch_stream(
            &self,
            activity_id: ActivityId,
            _channels: &[&str],
            _resolution: &str,
        ) -> Result<TrackStream> {
            self.streams.lock().unwrap().push(activity_id);
            Ok(TrackStream::default())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: ListCacheStore,
        streams: StreamCache,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        Fixture {
            store: ListCacheStore::new(dir.path().join("allActivities.json")),
            streams: StreamCache::new(dir.path()),
            _dir: dir,
        }
    }

    fn ids(cache: &ActivityListCache) -> Vec<ActivityId> {
        cache.as_slice().iter().map(|a| a.id).collect()
    }

    #[tokio::test]
    async fn pagination_stops_on_empty_page() {
        let f = fixture();
        let source = PagedSource::new(vec![
            activity(1, "2023-01-01T00:00:00Z"),
            activity(2, "2023-01-02T00:00:00Z"),
            activity(3, "2023-01-03T00:00:00Z"),
        ]);
        let facilities = DependenciesBuilder::new()
            .with_activity_source(Some(&source))
            .build();
        let sync = ActivityListSync::new(&facilities, &f.store, 1, 2);

        let listed = sync.list_new_activities(10, 20).await.unwrap();

        assert_eq!(listed.len(), 3);
        let requests = source.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![(10, 20, 1, 2), (10, 20, 2, 2), (10, 20, 3, 2)]
        );
    }

    #[tokio::test]
    async fn failing_page_keeps_earlier_pages() {
        let f = fixture();
        let mut source = PagedSource::new(vec![
            activity(1, "2023-01-01T00:00:00Z"),
            activity(2, "2023-01-02T00:00:00Z"),
            activity(3, "2023-01-03T00:00:00Z"),
        ]);
        source.failing_page = Some(2);
        let facilities = DependenciesBuilder::new()
            .with_activity_source(Some(&source))
            .build();
        let sync = ActivityListSync::new(&facilities, &f.store, 1, 2);

        let listed = sync.list_new_activities(0, 20).await.unwrap();
        assert_eq!(listed.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn check_for_newer_starts_after_newest_cached() {
        let f = fixture();
        f.store
            .store(&ActivityListCache::new(vec![
                activity(2, "2023-01-02T00:00:00Z"),
                activity(1, "2023-01-01T00:00:00Z"),
            ]))
            .unwrap();

        let source = PagedSource::new(vec![activity(3, "2023-01-03T00:00:00Z")]);
        let facilities = DependenciesBuilder::new()
            .with_activity_source(Some(&source))
            .build();
        let sync = ActivityListSync::new(&facilities, &f.store, 1, 200);
        let fetcher = TrackFetcher::new(Some(&source), &f.streams);
        let ctx = RunContext::new(10);

        let cache = sync
            .synchronize(SyncMode::CheckForNewer, None, None, &fetcher, &ctx)
            .await
            .unwrap();

        assert_eq!(ids(&cache), vec![3, 2, 1]);
        assert_eq!(
            source.requests.lock().unwrap()[0].0,
            DateTimeUtils::zulu2ts("2023-01-02T00:00:00Z").unwrap()
        );
        assert_eq!(f.store.load().unwrap(), cache);
        // Listing alone never downloads tracks.
        assert!(source.streams.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_refetches_only_changed_metadata() {
        let f = fixture();
        f.store
            .store(&ActivityListCache::new(vec![
                activity(2, "2023-01-02T00:00:00Z"),
                activity(1, "2023-01-01T00:00:00Z"),
            ]))
            .unwrap();

        let mut renamed = activity(1, "2023-01-01T00:00:00Z");
        renamed.name = "Renamed".to_string();
        let mut more_kudos = activity(2, "2023-01-02T00:00:00Z");
        more_kudos.kudos_count = Some(12);
        more_kudos.has_kudoed = Some(true);
        let brand_new = activity(3, "2023-01-03T00:00:00Z");

        let source = PagedSource::new(vec![brand_new, more_kudos, renamed]);
        let facilities = DependenciesBuilder::new()
            .with_activity_source(Some(&source))
            .build();
        let sync = ActivityListSync::new(&facilities, &f.store, 1, 200);
        let fetcher = TrackFetcher::new(Some(&source), &f.streams);
        let ctx = RunContext::new(10);

        let cache = sync
            .synchronize(SyncMode::Refresh, None, Some(1_700_000_000), &fetcher, &ctx)
            .await
            .unwrap();

        assert_eq!(ids(&cache), vec![3, 2, 1]);
        assert_eq!(cache.get(2).unwrap().name, "Renamed");
        // Kudos alone do not count as a change.
        assert_eq!(cache.get(1).unwrap().kudos_count, Some(0));

        let mut fetched = source.streams.lock().unwrap().clone();
        fetched.sort();
        assert_eq!(fetched, vec![1, 3]);
        assert_eq!(ctx.remaining(), 8);
        assert_eq!(source.requests.lock().unwrap()[0].1, 1_700_000_000);
    }

    #[tokio::test]
    async fn unsaved_merge_is_still_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allActivities.json");
        let store = ListCacheStore::new(&path).with_backup_stamp(|| 7);
        let streams = StreamCache::new(dir.path());
        store
            .store(&ActivityListCache::new(vec![activity(1, "2023-01-01T00:00:00Z")]))
            .unwrap();
        let before = std::fs::read(&path).unwrap();
        std::fs::create_dir(dir.path().join("allActivities.json.7")).unwrap();

        let source = PagedSource::new(vec![activity(2, "2023-01-02T00:00:00Z")]);
        let facilities = DependenciesBuilder::new()
            .with_activity_source(Some(&source))
            .build();
        let sync = ActivityListSync::new(&facilities, &store, 1, 200);
        let fetcher = TrackFetcher::new(Some(&source), &streams);
        let ctx = RunContext::new(10);

        let cache = sync
            .synchronize(SyncMode::CheckForNewer, None, None, &fetcher, &ctx)
            .await
            .unwrap();

        assert_eq!(ids(&cache), vec![2, 1]);
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn cache_only_neither_calls_nor_writes() {
        let f = fixture();
        let facilities: Facilities<PagedSource> = DependenciesBuilder::new().build();
        let sync = ActivityListSync::new(&facilities, &f.store, 1, 200);
        let fetcher: TrackFetcher<PagedSource> = TrackFetcher::new(None, &f.streams);
        let ctx = RunContext::new(10);

        let cache = sync
            .synchronize(SyncMode::CacheOnly, None, None, &fetcher, &ctx)
            .await
            .unwrap();

        assert!(cache.is_empty());
        assert!(!f.store.path().exists());
    }

    #[tokio::test]
    async fn remote_modes_need_a_source() {
        let f = fixture();
        let facilities: Facilities<PagedSource> = DependenciesBuilder::new().build();
        let sync = ActivityListSync::new(&facilities, &f.store, 1, 200);
        let fetcher: TrackFetcher<PagedSource> = TrackFetcher::new(None, &f.streams);
        let ctx = RunContext::new(10);

        let result = sync
            .synchronize(SyncMode::Refresh, None, None, &fetcher, &ctx)
            .await;
        assert!(matches!(result, Err(Error::MissingDependency(_))));
    }
}
