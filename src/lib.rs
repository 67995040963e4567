use std::path::PathBuf;

use database::output::OutputStore;
use strava::{api::StravaApi, auth::Auth, ActivitySource};
use util::facilities::DependenciesBuilder;

pub use config::Config;
pub use error::{Error, Result};
pub use processors::{
    filter::{BoundingBox, FilterCriteria},
    synchronizer::SyncMode,
    track_fetcher::RunStats,
    ActivitiesMapPipeline, PipelineState, RunOutcome, RunRequest,
};

pub mod config;
pub mod data_types;
pub mod database;
pub mod error;
pub mod processors;
pub mod strava;
pub mod util;

/// Entry point for one configured athlete. `S` is the remote the pipeline
/// talks to; without one only cached data is used.
pub struct App<S: ActivitySource = StravaApi> {
    config: Config,
    source: Option<S>,
}

impl App<StravaApi> {
    /// Uses the configured access token, if any, against the real remote.
    pub fn new(config: Config) -> Self {
        let source = config.access_token.clone().map(StravaApi::new);
        Self { config, source }
    }

    /// A token given for this run takes precedence over the configured one.
    pub fn with_access_token(self, token: Option<String>) -> Self {
        match token {
            Some(token) => Self {
                source: Some(StravaApi::new(token)),
                ..self
            },
            None => self,
        }
    }
}

impl<S: ActivitySource> App<S> {
    const CC: &'static str = "App";

    pub fn with_source(config: Config, source: Option<S>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Mode used when the caller does not pick one.
    pub fn default_mode(&self) -> SyncMode {
        if self.has_source() {
            SyncMode::CheckForNewer
        } else {
            SyncMode::CacheOnly
        }
    }

    pub fn output_store(&self) -> OutputStore {
        OutputStore::new(&self.config.output_dir)
    }

    pub fn auth(&self) -> Result<Auth> {
        Auth::from_config(&self.config)
    }

    /// Runs the pipeline and writes the resulting document. Returns where it
    /// was written along with the run's outcome.
    pub async fn run(&self, request: &RunRequest) -> Result<(PathBuf, RunOutcome)> {
        logln!("run in {:?} mode", request.mode);

        let dependencies = DependenciesBuilder::new()
            .with_activity_source(self.source.as_ref())
            .build();

        let outcome = ActivitiesMapPipeline::new(&self.config, &dependencies)
            .run(request)
            .await?;
        let path = self.output_store().write(&outcome.document)?;

        Ok((path, outcome))
    }
}
