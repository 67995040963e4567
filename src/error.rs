//! Crate-wide error type.
//!
//! Only a few of these ever reach the caller of a pipeline run: the track
//! fetcher absorbs `NotFound`, the list cache recovers from unparseable
//! files, and remote failures during a fetch batch only stop further
//! fetches.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The remote reported the activity or its stream as absent.
    #[error("remote resource not found: {0}")]
    NotFound(String),

    #[error("remote request failed with status {status}: {message}")]
    Remote { status: u32, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] curl::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid time stamp: {0:?}")]
    InvalidStamp(String),

    #[error("missing dependency: {0}")]
    MissingDependency(&'static str),

    #[error("not an output document name: {0:?}")]
    InvalidOutputName(String),

    #[error("GeoJSON conversion failed: {0}")]
    Conversion(String),
}

impl Error {
    /// `NotFound` is the benign remote failure: the activity is skipped and
    /// the batch carries on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
