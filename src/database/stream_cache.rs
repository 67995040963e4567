use std::io::ErrorKind;
use std::path::PathBuf;

use crate::{
    data_types::{common::ActivityId, stream::TrackStream},
    error::Result,
    logvbln, logwarnln,
};

use super::list_cache::to_json;

/// One `<id>.json` file per activity. Entries are never invalidated; only a
/// forced fetch overwrites them.
pub struct StreamCache {
    dir: PathBuf,
}

impl StreamCache {
    const CC: &'static str = "StreamCache";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: ActivityId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn exists(&self, id: ActivityId) -> bool {
        self.path_for(id).is_file()
    }

    /// `None` when nothing usable is cached. An unparseable file counts as
    /// absent so the stream gets fetched again.
    pub fn load(&self, id: ActivityId) -> Result<Option<TrackStream>> {
        let path = self.path_for(id);
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&content) {
            Ok(stream) => Ok(Some(stream)),
            Err(e) => {
                logwarnln!("ignoring unreadable stream cache {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn store(&self, id: ActivityId, stream: &TrackStream) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.path_for(id);
        std::fs::write(&path, to_json(stream)?)?;
        logvbln!("wrote {}", path.display());

        Ok(path)
    }
}
