use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::{
    data_types::activity::ActivityListCache,
    error::Result,
    logln, logwarnln,
    util::DateTimeUtils,
};

/// The activity list, kept in one JSON file. Every write first renames the
/// previous file to `<file>.<unixMillis>`.
pub struct ListCacheStore {
    path: PathBuf,
    backup_stamp: fn() -> i64,
}

impl ListCacheStore {
    const CC: &'static str = "ListCacheStore";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_stamp: DateTimeUtils::now_millis,
        }
    }

    /// Replaces the clock that suffixes backup names.
    pub fn with_backup_stamp(mut self, backup_stamp: fn() -> i64) -> Self {
        self.backup_stamp = backup_stamp;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty cache. So is a file that does not decode,
    /// whether as UTF-8 or as JSON: the caller then resynchronizes from
    /// scratch.
    pub fn load(&self) -> Result<ActivityListCache> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                logln!("no activity list cache at {}", self.path.display());
                return Ok(ActivityListCache::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<ActivityListCache>(&content) {
            Ok(cache) => {
                logln!("loaded {} cached activities", cache.len());
                Ok(cache)
            }
            Err(e) => {
                logwarnln!(
                    "activity list cache {} is corrupt, starting empty: {}",
                    self.path.display(),
                    e
                );
                Ok(ActivityListCache::default())
            }
        }
    }

    /// Moves the current file aside. Returns the backup path, or `None`
    /// when there was nothing to back up.
    pub fn rotate(&self) -> Result<Option<PathBuf>> {
        let mut backup = self.path.clone().into_os_string();
        backup.push(format!(".{}", (self.backup_stamp)()));
        let backup = PathBuf::from(backup);

        match std::fs::rename(&self.path, &backup) {
            Ok(()) => {
                logln!("previous activity list kept as {}", backup.display());
                Ok(Some(backup))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rotates, then writes `cache`. Nothing is written if the rotation
    /// fails, so the previous state is never lost.
    pub fn store(&self, cache: &ActivityListCache) -> Result<Option<PathBuf>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let backup = self.rotate()?;
        std::fs::write(&self.path, to_json(cache)?)?;

        logln!(
            "wrote {} activities to {}",
            cache.len(),
            self.path.display()
        );

        Ok(backup)
    }
}

/// One-space indented JSON, matching what earlier versions wrote.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::activity::tests::activity;

    #[test]
    fn missing_file_is_an_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = ListCacheStore::new(dir.path().join("allActivities.json"));

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allActivities.json");
        std::fs::write(&path, "[{\"id\": 1,").unwrap();

        let store = ListCacheStore::new(&path);
        assert!(store.load().unwrap().is_empty());
        // The corrupt file is left for inspection.
        assert!(path.exists());
    }

    #[test]
    fn non_utf8_file_is_an_empty_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allActivities.json");
        std::fs::write(&path, [0xff, 0xfe, b'[', b']']).unwrap();

        assert!(ListCacheStore::new(&path).load().unwrap().is_empty());
    }

    #[test]
    fn failed_rotation_leaves_the_previous_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allActivities.json");
        let store = ListCacheStore::new(&path).with_backup_stamp(|| 42);

        let first = ActivityListCache::new(vec![activity(1, "2023-01-01T08:00:00Z")]);
        store.store(&first).unwrap();
        // A directory already sits where the backup would go.
        std::fs::create_dir(dir.path().join("allActivities.json.42")).unwrap();

        let second = ActivityListCache::new(vec![activity(2, "2023-02-01T08:00:00Z")]);
        assert!(store.store(&second).is_err());
        assert_eq!(store.load().unwrap(), first);
    }

    #[test]
    fn store_keeps_a_backup_of_the_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ListCacheStore::new(dir.path().join("cache").join("allActivities.json"));

        let first = ActivityListCache::new(vec![activity(1, "2023-01-01T08:00:00Z")]);
        assert_eq!(store.store(&first).unwrap(), None);

        let second = ActivityListCache::new(vec![
            activity(2, "2023-02-01T08:00:00Z"),
            activity(1, "2023-01-01T08:00:00Z"),
        ]);
        let backup = store.store(&second).unwrap().expect("backup written");

        let backup_name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(backup_name.starts_with("allActivities.json."));
        assert!(backup_name["allActivities.json.".len()..]
            .bytes()
            .all(|b| b.is_ascii_digit()));

        let previous: ActivityListCache =
            serde_json::from_slice(&std::fs::read(&backup).unwrap()).unwrap();
        assert_eq!(previous, first);
        assert_eq!(store.load().unwrap(), second);
    }

    #[test]
    fn json_uses_single_space_indent() {
        let out = to_json(&serde_json::json!({ "a": 1 })).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n \"a\": 1\n}");
    }
}
