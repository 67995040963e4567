//! Typed configuration, read once at process start.
//!
//! The public file (`config.toml`) holds everything that may be checked in;
//! credentials live in an optional `secrets.toml` overlay.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_derive::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub redirect_uri: String,
    pub athlete_id: i64,

    pub default_latitude: f64,
    pub default_longitude: f64,
    pub location_distance_lat: f64,
    pub location_distance_long: f64,

    /// Divided by 10,000 before use. 10 is about one city block;
    /// 0.5 to 1 removes most GPS jitter. Absent or 0 disables simplification.
    pub tolerance: Option<f64>,

    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,

    /// Remote stream calls allowed per invocation. Keep it under the
    /// remote's 15 minute rate limit and re-run later to continue.
    pub max_tracks_at_a_time: usize,
    pub page_size: usize,
    pub max_concurrent_fetches: usize,

    /// Category shown to users -> raw remote activity types.
    /// An empty list selects every type.
    pub activity_types: BTreeMap<String, Vec<String>>,

    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Secrets {
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    redirect_uri: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let activity_types = [
            ("Foot", vec!["Run", "Walk", "Hike"]),
            ("Bike", vec!["Ride"]),
            ("Run", vec!["Run"]),
            ("Hike", vec!["Hike"]),
            ("Walk", vec!["Walk"]),
            ("All", vec![]),
        ]
        .into_iter()
        .map(|(category, types)| {
            (
                category.to_string(),
                types.into_iter().map(str::to_string).collect(),
            )
        })
        .collect();

        Self {
            redirect_uri: "http://localhost:8080".to_string(),
            athlete_id: 373707,
            default_latitude: 47.6,
            default_longitude: -122.33,
            location_distance_lat: 2.0,
            location_distance_long: 2.0,
            tolerance: Some(0.6),
            cache_dir: PathBuf::from("cache"),
            output_dir: PathBuf::from("out"),
            max_tracks_at_a_time: 550,
            page_size: 200,
            max_concurrent_fetches: 8,
            activity_types,
            client_id: None,
            client_secret: None,
            access_token: None,
        }
    }
}

impl Config {
    /// Loads `public` (defaults when the file does not exist) and applies
    /// the `secrets` overlay when present.
    pub fn load(public: &Path, secrets: Option<&Path>) -> Result<Self> {
        let mut config = if public.exists() {
            Self::from_toml(public, &std::fs::read_to_string(public)?)?
        } else {
            Self::default()
        };

        if let Some(secrets_path) = secrets.filter(|path| path.exists()) {
            let content = std::fs::read_to_string(secrets_path)?;
            let secrets: Secrets = toml::from_str(&content).map_err(|source| Error::Config {
                path: secrets_path.to_path_buf(),
                source,
            })?;
            config.apply_secrets(secrets);
        }

        Ok(config)
    }

    fn from_toml(path: &Path, content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_secrets(&mut self, secrets: Secrets) {
        if secrets.client_id.is_some() {
            self.client_id = secrets.client_id;
        }
        if secrets.client_secret.is_some() {
            self.client_secret = secrets.client_secret;
        }
        if secrets.access_token.is_some() {
            self.access_token = secrets.access_token;
        }
        if let Some(redirect_uri) = secrets.redirect_uri {
            self.redirect_uri = redirect_uri;
        }
    }

    /// Raw remote types for `category`. `None` means "do not filter by type",
    /// which covers unset, unknown and all-types categories alike.
    pub fn raw_types_for(&self, category: Option<&str>) -> Option<&[String]> {
        let category = category.filter(|c| !c.is_empty())?;

        self.activity_types
            .get(category)
            .filter(|types| !types.is_empty())
            .map(Vec::as_slice)
    }

    pub fn list_cache_file(&self) -> PathBuf {
        self.cache_dir.join("allActivities.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml"), None).unwrap();

        assert_eq!(config.max_tracks_at_a_time, 550);
        assert_eq!(config.tolerance, Some(0.6));
        assert_eq!(config.list_cache_file(), PathBuf::from("cache/allActivities.json"));
    }

    #[test]
    fn secrets_overlay_public_values() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("config.toml");
        let secrets = dir.path().join("secrets.toml");

        std::fs::write(
            &public,
            "tolerance = 1.5\ncache_dir = \"c\"\nclient_id = \"public\"\n\n[activity_types]\nBike = [\"Ride\", \"EBikeRide\"]\n",
        )
        .unwrap();
        std::fs::write(&secrets, "client_id = \"42\"\naccess_token = \"abc\"\n").unwrap();

        let config = Config::load(&public, Some(&secrets)).unwrap();

        assert_eq!(config.tolerance, Some(1.5));
        assert_eq!(config.cache_dir, PathBuf::from("c"));
        assert_eq!(config.client_id.as_deref(), Some("42"));
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert_eq!(config.page_size, 200);
        assert_eq!(config.activity_types.len(), 1);
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("config.toml");
        std::fs::write(&public, "tolerance = [").unwrap();

        match Config::load(&public, None) {
            Err(Error::Config { path, .. }) => assert_eq!(path, public),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn categories_resolve_to_raw_types() {
        let config = Config::default();

        assert_eq!(
            config.raw_types_for(Some("Foot")).unwrap(),
            &["Run".to_string(), "Walk".to_string(), "Hike".to_string()]
        );
        assert!(config.raw_types_for(Some("All")).is_none());
        assert!(config.raw_types_for(Some("")).is_none());
        assert!(config.raw_types_for(Some("Swim")).is_none());
        assert!(config.raw_types_for(None).is_none());
    }
}
