use std::path::PathBuf;

use serde_json::Value;

use crate::{
    error::{Error, Result},
    logln,
    processors::kml::{GeoJsonConverter, TrackDocument},
};

/// Where finished documents go. Only `output_<unixMillis>.kml` names are
/// ever read back.
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    const CC: &'static str = "OutputStore";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn write(&self, document: &TrackDocument) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let path = self.dir.join(&document.file_name);
        std::fs::write(&path, &document.contents)?;
        logln!(
            "wrote {} tracks to {}",
            document.placemark_count,
            path.display()
        );

        Ok(path)
    }

    pub fn read(&self, file_name: &str) -> Result<String> {
        if !TrackDocument::is_valid_file_name(file_name) {
            return Err(Error::InvalidOutputName(file_name.to_string()));
        }

        Ok(std::fs::read_to_string(self.dir.join(file_name))?)
    }

    /// Hands a stored document to `converter` for the map view.
    pub fn geojson<C: GeoJsonConverter>(&self, file_name: &str, converter: &C) -> Result<Value> {
        let kml = self.read(file_name)?;
        converter.to_geojson(&kml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::kml::{KmlSerializer, DEFAULT_TITLE};
    use serde_json::json;

    struct CountingConverter;

    impl GeoJsonConverter for CountingConverter {
        fn to_geojson(&self, kml: &str) -> Result<Value> {
            Ok(json!({
                "type": "FeatureCollection",
                "features": vec![json!({}); kml.matches("<Placemark>").count()],
            }))
        }
    }

    #[test]
    fn written_documents_convert_through_the_collaborator() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("out"));
        let document = KmlSerializer::serialize(DEFAULT_TITLE, &[], 47.6, -122.33, 1234);

        let path = store.write(&document).unwrap();
        assert!(path.ends_with("out/output_1234.kml"));
        assert_eq!(store.read("output_1234.kml").unwrap(), document.contents);

        let geojson = store.geojson("output_1234.kml", &CountingConverter).unwrap();
        assert_eq!(geojson["features"], json!([]));
    }

    #[test]
    fn other_names_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());

        assert!(matches!(
            store.read("../config.toml"),
            Err(Error::InvalidOutputName(_))
        ));
        assert!(matches!(
            store.geojson("output_x.kml", &CountingConverter),
            Err(Error::InvalidOutputName(_))
        ));
    }
}
