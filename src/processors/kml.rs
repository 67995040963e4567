//! KML output.
//!
//! The map viewer and the GeoJSON converter both read this layout, so the
//! style block, the line style and the trailing `LookAt` must not change.

use serde_json::Value;

use crate::{data_types::activity::ActivityRecord, error::Result};

use super::simplifier::SimplifiedTrack;

pub const DEFAULT_TITLE: &str = "tracks";
pub const DEFAULT_RANGE: u32 = 135_000;

/// Turns a finished KML document into a GeoJSON feature collection for the
/// map view. Implemented outside this crate.
pub trait GeoJsonConverter {
    fn to_geojson(&self, kml: &str) -> Result<Value>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placemark {
    pub name: String,
    pub track: SimplifiedTrack,
}

impl Placemark {
    pub fn for_activity(activity: &ActivityRecord, track: SimplifiedTrack) -> Self {
        Self {
            name: Placemark::display_name(activity),
            track,
        }
    }

    /// `"{name} ({type}) {local date}"`.
    pub fn display_name(activity: &ActivityRecord) -> String {
        format!(
            "{} ({}) {}",
            activity.name,
            activity.r#type,
            activity.local_date_only()
        )
    }
}

/// A rendered document together with the name it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDocument {
    pub file_name: String,
    pub contents: String,
    pub placemark_count: usize,
}

impl TrackDocument {
    pub fn file_name_for(unix_millis: i64) -> String {
        format!("output_{}.kml", unix_millis)
    }

    /// Accepts exactly `output_<digits>.kml`.
    pub fn is_valid_file_name(name: &str) -> bool {
        name.strip_prefix("output_")
            .and_then(|rest| rest.strip_suffix(".kml"))
            .map(|stamp| !stamp.is_empty() && stamp.bytes().all(|b| b.is_ascii_digit()))
            .unwrap_or(false)
    }
}

pub struct KmlSerializer;

impl KmlSerializer {
    pub fn serialize(
        title: &str,
        placemarks: &[Placemark],
        center_lat: f64,
        center_long: f64,
        unix_millis: i64,
    ) -> TrackDocument {
        let mut contents = KmlSerializer::head(title);
        for placemark in placemarks {
            contents.push_str(&KmlSerializer::placemark(
                &placemark.name,
                &placemark.track.to_kml_coordinates(),
            ));
        }
        contents.push_str(&KmlSerializer::tail(center_lat, center_long, DEFAULT_RANGE));

        TrackDocument {
            file_name: TrackDocument::file_name_for(unix_millis),
            contents,
            placemark_count: placemarks.len(),
        }
    }

    pub fn head(title: &str) -> String {
        format!(
            r##"<?xml version="1.0" encoding="UTF-8"?><kml xmlns="http://www.opengis.net/kml/2.2" xmlns:gx="http://www.google.com/kml/ext/2.2" xmlns:kml="http://www.opengis.net/kml/2.2" xmlns:atom="http://www.w3.org/2005/Atom"><Folder>
        <Style id="theStyle">
                <IconStyle><scale>1.3</scale><Icon><href>http://maps.google.com/mapfiles/kml/pushpin/ylw-pushpin.png</href></Icon><hotSpot x="20" y="2" xunits="pixels" yunits="pixels"/></IconStyle>
                <LineStyle>
                        <color>ff0000ff</color>
                        <width>3</width>
                </LineStyle>
        </Style>
        <name>{}</name>
        <open>1</open>
        <styleUrl>#theStyle</styleUrl>
"##,
            escape(title)
        )
    }

    pub fn placemark(name: &str, coordinates: &str) -> String {
        format!(
            r##"
      <Placemark>
        <name>{}</name>
                <open>1</open>
                <styleUrl>#theStyle</styleUrl>
                <LineString><tessellate>1</tessellate>
                <coordinates>{}</coordinates>
                </LineString>
        </Placemark>
"##,
            escape(name),
            coordinates
        )
    }

    pub fn tail(lat: f64, long: f64, range: u32) -> String {
        format!(
            r##"
        <LookAt>
                <longitude>{}</longitude>
                <latitude>{}</latitude>
                <altitude>0</altitude>
                <heading>0</heading>
                <tilt>0</tilt>
                <range>{}</range>
                <altitudeMode>relativeToGround</altitudeMode>
        </LookAt>
</Folder>
</kml>
"##,
            long, lat, range
        )
    }
}

/// Activity names are free text.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::activity::tests::activity;
    use crate::processors::simplifier::Simplifier;

    #[test]
    fn placemark_names_use_local_date_only() {
        let mut record = activity(3, "2023-06-07T18:30:00Z");
        record.name = "Evening Run".to_string();

        assert_eq!(Placemark::display_name(&record), "Evening Run (Run) 2023-06-07");
    }

    #[test]
    fn document_has_style_placemarks_and_camera() {
        let track = Simplifier::simplify(&[[47.0, -122.0], [47.5, -122.25]], None);
        let placemarks = vec![
            Placemark {
                name: "A & B".to_string(),
                track: track.clone(),
            },
            Placemark {
                name: "C".to_string(),
                track,
            },
        ];

        let doc = KmlSerializer::serialize(DEFAULT_TITLE, &placemarks, 47.6, -122.33, 1700000000123);

        assert_eq!(doc.file_name, "output_1700000000123.kml");
        assert_eq!(doc.placemark_count, 2);
        assert!(doc.contents.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?><kml "));
        assert!(doc.contents.contains("<color>ff0000ff</color>"));
        assert!(doc.contents.contains("<width>3</width>"));
        assert!(doc.contents.contains("<name>tracks</name>"));
        assert!(doc.contents.contains("<name>A &amp; B</name>"));
        assert!(doc
            .contents
            .contains("<coordinates>-122,47,0 -122.25,47.5,0</coordinates>"));
        assert_eq!(doc.contents.matches("<Placemark>").count(), 2);
        assert!(doc.contents.contains("<longitude>-122.33</longitude>"));
        assert!(doc.contents.contains("<latitude>47.6</latitude>"));
        assert!(doc.contents.contains("<range>135000</range>"));
        assert!(doc.contents.trim_end().ends_with("</Folder>\n</kml>"));
    }

    #[test]
    fn empty_document_is_still_complete() {
        let doc = KmlSerializer::serialize(DEFAULT_TITLE, &[], 1.0, 2.0, 5);

        assert_eq!(doc.placemark_count, 0);
        assert!(doc.contents.contains("<styleUrl>#theStyle</styleUrl>"));
        assert!(doc.contents.contains("<LookAt>"));
    }

    #[test]
    fn output_names_are_validated() {
        assert!(TrackDocument::is_valid_file_name("output_1700000000000.kml"));
        assert!(!TrackDocument::is_valid_file_name("output_.kml"));
        assert!(!TrackDocument::is_valid_file_name("output_12a.kml"));
        assert!(!TrackDocument::is_valid_file_name("../output_12.kml"));
        assert!(!TrackDocument::is_valid_file_name("output_12.kml.bak"));
    }
}
