//! Track point reduction.
//!
//! A radial-distance pass drops points closer than epsilon to the last kept
//! one, then Douglas-Peucker removes points within epsilon of the chord.
//! Both work on (longitude, latitude) degrees, so epsilon is in degrees too.

use geo::algorithm::simplify::Simplify;
use geo_types::{Coord, LineString};

use crate::data_types::common::LatLng;

/// GPS points in (longitude, latitude) order, ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedTrack(pub LineString<f64>);

impl SimplifiedTrack {
    pub fn len(&self) -> usize {
        self.0 .0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0 .0.is_empty()
    }

    pub fn points(&self) -> &[Coord<f64>] {
        &self.0 .0
    }

    /// `lng,lat,0` triples separated by single spaces.
    pub fn to_kml_coordinates(&self) -> String {
        self.points()
            .iter()
            .map(|c| format!("{},{},0", c.x, c.y))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub struct Simplifier;

impl Simplifier {
    /// Configured tolerances are expressed in 1/10,000 of a degree.
    pub const TOLERANCE_DIVISOR: f64 = 10_000.0;

    /// Reduces `points` (`[lat, lng]`) with the configured `tolerance`.
    /// No tolerance, or a non-positive one, keeps every point.
    pub fn simplify(points: &[LatLng], tolerance: Option<f64>) -> SimplifiedTrack {
        let coords: Vec<Coord<f64>> = points
            .iter()
            .map(|[lat, lng]| Coord { x: *lng, y: *lat })
            .collect();

        let epsilon = match tolerance {
            Some(t) if t.is_finite() && t > 0.0 => t / Simplifier::TOLERANCE_DIVISOR,
            _ => return SimplifiedTrack(LineString::new(coords)),
        };

        if coords.len() <= 2 {
            return SimplifiedTrack(LineString::new(coords));
        }

        let radial = Simplifier::radial_distance(&coords, epsilon * epsilon);

        SimplifiedTrack(LineString::new(radial).simplify(&epsilon))
    }

    fn radial_distance(coords: &[Coord<f64>], sq_tolerance: f64) -> Vec<Coord<f64>> {
        let mut kept = Vec::with_capacity(coords.len());
        let mut prev = coords[0];
        kept.push(prev);

        let last_index = coords.len() - 1;
        let mut last_kept = 0;

        for (index, coord) in coords.iter().enumerate().skip(1) {
            if sq_dist(*coord, prev) > sq_tolerance {
                kept.push(*coord);
                prev = *coord;
                last_kept = index;
            }
        }

        if last_kept != last_index {
            kept.push(coords[last_index]);
        }

        kept
    }
}

fn sq_dist(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}
