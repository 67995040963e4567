pub type ActivityId = i64;

/// `[latitude, longitude]`, the order the remote uses everywhere.
pub type LatLng = [f64; 2];

pub trait Identifiable {
    fn as_i64(&self) -> ActivityId;
}
