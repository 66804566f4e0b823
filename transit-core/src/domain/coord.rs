//! Geographic coordinates.
//!
//! Backends report positions in a variety of units; the canonical model
//! stores them as integer micro-degrees so that equality is exact.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres, as used by the haversine formula.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 coordinate in units of 1e-6 degrees.
///
/// # Examples
///
/// ```
/// use transit_core::domain::Coordinate;
///
/// let berlin = Coordinate::from_degrees(52.525589, 13.369548);
/// assert_eq!(berlin.lat, 52_525_589);
/// assert_eq!(berlin.lon, 13_369_548);
/// assert_eq!(berlin.to_string(), "52.525589:13.369548");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in micro-degrees
    pub lat: i32,
    /// Longitude in micro-degrees
    pub lon: i32,
}

impl Coordinate {
    /// Creates a coordinate from micro-degree components.
    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    /// Creates a coordinate from decimal degrees, rounding to the nearest micro-degree.
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * 1e6).round() as i32,
            lon: (lon * 1e6).round() as i32,
        }
    }

    /// Latitude in decimal degrees.
    pub fn lat_degrees(&self) -> f64 {
        f64::from(self.lat) / 1e6
    }

    /// Longitude in decimal degrees.
    pub fn lon_degrees(&self) -> f64 {
        f64::from(self.lon) / 1e6
    }

    /// Great-circle distance to another coordinate, in metres.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.lat_degrees().to_radians();
        let lat2 = other.lat_degrees().to_radians();
        let dlat = lat2 - lat1;
        let dlon = (other.lon_degrees() - self.lon_degrees()).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().asin()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lat_degrees(), self.lon_degrees())
    }
}

/// Serde helper for paths encoded as a flat `[lat, lon, lat, lon, ...]` array.
pub(crate) mod flat_path {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Coordinate;

    pub fn serialize<S>(path: &[Coordinate], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(path.iter().flat_map(|c| [c.lat, c.lon]))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Coordinate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let flat = Vec::<i32>::deserialize(deserializer)?;
        if flat.len() % 2 != 0 {
            return Err(D::Error::custom("path must contain lat/lon pairs"));
        }
        Ok(flat
            .chunks_exact(2)
            .map(|pair| Coordinate::new(pair[0], pair[1]))
            .collect())
    }
}
