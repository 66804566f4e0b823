//! Train composition and platform geometry.
//!
//! Purely descriptive: these types carry what the backend reports about the
//! coaches of a train and where they stop along the platform.

use serde::{Deserialize, Serialize};

/// A named stretch of a platform edge (e.g. sector "A").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTrackSector {
    pub name: String,
    /// Metres from the start of the track
    pub start_meter: f32,
    pub end_meter: f32,
}

impl StationTrackSector {
    pub fn length(&self) -> f32 {
        self.end_meter - self.start_meter
    }
}

/// A platform edge with its sectors, ordered by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationTrack {
    pub name: String,
    pub start_meter: f32,
    pub end_meter: f32,
    #[serde(default)]
    pub sectors: Vec<StationTrackSector>,
}

impl StationTrack {
    /// The sector containing `meter`, if any.
    pub fn sector_at(&self, meter: f32) -> Option<&StationTrackSector> {
        self.sectors
            .iter()
            .find(|sector| sector.start_meter <= meter && meter <= sector.end_meter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WagonClass {
    First,
    Second,
    Mixed,
    /// Locomotive, power car or other non-passenger vehicle
    Traction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WagonAttribute {
    Bistro,
    Wheelchair,
    Bike,
    Family,
    Quiet,
    AirCondition,
}

/// One coach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wagon {
    /// Coach number shown on the vehicle
    pub number: Option<u32>,
    pub class: WagonClass,
    /// Where the coach stops along the track
    pub track_sector: Option<StationTrackSector>,
    pub start_meter: Option<f32>,
    pub end_meter: Option<f32>,
    #[serde(default)]
    pub attributes: Vec<WagonAttribute>,
}

/// Coaches travelling together as one unit, usually under one train number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WagonGroup {
    pub designation: String,
    pub destination: Option<String>,
    pub wagons: Vec<Wagon>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WagonSequence {
    pub groups: Vec<WagonGroup>,
    pub track: Option<StationTrack>,
    /// Train runs in the reverse of the usual order
    #[serde(default)]
    pub reversed: bool,
}

impl WagonSequence {
    pub fn wagons(&self) -> impl Iterator<Item = &Wagon> {
        self.groups.iter().flat_map(|group| group.wagons.iter())
    }

    /// First coach carrying the given attribute.
    pub fn find_wagon(&self, attribute: WagonAttribute) -> Option<&Wagon> {
        self.wagons()
            .find(|wagon| wagon.attributes.contains(&attribute))
    }
}
