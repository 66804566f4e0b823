//! Departure boards.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::QueryJourneyDetailContext;

use super::{DomainError, Line, Location, Position};

/// One vehicle leaving a station.
///
/// Two departures are the same departure when planned time, destination and
/// line agree. Position, prediction and message are live data that differ
/// between snapshots of the same board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DepartureRepr")]
pub struct Departure {
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub planned_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub predicted_time: Option<DateTime<Utc>>,
    pub line: Line,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Location>,
    /// Occupancy levels per class, backend-specific scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "journeyId", default, skip_serializing_if = "Option::is_none")]
    pub journey_context: Option<QueryJourneyDetailContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wagon_sequence_context: Option<String>,
}

impl Departure {
    /// Returns `None` when neither time is known.
    pub fn new(
        planned_time: Option<DateTime<Utc>>,
        predicted_time: Option<DateTime<Utc>>,
        line: Line,
        destination: Option<Location>,
    ) -> Option<Self> {
        if planned_time.is_none() && predicted_time.is_none() {
            return None;
        }
        Some(Self {
            planned_time,
            predicted_time,
            line,
            position: None,
            destination,
            capacity: None,
            message: None,
            journey_context: None,
            wagon_sequence_context: None,
        })
    }

    /// Predicted time if known, else planned.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.predicted_time.or(self.planned_time)
    }

    pub fn delay(&self) -> Option<Duration> {
        Some(self.predicted_time? - self.planned_time?)
    }
}

/// Wire form of a [`Departure`]; decoding goes through [`Departure::new`]'s
/// time check.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepartureRepr {
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    planned_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    predicted_time: Option<DateTime<Utc>>,
    line: Line,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    destination: Option<Location>,
    #[serde(default)]
    capacity: Option<Vec<u8>>,
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "journeyId", default)]
    journey_context: Option<QueryJourneyDetailContext>,
    #[serde(default)]
    wagon_sequence_context: Option<String>,
}

impl TryFrom<DepartureRepr> for Departure {
    type Error = DomainError;

    fn try_from(repr: DepartureRepr) -> Result<Self, Self::Error> {
        let mut departure = Departure::new(repr.planned_time, repr.predicted_time, repr.line, repr.destination)
            .ok_or(DomainError::MissingTime("departure"))?;
        departure.position = repr.position;
        departure.capacity = repr.capacity;
        departure.message = repr.message;
        departure.journey_context = repr.journey_context;
        departure.wagon_sequence_context = repr.wagon_sequence_context;
        Ok(departure)
    }
}

impl PartialEq for Departure {
    fn eq(&self, other: &Self) -> bool {
        self.planned_time == other.planned_time
            && self.destination == other.destination
            && self.line == other.line
    }
}

impl Eq for Departure {}

impl Hash for Departure {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.planned_time.hash(state);
        self.destination.hash(state);
        self.line.hash(state);
    }
}

/// A line serving a station, with the destination it runs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineDestination {
    pub line: Line,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<Location>,
}

/// The departure board of one station.
///
/// Departures and lines only change through the `&mut self` merge methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationDepartures {
    stop_location: Location,
    departures: Vec<Departure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lines: Option<Vec<LineDestination>>,
}

impl StationDepartures {
    pub fn new(
        stop_location: Location,
        departures: Vec<Departure>,
        lines: Option<Vec<LineDestination>>,
    ) -> Self {
        Self {
            stop_location,
            departures,
            lines,
        }
    }

    pub fn stop_location(&self) -> &Location {
        &self.stop_location
    }

    pub fn departures(&self) -> &[Departure] {
        &self.departures
    }

    pub fn lines(&self) -> Option<&[LineDestination]> {
        self.lines.as_deref()
    }

    /// Adds departures not already on the board, keeping board order.
    /// Returns how many were added.
    pub fn add_departures(&mut self, departures: impl IntoIterator<Item = Departure>) -> usize {
        let before = self.departures.len();
        for departure in departures {
            if !self.departures.contains(&departure) {
                self.departures.push(departure);
            }
        }
        self.departures.len() - before
    }

    pub fn add_lines(&mut self, lines: impl IntoIterator<Item = LineDestination>) {
        let known = self.lines.get_or_insert_with(Vec::new);
        for line in lines {
            if !known.contains(&line) {
                known.push(line);
            }
        }
    }

    /// Orders departures by effective time. Departures without any time
    /// go last; the sort is stable.
    pub fn sort_departures(&mut self) {
        self.departures
            .sort_by_key(|departure| (departure.time().is_none(), departure.time()));
    }

    /// Folds another board into this one, dropping duplicates, then re-sorts.
    pub fn merge(&mut self, other: StationDepartures) {
        self.add_departures(other.departures);
        if let Some(lines) = other.lines {
            self.add_lines(lines);
        }
        self.sort_departures();
    }

    /// Collapses boards for the same station into one board each, in order
    /// of first appearance.
    pub fn merge_equivalent_boards(boards: Vec<StationDepartures>) -> Vec<StationDepartures> {
        let mut merged: Vec<StationDepartures> = Vec::with_capacity(boards.len());
        for board in boards {
            match merged
                .iter_mut()
                .find(|existing| existing.stop_location == board.stop_location)
            {
                Some(existing) => existing.merge(board),
                None => merged.push(board),
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;
    use chrono::TimeZone;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn s1() -> Line {
        Line::new(Some("MVV".into()), Some(Product::SuburbanTrain), Some("S1".into()))
    }

    fn freising() -> Location {
        Location::named_station("8000107", None, "Freising").unwrap()
    }

    fn dep(h: u32, m: u32) -> Departure {
        Departure::new(Some(t(h, m)), None, s1(), Some(freising())).unwrap()
    }

    #[test]
    fn equality_ignores_live_data() {
        let mut a = dep(9, 0);
        let mut b = dep(9, 0);
        a.predicted_time = Some(t(9, 4));
        a.position = Some(Position::new("1"));
        b.message = Some("Bauarbeiten".into());
        assert_eq!(a, b);

        let c = dep(9, 20);
        assert_ne!(a, c);
    }

    #[test]
    fn time_and_delay() {
        let mut d = dep(9, 0);
        assert_eq!(d.time(), Some(t(9, 0)));
        assert_eq!(d.delay(), None);

        d.predicted_time = Some(t(9, 7));
        assert_eq!(d.time(), Some(t(9, 7)));
        assert_eq!(d.delay(), Some(Duration::minutes(7)));

        assert!(Departure::new(None, None, s1(), None).is_none());
    }

    #[test]
    fn merge_dedupes_and_sorts() {
        let marienplatz = Location::named_station("8000261", Some("München"), "Marienplatz").unwrap();
        let mut board = StationDepartures::new(marienplatz.clone(), vec![dep(9, 20), dep(9, 0)], None);
        let other = StationDepartures::new(
            marienplatz,
            vec![dep(9, 0), dep(9, 10)],
            Some(vec![LineDestination {
                line: s1(),
                destination: Some(freising()),
            }]),
        );

        board.merge(other);

        let times: Vec<_> = board.departures().iter().filter_map(Departure::time).collect();
        assert_eq!(times, vec![t(9, 0), t(9, 10), t(9, 20)]);
        assert_eq!(board.lines().map(<[_]>::len), Some(1));
    }

    #[test]
    fn merge_equivalent_boards_groups_by_station() {
        let a = Location::station("A").unwrap();
        let b = Location::station("B").unwrap();
        let boards = vec![
            StationDepartures::new(a.clone(), vec![dep(9, 0)], None),
            StationDepartures::new(b.clone(), vec![dep(9, 5)], None),
            StationDepartures::new(a.clone(), vec![dep(8, 55), dep(9, 0)], None),
        ];

        let merged = StationDepartures::merge_equivalent_boards(boards);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].stop_location(), &a);
        assert_eq!(merged[0].departures().len(), 2);
        assert_eq!(merged[1].stop_location(), &b);
    }

    #[test]
    fn departure_keys() {
        let mut d = dep(9, 0);
        d.capacity = Some(vec![1, 2]);
        d.wagon_sequence_context = Some("ws-1".into());
        let json = serde_json::to_value(&d).unwrap();

        assert_eq!(json["plannedTime"], t(9, 0).timestamp_millis());
        assert!(json.get("predictedTime").is_none());
        assert_eq!(json["line"]["label"], "S1");
        assert_eq!(json["destination"]["name"], "Freising");
        assert_eq!(json["capacity"], serde_json::json!([1, 2]));
        assert_eq!(json["wagonSequenceContext"], "ws-1");

        let back: Departure = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
        assert_eq!(back.capacity, d.capacity);
    }

    #[test]
    fn departure_without_times_rejected() {
        let mut json = serde_json::to_value(dep(9, 0)).unwrap();
        json.as_object_mut().unwrap().remove("plannedTime");
        let err = serde_json::from_value::<Departure>(json).unwrap_err();
        assert!(err.to_string().contains("missing required time data"));
    }
}
