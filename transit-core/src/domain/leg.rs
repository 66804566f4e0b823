//! Trip legs.
//!
//! A `Leg` is one continuous segment of a trip: either a ride on a public
//! transport line or an individual movement (walking, cycling, driving, a
//! station transfer). Both variants answer the same time queries, so most
//! callers never need to look inside.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::QueryJourneyDetailContext;

use super::coord::flat_path;
use super::{Coordinate, DomainError, Line, Location, Stop, StopEvent, format_distance};

/// Times of one leg end, cached from the validated stop event.
#[derive(Debug, Clone, Copy, PartialEq)]
struct EndTimes {
    time: DateTime<Utc>,
    planned: DateTime<Utc>,
    min: DateTime<Utc>,
    max: DateTime<Utc>,
}

impl From<&StopEvent> for EndTimes {
    fn from(event: &StopEvent) -> Self {
        Self {
            time: event.time(),
            planned: event.planned_or_predicted(),
            min: event.min_time(),
            max: event.max_time(),
        }
    }
}

/// A ride on a public transport line.
///
/// Times are validated at construction: the departure stop must have a
/// departure side and the arrival stop an arrival side, so the time
/// accessors never fail.
///
/// # Examples
///
/// ```
/// use transit_core::domain::{Line, Location, Product, PublicLeg, Stop, StopEvent};
/// use chrono::{TimeZone, Utc};
///
/// let dep = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
/// let arr = Utc.with_ymd_and_hms(2024, 3, 15, 10, 25, 0).unwrap();
///
/// let leg = PublicLeg::new(
///     Line::new(None, Some(Product::RegionalTrain), Some("RE 1".into())),
///     None,
///     Stop::new(Location::station("8000207").unwrap(), None, Some(StopEvent::planned(dep))),
///     Stop::new(Location::station("8000001").unwrap(), Some(StopEvent::planned(arr)), None),
/// )
/// .unwrap();
///
/// assert_eq!(leg.departure_time(), dep);
/// assert_eq!(leg.arrival_time(), arr);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublicLegRepr", into = "PublicLegRepr")]
pub struct PublicLeg {
    line: Line,
    destination: Option<Location>,
    departure_stop: Stop,
    arrival_stop: Stop,
    intermediate_stops: Vec<Stop>,
    message: Option<String>,
    path: Vec<Coordinate>,
    journey_context: Option<QueryJourneyDetailContext>,
    // Cached validated times (guaranteed present - validated at construction)
    departure: EndTimes,
    arrival: EndTimes,
}

impl PublicLeg {
    /// Constructs a leg, validating that both ends have times.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the departure stop has no departure side or the
    /// arrival stop has no arrival side.
    pub fn new(
        line: Line,
        destination: Option<Location>,
        departure_stop: Stop,
        arrival_stop: Stop,
    ) -> Result<Self, DomainError> {
        let departure = departure_stop
            .departure()
            .map(EndTimes::from)
            .ok_or(DomainError::MissingTime("departure stop has no departure"))?;
        let arrival = arrival_stop
            .arrival()
            .map(EndTimes::from)
            .ok_or(DomainError::MissingTime("arrival stop has no arrival"))?;

        Ok(Self {
            line,
            destination,
            departure_stop,
            arrival_stop,
            intermediate_stops: Vec::new(),
            message: None,
            path: Vec::new(),
            journey_context: None,
            departure,
            arrival,
        })
    }

    /// Sets the stops between departure and arrival, in travel order.
    pub fn with_intermediate_stops(mut self, stops: Vec<Stop>) -> Self {
        self.intermediate_stops = stops;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_path(mut self, path: Vec<Coordinate>) -> Self {
        self.path = path;
        self
    }

    /// Attaches the context used to fetch this journey's full detail.
    pub fn with_journey_context(mut self, context: QueryJourneyDetailContext) -> Self {
        self.journey_context = Some(context);
        self
    }

    pub fn line(&self) -> &Line {
        &self.line
    }

    /// Final destination of the vehicle (not necessarily where this leg ends).
    pub fn destination(&self) -> Option<&Location> {
        self.destination.as_ref()
    }

    pub fn departure_stop(&self) -> &Stop {
        &self.departure_stop
    }

    pub fn arrival_stop(&self) -> &Stop {
        &self.arrival_stop
    }

    pub fn intermediate_stops(&self) -> &[Stop] {
        &self.intermediate_stops
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    pub fn journey_context(&self) -> Option<&QueryJourneyDetailContext> {
        self.journey_context.as_ref()
    }

    pub fn departure(&self) -> &Location {
        self.departure_stop.location()
    }

    pub fn arrival(&self) -> &Location {
        self.arrival_stop.location()
    }

    /// Departure time, predicted if known.
    pub fn departure_time(&self) -> DateTime<Utc> {
        self.departure.time
    }

    /// Arrival time, predicted if known.
    pub fn arrival_time(&self) -> DateTime<Utc> {
        self.arrival.time
    }

    /// Planned departure, or the predicted one if the backend sent no plan.
    pub fn planned_departure_time(&self) -> DateTime<Utc> {
        self.departure.planned
    }

    /// Planned arrival, or the predicted one if the backend sent no plan.
    pub fn planned_arrival_time(&self) -> DateTime<Utc> {
        self.arrival.planned
    }

    pub fn min_time(&self) -> DateTime<Utc> {
        self.departure.min
    }

    pub fn max_time(&self) -> DateTime<Utc> {
        self.arrival.max
    }

    pub fn duration(&self) -> Duration {
        self.arrival.time - self.departure.time
    }

    /// True if the vehicle does not depart from the boarding stop or does
    /// not arrive at the alighting stop.
    pub fn is_cancelled(&self) -> bool {
        self.departure_stop.is_departure_cancelled() || self.arrival_stop.is_arrival_cancelled()
    }

    pub fn set_departure_cancelled(&mut self, cancelled: bool) {
        self.departure_stop.set_departure_cancelled(cancelled);
    }

    pub fn set_arrival_cancelled(&mut self, cancelled: bool) {
        self.arrival_stop.set_arrival_cancelled(cancelled);
    }

    /// Marks both sides of an intermediate stop. Returns false if `index`
    /// is out of bounds.
    pub fn set_intermediate_cancelled(&mut self, index: usize, cancelled: bool) -> bool {
        let Some(stop) = self.intermediate_stops.get_mut(index) else {
            return false;
        };
        stop.set_arrival_cancelled(cancelled);
        stop.set_departure_cancelled(cancelled);
        true
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublicLegRepr {
    line: Line,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    destination: Option<Location>,
    departure_stop: Stop,
    arrival_stop: Stop,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    intermediate_stops: Vec<Stop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, with = "flat_path", skip_serializing_if = "Vec::is_empty")]
    path: Vec<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    journey_context: Option<QueryJourneyDetailContext>,
}

impl From<PublicLeg> for PublicLegRepr {
    fn from(leg: PublicLeg) -> Self {
        Self {
            line: leg.line,
            destination: leg.destination,
            departure_stop: leg.departure_stop,
            arrival_stop: leg.arrival_stop,
            intermediate_stops: leg.intermediate_stops,
            message: leg.message,
            path: leg.path,
            journey_context: leg.journey_context,
        }
    }
}

impl TryFrom<PublicLegRepr> for PublicLeg {
    type Error = DomainError;

    fn try_from(repr: PublicLegRepr) -> Result<Self, Self::Error> {
        let mut leg = PublicLeg::new(repr.line, repr.destination, repr.departure_stop, repr.arrival_stop)?
            .with_intermediate_stops(repr.intermediate_stops)
            .with_path(repr.path);
        leg.message = repr.message;
        leg.journey_context = repr.journey_context;
        Ok(leg)
    }
}

/// How an individual leg is travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndividualMode {
    Walk,
    Bike,
    Car,
    /// Change of platform or stop within a station
    Transfer,
}

/// A leg travelled without public transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualLeg {
    #[serde(rename = "type")]
    pub mode: IndividualMode,
    pub departure: Location,
    pub arrival: Location,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub departure_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub arrival_time: DateTime<Utc>,
    /// Metres; 0 if unknown
    #[serde(default)]
    pub distance: u32,
    #[serde(default, with = "flat_path", skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Coordinate>,
}

impl IndividualLeg {
    pub fn new(
        mode: IndividualMode,
        departure: Location,
        arrival: Location,
        departure_time: DateTime<Utc>,
        arrival_time: DateTime<Utc>,
        distance: u32,
    ) -> Self {
        Self {
            mode,
            departure,
            arrival,
            departure_time,
            arrival_time,
            distance,
            path: Vec::new(),
        }
    }

    /// Whole minutes between departure and arrival, truncated toward zero.
    ///
    /// ```
    /// use transit_core::domain::{IndividualLeg, IndividualMode, Location, Coordinate};
    /// use chrono::{Duration, TimeZone, Utc};
    ///
    /// let dep = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
    /// let walk = IndividualLeg::new(
    ///     IndividualMode::Walk,
    ///     Location::coord(Coordinate::new(0, 0)),
    ///     Location::coord(Coordinate::new(0, 1000)),
    ///     dep,
    ///     dep + Duration::seconds(359),
    ///     110,
    /// );
    /// assert_eq!(walk.duration_minutes(), 5);
    /// ```
    pub fn duration_minutes(&self) -> i64 {
        (self.arrival_time - self.departure_time).num_seconds() / 60
    }

    /// Distance for display, see [`format_distance`].
    pub fn distance_text(&self, precision: usize) -> String {
        format_distance(self.distance, precision)
    }
}

/// One segment of a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "legType", rename_all = "lowercase")]
pub enum Leg {
    Public(PublicLeg),
    Individual(IndividualLeg),
}

impl Leg {
    pub fn departure(&self) -> &Location {
        match self {
            Leg::Public(leg) => leg.departure(),
            Leg::Individual(leg) => &leg.departure,
        }
    }

    pub fn arrival(&self) -> &Location {
        match self {
            Leg::Public(leg) => leg.arrival(),
            Leg::Individual(leg) => &leg.arrival,
        }
    }

    pub fn departure_time(&self) -> DateTime<Utc> {
        match self {
            Leg::Public(leg) => leg.departure_time(),
            Leg::Individual(leg) => leg.departure_time,
        }
    }

    pub fn arrival_time(&self) -> DateTime<Utc> {
        match self {
            Leg::Public(leg) => leg.arrival_time(),
            Leg::Individual(leg) => leg.arrival_time,
        }
    }

    pub fn planned_departure_time(&self) -> DateTime<Utc> {
        match self {
            Leg::Public(leg) => leg.planned_departure_time(),
            Leg::Individual(leg) => leg.departure_time,
        }
    }

    pub fn planned_arrival_time(&self) -> DateTime<Utc> {
        match self {
            Leg::Public(leg) => leg.planned_arrival_time(),
            Leg::Individual(leg) => leg.arrival_time,
        }
    }

    pub fn min_time(&self) -> DateTime<Utc> {
        match self {
            Leg::Public(leg) => leg.min_time(),
            Leg::Individual(leg) => leg.departure_time,
        }
    }

    pub fn max_time(&self) -> DateTime<Utc> {
        match self {
            Leg::Public(leg) => leg.max_time(),
            Leg::Individual(leg) => leg.arrival_time,
        }
    }

    pub fn path(&self) -> &[Coordinate] {
        match self {
            Leg::Public(leg) => leg.path(),
            Leg::Individual(leg) => &leg.path,
        }
    }

    pub fn as_public(&self) -> Option<&PublicLeg> {
        match self {
            Leg::Public(leg) => Some(leg),
            Leg::Individual(_) => None,
        }
    }

    pub fn as_individual(&self) -> Option<&IndividualLeg> {
        match self {
            Leg::Public(_) => None,
            Leg::Individual(leg) => Some(leg),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Leg::Public(_))
    }
}

impl From<PublicLeg> for Leg {
    fn from(leg: PublicLeg) -> Self {
        Leg::Public(leg)
    }
}

impl From<IndividualLeg> for Leg {
    fn from(leg: IndividualLeg) -> Self {
        Leg::Individual(leg)
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

    fn station(id: &str, name: &str) -> Location {
        Location::named_station(id, None, name).unwrap()
    }

    fn re1() -> Line {
        Line::new(Some("DB".into()), Some(Product::RegionalTrain), Some("RE 1".into()))
    }

    fn make_leg() -> PublicLeg {
        let dep = Stop::new(
            station("8000207", "Köln Hbf"),
            None,
            StopEvent::new(Some(t(10, 0)), Some(t(9, 55))),
        );
        let mid = Stop::new(
            station("8000085", "Düren"),
            StopEvent::new(Some(t(10, 20)), None),
            StopEvent::new(Some(t(10, 21)), None),
        );
        let arr = Stop::new(
            station("8000001", "Aachen Hbf"),
            StopEvent::new(Some(t(10, 50)), Some(t(10, 58))),
            None,
        );
        PublicLeg::new(re1(), Some(station("8000001", "Aachen Hbf")), dep, arr)
            .unwrap()
            .with_intermediate_stops(vec![mid])
            .with_path(vec![Coordinate::new(50_942_823, 6_958_730), Coordinate::new(50_767_803, 6_091_504)])
    }

    #[test]
    fn predicted_departure_preferred() {
        let leg = make_leg();
        assert_eq!(leg.departure_time(), t(9, 55));
        assert_eq!(leg.planned_departure_time(), t(10, 0));
        assert_eq!(leg.min_time(), t(9, 55));
        assert_eq!(leg.arrival_time(), t(10, 58));
        assert_eq!(leg.max_time(), t(10, 58));
        assert_eq!(leg.duration(), Duration::minutes(63));
    }

    #[test]
    fn requires_times_on_both_ends() {
        let no_dep = PublicLeg::new(
            re1(),
            None,
            Stop::new(station("1", "A"), StopEvent::new(Some(t(10, 0)), None), None),
            Stop::new(station("2", "B"), StopEvent::new(Some(t(11, 0)), None), None),
        );
        assert!(matches!(no_dep, Err(DomainError::MissingTime(_))));

        let no_arr = PublicLeg::new(
            re1(),
            None,
            Stop::new(station("1", "A"), None, StopEvent::new(Some(t(10, 0)), None)),
            Stop::new(station("2", "B"), None, StopEvent::new(Some(t(11, 0)), None)),
        );
        assert!(matches!(no_arr, Err(DomainError::MissingTime(_))));
    }

    #[test]
    fn cancellation_updates() {
        let mut leg = make_leg();
        assert!(!leg.is_cancelled());

        leg.set_arrival_cancelled(true);
        assert!(leg.is_cancelled());
        leg.set_arrival_cancelled(false);
        assert!(!leg.is_cancelled());

        assert!(leg.set_intermediate_cancelled(0, true));
        assert!(leg.intermediate_stops()[0].is_departure_cancelled());
        assert!(!leg.is_cancelled());
        assert!(!leg.set_intermediate_cancelled(5, true));
    }

    #[test]
    fn individual_duration_truncates() {
        let walk = IndividualLeg::new(
            IndividualMode::Walk,
            station("1", "A"),
            station("2", "B"),
            t(10, 0),
            t(10, 0) + Duration::seconds(299),
            320,
        );
        assert_eq!(walk.duration_minutes(), 4);
        assert_eq!(walk.distance_text(1), "320 m");

        // Negative spans truncate toward zero too
        let odd = IndividualLeg::new(
            IndividualMode::Transfer,
            station("1", "A"),
            station("1", "A"),
            t(10, 0),
            t(10, 0) - Duration::seconds(90),
            0,
        );
        assert_eq!(odd.duration_minutes(), -1);
    }

    #[test]
    fn uniform_time_queries() {
        let public: Leg = make_leg().into();
        let walk: Leg = IndividualLeg::new(
            IndividualMode::Walk,
            station("8000001", "Aachen Hbf"),
            station("9", "Dom"),
            t(11, 0),
            t(11, 10),
            700,
        )
        .into();

        assert!(public.is_public());
        assert!(walk.as_individual().is_some());
        assert_eq!(public.arrival(), walk.departure());
        assert_eq!(walk.min_time(), t(11, 0));
        assert_eq!(walk.planned_arrival_time(), t(11, 10));
        assert_eq!(public.path().len(), 2);
    }

    #[test]
    fn public_leg_keys_and_round_trip() {
        let leg: Leg = make_leg().with_message("Ersatzverkehr").into();
        let json = serde_json::to_value(&leg).unwrap();

        assert_eq!(json["legType"], "public");
        assert_eq!(json["line"]["label"], "RE 1");
        assert_eq!(json["departureStop"]["location"]["id"], "8000207");
        assert_eq!(json["arrivalStop"]["location"]["id"], "8000001");
        assert_eq!(json["intermediateStops"].as_array().unwrap().len(), 1);
        assert_eq!(json["message"], "Ersatzverkehr");
        assert_eq!(
            json["path"],
            serde_json::json!([50_942_823, 6_958_730, 50_767_803, 6_091_504])
        );

        let back: Leg = serde_json::from_value(json).unwrap();
        assert_eq!(back, leg);
        assert_eq!(back.departure_time(), t(9, 55));
    }

    #[test]
    fn individual_leg_keys() {
        let leg = IndividualLeg::new(
            IndividualMode::Bike,
            station("1", "A"),
            station("2", "B"),
            t(8, 0),
            t(8, 12),
            2_400,
        );
        let json = serde_json::to_value(Leg::from(leg.clone())).unwrap();
        assert_eq!(json["legType"], "individual");
        assert_eq!(json["type"], "BIKE");
        assert_eq!(json["departureTime"], t(8, 0).timestamp_millis());
        assert_eq!(json["arrivalTime"], t(8, 12).timestamp_millis());
        assert_eq!(json["distance"], 2_400);

        let back: Leg = serde_json::from_value(json).unwrap();
        assert_eq!(back.as_individual(), Some(&leg));
    }

    #[test]
    fn decoding_public_leg_revalidates() {
        let mut json = serde_json::to_value(Leg::from(make_leg())).unwrap();
        // Strip the arrival side of the arrival stop
        let arrival_stop = json["arrivalStop"].as_object_mut().unwrap();
        arrival_stop.remove("plannedArrivalTime");
        arrival_stop.remove("predictedArrivalTime");

        assert!(serde_json::from_value::<Leg>(json).is_err());
    }
}
