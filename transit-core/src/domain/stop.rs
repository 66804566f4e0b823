//! Stop-time model.
//!
//! A `StopEvent` is one side (arrival or departure) of a vehicle calling at
//! a location, with a planned and/or predicted time. A `Stop` pairs the two
//! sides with the location. Predicted times override planned ones whenever
//! both are known.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DomainError, Location};

/// A platform, track or stand, optionally with a section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Position {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section: None,
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.section {
            Some(section) => write!(f, "{} {}", self.name, section),
            None => f.write_str(&self.name),
        }
    }
}

/// Known times of an event. At least one is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Timing {
    Planned(DateTime<Utc>),
    Predicted(DateTime<Utc>),
    Both {
        planned: DateTime<Utc>,
        predicted: DateTime<Utc>,
    },
}

/// One side of a stop: either the arrival or the departure.
///
/// # Examples
///
/// ```
/// use transit_core::domain::StopEvent;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let planned = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
/// let predicted = planned - Duration::minutes(5);
///
/// let event = StopEvent::new(Some(planned), Some(predicted)).unwrap();
/// assert_eq!(event.time(), predicted);
/// assert_eq!(event.min_time(), predicted);
/// assert_eq!(event.max_time(), planned);
///
/// // An event with no time at all cannot be constructed
/// assert!(StopEvent::new(None, None).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopEvent {
    timing: Timing,
    planned_platform: Option<Position>,
    predicted_platform: Option<Position>,
    cancelled: bool,
}

impl StopEvent {
    /// Creates an event from its planned and predicted times.
    ///
    /// Returns `None` if both are absent.
    pub fn new(planned: Option<DateTime<Utc>>, predicted: Option<DateTime<Utc>>) -> Option<Self> {
        let timing = match (planned, predicted) {
            (Some(planned), Some(predicted)) => Timing::Both { planned, predicted },
            (Some(planned), None) => Timing::Planned(planned),
            (None, Some(predicted)) => Timing::Predicted(predicted),
            (None, None) => return None,
        };
        Some(Self {
            timing,
            planned_platform: None,
            predicted_platform: None,
            cancelled: false,
        })
    }

    /// An event with only a planned time.
    pub fn planned(time: DateTime<Utc>) -> Self {
        Self {
            timing: Timing::Planned(time),
            planned_platform: None,
            predicted_platform: None,
            cancelled: false,
        }
    }

    /// Sets the planned and predicted platforms.
    pub fn with_platforms(mut self, planned: Option<Position>, predicted: Option<Position>) -> Self {
        self.planned_platform = planned;
        self.predicted_platform = predicted;
        self
    }

    /// Sets the initial cancellation state.
    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn planned_time(&self) -> Option<DateTime<Utc>> {
        match self.timing {
            Timing::Planned(t) | Timing::Both { planned: t, .. } => Some(t),
            Timing::Predicted(_) => None,
        }
    }

    pub fn predicted_time(&self) -> Option<DateTime<Utc>> {
        match self.timing {
            Timing::Predicted(t) | Timing::Both { predicted: t, .. } => Some(t),
            Timing::Planned(_) => None,
        }
    }

    /// Best known time: predicted if available, else planned.
    pub fn time(&self) -> DateTime<Utc> {
        match self.timing {
            Timing::Planned(t) | Timing::Predicted(t) => t,
            Timing::Both { predicted, .. } => predicted,
        }
    }

    /// Planned time if known, else predicted.
    ///
    /// Used where a stable value is wanted, e.g. trip identity.
    pub fn planned_or_predicted(&self) -> DateTime<Utc> {
        match self.timing {
            Timing::Planned(t) | Timing::Predicted(t) => t,
            Timing::Both { planned, .. } => planned,
        }
    }

    /// Earlier of planned and predicted.
    pub fn min_time(&self) -> DateTime<Utc> {
        match self.timing {
            Timing::Planned(t) | Timing::Predicted(t) => t,
            Timing::Both { planned, predicted } => planned.min(predicted),
        }
    }

    /// Later of planned and predicted.
    pub fn max_time(&self) -> DateTime<Utc> {
        match self.timing {
            Timing::Planned(t) | Timing::Predicted(t) => t,
            Timing::Both { planned, predicted } => planned.max(predicted),
        }
    }

    /// Delay of the predicted time relative to the planned one.
    pub fn delay(&self) -> Option<chrono::Duration> {
        match self.timing {
            Timing::Both { planned, predicted } => Some(predicted - planned),
            _ => None,
        }
    }

    pub fn planned_platform(&self) -> Option<&Position> {
        self.planned_platform.as_ref()
    }

    pub fn predicted_platform(&self) -> Option<&Position> {
        self.predicted_platform.as_ref()
    }

    /// Best known platform: predicted if available, else planned.
    pub fn platform(&self) -> Option<&Position> {
        self.predicted_platform.as_ref().or(self.planned_platform.as_ref())
    }

    /// True if the platform changed from the plan.
    pub fn is_platform_changed(&self) -> bool {
        matches!(
            (&self.planned_platform, &self.predicted_platform),
            (Some(planned), Some(predicted)) if planned != predicted
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// A location visited by a vehicle, with arrival and departure sides.
///
/// Either side may be missing: an origin has no arrival, a terminus no
/// departure, and some backends report pass-through stops with no times.
///
/// Cancellation is the only state that may change after construction;
/// it is updated through `&mut self` by whoever owns the stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StopRepr", into = "StopRepr")]
pub struct Stop {
    location: Location,
    arrival: Option<StopEvent>,
    departure: Option<StopEvent>,
    message: Option<String>,
    wagon_sequence_context: Option<String>,
}

impl Stop {
    pub fn new(location: Location, arrival: Option<StopEvent>, departure: Option<StopEvent>) -> Self {
        Self {
            location,
            arrival,
            departure,
            message: None,
            wagon_sequence_context: None,
        }
    }

    /// Sets a free-text message shown for this stop.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the backend reference used to fetch the wagon sequence.
    pub fn with_wagon_sequence_context(mut self, context: impl Into<String>) -> Self {
        self.wagon_sequence_context = Some(context.into());
        self
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn arrival(&self) -> Option<&StopEvent> {
        self.arrival.as_ref()
    }

    pub fn departure(&self) -> Option<&StopEvent> {
        self.departure.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn wagon_sequence_context(&self) -> Option<&str> {
        self.wagon_sequence_context.as_deref()
    }

    pub fn arrival_time(&self) -> Option<DateTime<Utc>> {
        self.arrival.as_ref().map(StopEvent::time)
    }

    pub fn departure_time(&self) -> Option<DateTime<Utc>> {
        self.departure.as_ref().map(StopEvent::time)
    }

    pub fn planned_arrival_time(&self) -> Option<DateTime<Utc>> {
        self.arrival.as_ref().and_then(StopEvent::planned_time)
    }

    pub fn planned_departure_time(&self) -> Option<DateTime<Utc>> {
        self.departure.as_ref().and_then(StopEvent::planned_time)
    }

    pub fn predicted_arrival_time(&self) -> Option<DateTime<Utc>> {
        self.arrival.as_ref().and_then(StopEvent::predicted_time)
    }

    pub fn predicted_departure_time(&self) -> Option<DateTime<Utc>> {
        self.departure.as_ref().and_then(StopEvent::predicted_time)
    }

    /// Earliest known time at this stop, across both sides.
    pub fn min_time(&self) -> Option<DateTime<Utc>> {
        [&self.arrival, &self.departure]
            .into_iter()
            .flatten()
            .map(StopEvent::min_time)
            .min()
    }

    /// Latest known time at this stop, across both sides.
    pub fn max_time(&self) -> Option<DateTime<Utc>> {
        [&self.arrival, &self.departure]
            .into_iter()
            .flatten()
            .map(StopEvent::max_time)
            .max()
    }

    pub fn is_arrival_cancelled(&self) -> bool {
        self.arrival.as_ref().is_some_and(StopEvent::is_cancelled)
    }

    pub fn is_departure_cancelled(&self) -> bool {
        self.departure.as_ref().is_some_and(StopEvent::is_cancelled)
    }

    /// Updates the arrival cancellation. Has no effect if there is no arrival side.
    pub fn set_arrival_cancelled(&mut self, cancelled: bool) {
        if let Some(arrival) = &mut self.arrival {
            arrival.cancelled = cancelled;
        }
    }

    /// Updates the departure cancellation. Has no effect if there is no departure side.
    pub fn set_departure_cancelled(&mut self, cancelled: bool) {
        if let Some(departure) = &mut self.departure {
            departure.cancelled = cancelled;
        }
    }
}

/// Wire form of a [`Stop`], one flat object per stop.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopRepr {
    location: Location,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    planned_arrival_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    predicted_arrival_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    planned_arrival_platform: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    predicted_arrival_platform: Option<Position>,
    #[serde(default)]
    arrival_cancelled: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    planned_departure_time: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    predicted_departure_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    planned_departure_platform: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    predicted_departure_platform: Option<Position>,
    #[serde(default)]
    departure_cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wagon_sequence_context: Option<String>,
}

impl From<Stop> for StopRepr {
    fn from(stop: Stop) -> Self {
        let arrival = stop.arrival.as_ref();
        let departure = stop.departure.as_ref();
        Self {
            location: stop.location,
            planned_arrival_time: arrival.and_then(StopEvent::planned_time),
            predicted_arrival_time: arrival.and_then(StopEvent::predicted_time),
            planned_arrival_platform: arrival.and_then(|e| e.planned_platform.clone()),
            predicted_arrival_platform: arrival.and_then(|e| e.predicted_platform.clone()),
            arrival_cancelled: arrival.is_some_and(StopEvent::is_cancelled),
            planned_departure_time: departure.and_then(StopEvent::planned_time),
            predicted_departure_time: departure.and_then(StopEvent::predicted_time),
            planned_departure_platform: departure.and_then(|e| e.planned_platform.clone()),
            predicted_departure_platform: departure.and_then(|e| e.predicted_platform.clone()),
            departure_cancelled: departure.is_some_and(StopEvent::is_cancelled),
            message: stop.message,
            wagon_sequence_context: stop.wagon_sequence_context,
        }
    }
}

/// One side of a wire stop. Platform or cancellation data without a time
/// is rejected rather than dropped.
fn decode_side(
    times: (Option<DateTime<Utc>>, Option<DateTime<Utc>>),
    platforms: (Option<Position>, Option<Position>),
    cancelled: bool,
    side: &'static str,
) -> Result<Option<StopEvent>, DomainError> {
    match StopEvent::new(times.0, times.1) {
        Some(event) => Ok(Some(
            event
                .with_platforms(platforms.0, platforms.1)
                .with_cancelled(cancelled),
        )),
        None if platforms.0.is_some() || platforms.1.is_some() || cancelled => {
            Err(DomainError::MissingTime(side))
        }
        None => Ok(None),
    }
}

impl TryFrom<StopRepr> for Stop {
    type Error = DomainError;

    fn try_from(repr: StopRepr) -> Result<Self, Self::Error> {
        let arrival = decode_side(
            (repr.planned_arrival_time, repr.predicted_arrival_time),
            (repr.planned_arrival_platform, repr.predicted_arrival_platform),
            repr.arrival_cancelled,
            "arrival",
        )?;
        let departure = decode_side(
            (repr.planned_departure_time, repr.predicted_departure_time),
            (repr.planned_departure_platform, repr.predicted_departure_platform),
            repr.departure_cancelled,
            "departure",
        )?;
        Ok(Self {
            location: repr.location,
            arrival,
            departure,
            message: repr.message,
            wagon_sequence_context: repr.wagon_sequence_context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    fn loc() -> Location {
        Location::named_station("8000105", Some("Frankfurt(Main)"), "Hbf").unwrap()
    }

    #[test]
    fn predicted_preferred() {
        let event = StopEvent::new(Some(t(10, 0)), Some(t(10, 7))).unwrap();
        assert_eq!(event.time(), t(10, 7));
        assert_eq!(event.planned_or_predicted(), t(10, 0));
        assert_eq!(event.delay(), Some(Duration::minutes(7)));
    }

    #[test]
    fn only_one_time_known() {
        let planned = StopEvent::new(Some(t(10, 0)), None).unwrap();
        assert_eq!(planned.time(), t(10, 0));
        assert_eq!(planned.predicted_time(), None);
        assert_eq!(planned.min_time(), t(10, 0));
        assert_eq!(planned.max_time(), t(10, 0));
        assert_eq!(planned.delay(), None);

        let predicted = StopEvent::new(None, Some(t(10, 3))).unwrap();
        assert_eq!(predicted.time(), t(10, 3));
        assert_eq!(predicted.planned_time(), None);
        assert_eq!(predicted.planned_or_predicted(), t(10, 3));
    }

    #[test]
    fn min_time_with_early_prediction() {
        let planned = t(10, 0);
        let early = planned - Duration::minutes(5);
        let stop = Stop::new(loc(), None, StopEvent::new(Some(planned), Some(early)));

        assert_eq!(stop.min_time(), Some(early));
        assert_eq!(stop.max_time(), Some(planned));
        assert_eq!(stop.departure_time(), Some(early));
        assert_eq!(stop.planned_departure_time(), Some(planned));
    }

    #[test]
    fn min_max_span_both_sides() {
        let stop = Stop::new(
            loc(),
            StopEvent::new(Some(t(10, 0)), Some(t(10, 2))),
            StopEvent::new(Some(t(10, 3)), Some(t(10, 5))),
        );
        assert_eq!(stop.min_time(), Some(t(10, 0)));
        assert_eq!(stop.max_time(), Some(t(10, 5)));
    }

    #[test]
    fn stop_without_times() {
        let stop = Stop::new(loc(), None, None);
        assert_eq!(stop.min_time(), None);
        assert_eq!(stop.arrival_time(), None);
        assert!(!stop.is_departure_cancelled());
    }

    #[test]
    fn platforms() {
        let event = StopEvent::planned(t(9, 0))
            .with_platforms(Some(Position::new("7")), Some(Position::new("8").with_section("A-C")));
        assert_eq!(event.platform().unwrap().to_string(), "8 A-C");
        assert!(event.is_platform_changed());

        let same = StopEvent::planned(t(9, 0))
            .with_platforms(Some(Position::new("7")), Some(Position::new("7")));
        assert!(!same.is_platform_changed());
    }

    #[test]
    fn cancellation_is_mutable_in_place() {
        let mut stop = Stop::new(loc(), StopEvent::new(Some(t(10, 0)), None), None);
        assert!(!stop.is_arrival_cancelled());

        stop.set_arrival_cancelled(true);
        assert!(stop.is_arrival_cancelled());

        // No departure side: nothing to cancel
        stop.set_departure_cancelled(true);
        assert!(!stop.is_departure_cancelled());
    }

    #[test]
    fn serializes_with_stable_keys() {
        let stop = Stop::new(
            loc(),
            StopEvent::new(Some(t(10, 0)), Some(t(10, 2)))
                .map(|e| e.with_platforms(Some(Position::new("5")), None)),
            StopEvent::new(Some(t(10, 4)), None).map(|e| e.with_cancelled(true)),
        )
        .with_message("Zug fällt aus")
        .with_wagon_sequence_context("wr:ICE 73:2024-03-15");

        let json = serde_json::to_value(&stop).unwrap();
        assert_eq!(json["location"]["id"], "8000105");
        assert_eq!(json["plannedArrivalTime"], t(10, 0).timestamp_millis());
        assert_eq!(json["predictedArrivalTime"], t(10, 2).timestamp_millis());
        assert_eq!(json["plannedArrivalPlatform"]["name"], "5");
        assert_eq!(json["arrivalCancelled"], false);
        assert_eq!(json["plannedDepartureTime"], t(10, 4).timestamp_millis());
        assert!(json.get("predictedDepartureTime").is_none());
        assert_eq!(json["departureCancelled"], true);
        assert_eq!(json["message"], "Zug fällt aus");
        assert_eq!(json["wagonSequenceContext"], "wr:ICE 73:2024-03-15");

        let back: Stop = serde_json::from_value(json).unwrap();
        assert_eq!(back, stop);
    }

    #[test]
    fn side_data_without_times_rejected() {
        let stop = Stop::new(loc(), StopEvent::new(Some(t(10, 0)), None), None);
        let json = serde_json::to_value(&stop).unwrap();

        let mut platform_only = json.clone();
        platform_only["plannedDeparturePlatform"] = serde_json::json!({"name": "7"});
        let err = serde_json::from_value::<Stop>(platform_only).unwrap_err();
        assert!(err.to_string().contains("departure"));

        let mut cancelled_only = json.clone();
        cancelled_only["departureCancelled"] = serde_json::json!(true);
        assert!(serde_json::from_value::<Stop>(cancelled_only).is_err());

        let back: Stop = serde_json::from_value(json).unwrap();
        assert_eq!(back, stop);
    }
}
