//! Trips and fares.

use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::RefreshTripContext;

use super::{DomainError, Leg, Location};

/// Which tariff a fare applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FareType {
    Adult,
    Child,
    Bike,
}

/// A price for travelling a trip, as quoted by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fare {
    pub network: Option<String>,
    #[serde(rename = "type")]
    pub fare_type: FareType,
    /// ISO 4217 code
    pub currency: String,
    pub amount: f32,
    pub units_name: Option<String>,
    pub units: Option<String>,
}

/// A complete journey from origin to destination.
///
/// Legs are non-empty and contiguous: each leg starts where the previous one
/// ends. Two trips are equal when their ids are equal. Backends that send no
/// id get a substitute derived from the legs' locations, planned times and
/// lines, so the same trip gets the same id across calls and processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TripRepr", into = "TripRepr")]
pub struct Trip {
    id: Option<String>,
    from: Location,
    to: Location,
    legs: Vec<Leg>,
    fares: Vec<Fare>,
    refresh_context: Option<RefreshTripContext>,
    substitute_id: OnceLock<String>,
}

impl Trip {
    /// Builds a trip, checking that the legs form one connected chain.
    ///
    /// An empty `id` is treated as missing.
    pub fn new(
        id: Option<String>,
        from: Location,
        to: Location,
        legs: Vec<Leg>,
        fares: Vec<Fare>,
        refresh_context: Option<RefreshTripContext>,
    ) -> Result<Self, DomainError> {
        if legs.is_empty() {
            return Err(DomainError::EmptyTrip);
        }
        for (index, pair) in legs.windows(2).enumerate() {
            let (previous, next) = (pair[0].arrival(), pair[1].departure());
            if previous != next {
                return Err(DomainError::DisconnectedLegs {
                    index: index + 1,
                    previous: previous.unique_long_name(),
                    next: next.unique_long_name(),
                });
            }
        }

        Ok(Self {
            id: id.filter(|id| !id.is_empty()),
            from,
            to,
            legs,
            fares,
            refresh_context,
            substitute_id: OnceLock::new(),
        })
    }

    /// The backend id, or the derived substitute if there is none.
    pub fn id(&self) -> &str {
        match &self.id {
            Some(id) => id,
            None => self.substitute_id.get_or_init(|| substitute_id(&self.legs)),
        }
    }

    /// True if the backend supplied the id.
    pub fn has_backend_id(&self) -> bool {
        self.id.is_some()
    }

    pub fn from(&self) -> &Location {
        &self.from
    }

    pub fn to(&self) -> &Location {
        &self.to
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn fares(&self) -> &[Fare] {
        &self.fares
    }

    pub fn refresh_context(&self) -> Option<&RefreshTripContext> {
        self.refresh_context.as_ref()
    }

    pub fn first_public_leg(&self) -> Option<&super::PublicLeg> {
        self.legs.iter().find_map(Leg::as_public)
    }

    pub fn last_public_leg(&self) -> Option<&super::PublicLeg> {
        self.legs.iter().rev().find_map(Leg::as_public)
    }

    pub fn departure_time(&self) -> DateTime<Utc> {
        self.legs[0].departure_time()
    }

    pub fn arrival_time(&self) -> DateTime<Utc> {
        self.legs[self.legs.len() - 1].arrival_time()
    }

    pub fn min_time(&self) -> DateTime<Utc> {
        self.legs
            .iter()
            .map(Leg::min_time)
            .fold(self.legs[0].min_time(), std::cmp::min)
    }

    pub fn max_time(&self) -> DateTime<Utc> {
        self.legs
            .iter()
            .map(Leg::max_time)
            .fold(self.legs[0].max_time(), std::cmp::max)
    }

    /// Number of vehicle changes.
    pub fn num_changes(&self) -> usize {
        self.legs.iter().filter(|leg| leg.is_public()).count().saturating_sub(1)
    }

    /// True if any public leg is cancelled at its boarding or alighting stop.
    pub fn is_cancelled(&self) -> bool {
        self.legs
            .iter()
            .filter_map(Leg::as_public)
            .any(super::PublicLeg::is_cancelled)
    }

    /// Marks the departure and arrival of the public leg at `index`.
    /// Returns false if there is no public leg at that index.
    pub fn set_public_leg_cancelled(&mut self, index: usize, cancelled: bool) -> bool {
        match self.legs.get_mut(index) {
            Some(Leg::Public(leg)) => {
                leg.set_departure_cancelled(cancelled);
                leg.set_arrival_cancelled(cancelled);
                true
            }
            _ => false,
        }
    }
}

fn substitute_id(legs: &[Leg]) -> String {
    legs.iter()
        .map(|leg| match leg {
            Leg::Public(leg) => format!(
                "{}-{}-{}-{}-{}-{}",
                leg.departure().unique_long_name(),
                leg.arrival().unique_long_name(),
                leg.planned_departure_time().timestamp(),
                leg.planned_arrival_time().timestamp(),
                leg.line().product_code(),
                leg.line().label.as_deref().unwrap_or_default(),
            ),
            Leg::Individual(leg) => format!(
                "{}-{}-Individual",
                leg.departure.unique_long_name(),
                leg.arrival.unique_long_name(),
            ),
        })
        .collect::<Vec<_>>()
        .join("|")
}

impl PartialEq for Trip {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Trip {}

impl Hash for Trip {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    from: Location,
    to: Location,
    legs: Vec<Leg>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fares: Vec<Fare>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_context: Option<RefreshTripContext>,
}

impl From<Trip> for TripRepr {
    fn from(trip: Trip) -> Self {
        Self {
            id: trip.id,
            from: trip.from,
            to: trip.to,
            legs: trip.legs,
            fares: trip.fares,
            refresh_context: trip.refresh_context,
        }
    }
}

impl TryFrom<TripRepr> for Trip {
    type Error = DomainError;

    fn try_from(repr: TripRepr) -> Result<Self, Self::Error> {
        Trip::new(repr.id, repr.from, repr.to, repr.legs, repr.fares, repr.refresh_context)
    }
}
