//! The adapter contract.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Location, LocationType};

use super::{
    EventKind, NearbyLocationsResult, PageDirection, QueryDeparturesResult,
    QueryJourneyDetailContext, QueryJourneyDetailResult, QueryTripsContext, QueryTripsResult,
    RefreshTripContext, SuggestLocationsResult, TripQuery,
};

/// Operations a provider may support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    Suggest,
    Nearby,
    Departures,
    Trips,
    /// Trip search accepts a via location
    TripsVia,
    Refresh,
    JourneyDetail,
}

/// A backend network, translated into the canonical model.
///
/// Implementations must return values that already satisfy the model's
/// invariants, and must map every failure onto one of the listed result
/// variants; nothing here panics or returns a bare error. Contexts handed
/// out carry [`NetworkProvider::id`] and are rejected by other providers.
pub trait NetworkProvider: Send + Sync {
    /// Stable identifier, stored in every context this provider issues.
    fn id(&self) -> &str;

    fn capabilities(&self) -> &[Capability];

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Free-text location search, best match first.
    fn suggest_locations(
        &self,
        constraint: &str,
        types: &[LocationType],
        max: usize,
    ) -> impl Future<Output = SuggestLocationsResult> + Send;

    /// Locations around `anchor`, which is either identified or has a
    /// coordinate. `max_distance` in metres, 0 for backend default.
    fn query_nearby_locations(
        &self,
        anchor: &Location,
        types: &[LocationType],
        max_distance: u32,
        max: usize,
    ) -> impl Future<Output = NearbyLocationsResult> + Send;

    /// Departure (or arrival) board of a station. With `equivs`, boards of
    /// equivalent stations (same interchange, different ids) are included.
    fn query_departures(
        &self,
        station_id: &str,
        kind: EventKind,
        time: DateTime<Utc>,
        max: usize,
        equivs: bool,
    ) -> impl Future<Output = QueryDeparturesResult> + Send;

    fn query_trips(&self, query: &TripQuery) -> impl Future<Output = QueryTripsResult> + Send;

    /// Next or previous page of a search. Never `TooClose`.
    fn query_more_trips(
        &self,
        context: &QueryTripsContext,
        direction: PageDirection,
    ) -> impl Future<Output = QueryTripsResult> + Send;

    /// Fresh snapshot of one trip. A success holds exactly one trip with
    /// the same id as the trip the context came from.
    fn refresh_trip(&self, context: &RefreshTripContext) -> impl Future<Output = QueryTripsResult> + Send;

    fn query_journey_detail(
        &self,
        context: &QueryJourneyDetailContext,
    ) -> impl Future<Output = QueryJourneyDetailResult> + Send;
}
