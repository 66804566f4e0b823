//! Caller-side trip search state machine.
//!
//! `TripSession` drives one logical search against one provider:
//!
//! ```text
//! Idle --search--> Ready --more(later|earlier)--> Ready
//!                    |  --refresh(trip)-------->  Ready
//!                    |  --journey_detail(leg)-->  Ready
//!                    '--search (new query)----->  Ready | Idle
//! ```
//!
//! It keeps the accumulated trip list across pages, de-duplicated by trip id
//! and in chronological page order, and swaps refreshed trips in place. A
//! refresh that comes back with a different trip is reported as
//! `TripNotFound` rather than silently replacing the wrong entry.

use tracing::{debug, warn};

use crate::domain::{Leg, Location, Trip};

use super::{
    Capability, NetworkProvider, PageDirection, ProviderError, QueryJourneyDetailResult,
    QueryTripsContext, QueryTripsResult, TripQuery, TripsPage,
};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No successful search yet
    Idle,
    Searching,
    /// Holding results; further calls allowed
    Ready,
    Paginating(PageDirection),
    Refreshing,
    FetchingDetail,
}

/// Holds the session in a transient state for one provider call.
///
/// Dropping it, including when the caller drops the operation's future
/// mid-flight, puts the session back into `restore`.
struct Transition<'a> {
    state: &'a mut SessionState,
    restore: SessionState,
}

impl<'a> Transition<'a> {
    fn begin(state: &'a mut SessionState, during: SessionState) -> Self {
        let restore = *state;
        *state = during;
        Self { state, restore }
    }

    fn finish(mut self, next: SessionState) {
        self.restore = next;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        *self.state = self.restore;
    }
}

/// One trip search and everything derived from it.
pub struct TripSession<P> {
    provider: P,
    state: SessionState,
    context: Option<QueryTripsContext>,
    endpoints: Option<(Location, Option<Location>, Location)>,
    trips: Vec<Trip>,
    messages: Vec<String>,
}

impl<P: NetworkProvider> TripSession<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            state: SessionState::Idle,
            context: None,
            endpoints: None,
            trips: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Rebuilds a session from persisted trips and context, e.g. after a
    /// restart.
    ///
    /// # Errors
    ///
    /// Returns `InvalidContext` if the context was issued by another provider.
    pub fn resume(
        provider: P,
        context: Option<QueryTripsContext>,
        trips: Vec<Trip>,
    ) -> Result<Self, ProviderError> {
        if let Some(context) = &context {
            context.check_issuer(provider.id())?;
        }
        let endpoints = trips
            .first()
            .map(|trip| (trip.from().clone(), None, trip.to().clone()));
        let mut session = Self::new(provider);
        session.state = if trips.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Ready
        };
        session.context = context;
        session.endpoints = endpoints;
        session.trips = dedupe(trips);
        Ok(session)
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Accumulated trips, earliest page first.
    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.trips.iter().find(|trip| trip.id() == id)
    }

    pub fn context(&self) -> Option<&QueryTripsContext> {
        self.context.as_ref()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Resolved origin, via and destination of the current search.
    pub fn endpoints(&self) -> Option<(&Location, Option<&Location>, &Location)> {
        self.endpoints
            .as_ref()
            .map(|(from, via, to)| (from, via.as_ref(), to))
    }

    /// True if another page in `direction` can be requested.
    pub fn can_query(&self, direction: PageDirection) -> bool {
        self.context.as_ref().is_some_and(|context| match direction {
            PageDirection::Later => context.can_query_later(),
            PageDirection::Earlier => context.can_query_earlier(),
        })
    }

    /// Starts a new search, discarding previous results.
    ///
    /// Origin equal to destination short-circuits to `TooClose` without
    /// asking the provider.
    pub async fn search(&mut self, query: TripQuery) -> QueryTripsResult {
        self.reset();

        if query.from == query.to {
            debug!(from = %query.from, "origin equals destination");
            return QueryTripsResult::TooClose;
        }
        if query.via.is_some() && !self.provider.has_capability(Capability::TripsVia) {
            return QueryTripsResult::Failure(ProviderError::Unsupported(Capability::TripsVia));
        }

        let transition = Transition::begin(&mut self.state, SessionState::Searching);
        let result = self.provider.query_trips(&query).await;
        debug!(
            provider = self.provider.id(),
            status = result.status(),
            "trip search complete"
        );

        match &result {
            QueryTripsResult::Success(page) => {
                transition.finish(SessionState::Ready);
                self.adopt(page);
                self.trips = dedupe(page.trips.clone());
            }
            _ => transition.finish(SessionState::Idle),
        }
        result
    }

    /// Fetches the next page in `direction` and merges it into the trip list.
    ///
    /// Returns `None` if there is nothing further in that direction. A
    /// failed page leaves the accumulated trips and context untouched.
    pub async fn more(&mut self, direction: PageDirection) -> Option<QueryTripsResult> {
        if !self.can_query(direction) {
            return None;
        }
        let context = self.context.clone()?;

        let transition = Transition::begin(&mut self.state, SessionState::Paginating(direction));
        let result = self.provider.query_more_trips(&context, direction).await;
        transition.finish(SessionState::Ready);

        if let QueryTripsResult::Success(page) = &result {
            let added = self.merge_page(&page.trips, direction);
            self.context = page.context.clone();
            self.messages = page.messages.clone();
            debug!(
                ?direction,
                received = page.trips.len(),
                added,
                total = self.trips.len(),
                "merged trip page"
            );
        } else {
            debug!(?direction, status = result.status(), "paging did not succeed");
        }
        Some(result)
    }

    /// Re-fetches the trip with the given id and replaces it in place.
    ///
    /// A success holds exactly the refreshed trip.
    pub async fn refresh(&mut self, trip_id: &str) -> QueryTripsResult {
        let Some(position) = self.trips.iter().position(|trip| trip.id() == trip_id) else {
            return ProviderError::TripNotFound { id: trip_id.to_string() }.into();
        };
        let Some(context) = self.trips[position].refresh_context().cloned() else {
            return ProviderError::Unsupported(Capability::Refresh).into();
        };
        if !self.provider.has_capability(Capability::Refresh) {
            return ProviderError::Unsupported(Capability::Refresh).into();
        }

        let transition = Transition::begin(&mut self.state, SessionState::Refreshing);
        let result = self.provider.refresh_trip(&context).await;
        transition.finish(SessionState::Ready);

        let page = match result {
            QueryTripsResult::Success(page) => page,
            other => {
                debug!(trip_id, status = other.status(), "refresh did not succeed");
                return other;
            }
        };

        let Some(fresh) = page.trips.iter().find(|trip| trip.id() == trip_id).cloned() else {
            warn!(
                trip_id,
                returned = ?page.trips.iter().map(Trip::id).collect::<Vec<_>>(),
                "refresh returned a different trip"
            );
            return ProviderError::TripNotFound { id: trip_id.to_string() }.into();
        };

        debug!(trip_id, cancelled = fresh.is_cancelled(), "trip refreshed");
        self.trips[position] = fresh.clone();
        QueryTripsResult::Success(TripsPage {
            trips: vec![fresh],
            ..page
        })
    }

    /// Fetches the full run of the vehicle serving leg `leg_index` of a trip.
    pub async fn journey_detail(&mut self, trip_id: &str, leg_index: usize) -> QueryJourneyDetailResult {
        let Some(trip) = self.trip(trip_id) else {
            return ProviderError::TripNotFound { id: trip_id.to_string() }.into();
        };
        let context = match trip.legs().get(leg_index) {
            Some(Leg::Public(leg)) => leg.journey_context().cloned(),
            Some(Leg::Individual(_)) | None => None,
        };
        let Some(context) = context else {
            return QueryJourneyDetailResult::InvalidId;
        };
        if !self.provider.has_capability(Capability::JourneyDetail) {
            return ProviderError::Unsupported(Capability::JourneyDetail).into();
        }

        let transition = Transition::begin(&mut self.state, SessionState::FetchingDetail);
        let result = self.provider.query_journey_detail(&context).await;
        transition.finish(SessionState::Ready);
        result
    }

    fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.context = None;
        self.endpoints = None;
        self.trips.clear();
        self.messages.clear();
    }

    fn adopt(&mut self, page: &TripsPage) {
        self.context = page.context.clone();
        self.endpoints = Some((page.from.clone(), page.via.clone(), page.to.clone()));
        self.messages = page.messages.clone();
    }

    /// Later pages append, earlier pages prepend; trips already known are
    /// skipped. Returns how many trips were new.
    fn merge_page(&mut self, trips: &[Trip], direction: PageDirection) -> usize {
        let fresh: Vec<Trip> = dedupe(
            trips
                .iter()
                .filter(|trip| !self.trips.contains(trip))
                .cloned()
                .collect(),
        );
        let added = fresh.len();
        match direction {
            PageDirection::Later => self.trips.extend(fresh),
            PageDirection::Earlier => {
                self.trips.splice(0..0, fresh);
            }
        }
        added
    }
}

/// Drops repeated trips, keeping the first occurrence.
fn dedupe(trips: Vec<Trip>) -> Vec<Trip> {
    let mut seen = std::collections::HashSet::new();
    trips
        .into_iter()
        .filter(|trip| seen.insert(trip.id().to_string()))
        .collect()
}
