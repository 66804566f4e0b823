//! Result variants of the query operations.
//!
//! Each operation resolves to exactly one variant. Outcomes the caller is
//! expected to handle (unknown station, nothing found, ambiguous input) get
//! their own variant; everything else is a `Failure` with a cause.

use crate::domain::{Location, PublicLeg, StationDepartures, SuggestedLocation, Trip};

use super::{ProviderError, QueryJourneyDetailContext, QueryTripsContext};

#[derive(Debug, Clone)]
pub enum SuggestLocationsResult {
    Success(Vec<SuggestedLocation>),
    Failure(ProviderError),
}

#[derive(Debug, Clone)]
pub enum NearbyLocationsResult {
    Success(Vec<Location>),
    /// The anchor location's id is unknown to the backend
    InvalidId,
    Failure(ProviderError),
}

#[derive(Debug, Clone)]
pub enum QueryDeparturesResult {
    /// One board per station; more than one when equivalent stations were included
    Success(Vec<StationDepartures>),
    InvalidStation,
    Failure(ProviderError),
}

/// Trips found by a search, page or refresh.
#[derive(Debug, Clone)]
pub struct TripsPage {
    /// `None` when there are no further pages in either direction
    pub context: Option<QueryTripsContext>,
    /// The locations the backend resolved the query to
    pub from: Location,
    pub via: Option<Location>,
    pub to: Location,
    pub trips: Vec<Trip>,
    /// Network-wide notices (strikes, engineering works)
    pub messages: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum QueryTripsResult {
    Success(TripsPage),
    /// Valid query, no connection found
    NoTrips,
    /// Origin and destination are the same place
    TooClose,
    /// Candidates for each endpoint that could not be resolved uniquely;
    /// an empty list means that endpoint was unambiguous
    AmbiguousLocation {
        from: Vec<Location>,
        via: Vec<Location>,
        to: Vec<Location>,
    },
    Failure(ProviderError),
}

impl QueryTripsResult {
    pub fn page(&self) -> Option<&TripsPage> {
        match self {
            QueryTripsResult::Success(page) => Some(page),
            _ => None,
        }
    }

    pub fn into_page(self) -> Option<TripsPage> {
        match self {
            QueryTripsResult::Success(page) => Some(page),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, QueryTripsResult::Success(_))
    }

    pub fn failure(&self) -> Option<&ProviderError> {
        match self {
            QueryTripsResult::Failure(err) => Some(err),
            _ => None,
        }
    }

    /// Short name of the variant, for logs.
    pub fn status(&self) -> &'static str {
        match self {
            QueryTripsResult::Success(_) => "success",
            QueryTripsResult::NoTrips => "no_trips",
            QueryTripsResult::TooClose => "too_close",
            QueryTripsResult::AmbiguousLocation { .. } => "ambiguous_location",
            QueryTripsResult::Failure(_) => "failure",
        }
    }
}

impl From<ProviderError> for QueryTripsResult {
    fn from(err: ProviderError) -> Self {
        QueryTripsResult::Failure(err)
    }
}

#[derive(Debug, Clone)]
pub enum QueryJourneyDetailResult {
    Success {
        context: QueryJourneyDetailContext,
        /// The whole run of the vehicle, first stop to last
        leg: PublicLeg,
    },
    InvalidId,
    Failure(ProviderError),
}

impl From<ProviderError> for SuggestLocationsResult {
    fn from(err: ProviderError) -> Self {
        SuggestLocationsResult::Failure(err)
    }
}

impl From<ProviderError> for NearbyLocationsResult {
    fn from(err: ProviderError) -> Self {
        NearbyLocationsResult::Failure(err)
    }
}

impl From<ProviderError> for QueryDeparturesResult {
    fn from(err: ProviderError) -> Self {
        QueryDeparturesResult::Failure(err)
    }
}

impl From<ProviderError> for QueryJourneyDetailResult {
    fn from(err: ProviderError) -> Self {
        QueryJourneyDetailResult::Failure(err)
    }
}
