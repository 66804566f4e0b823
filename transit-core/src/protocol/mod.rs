//! Query protocol shared by all backend adapters.
//!
//! Adapters implement [`NetworkProvider`]; callers drive it directly or
//! through a [`TripSession`]. Every operation resolves to one variant of its
//! result enum, and continuation state travels in opaque contexts.

mod context;
mod error;
mod options;
mod provider;
mod result;
mod session;

pub use context::{ContextPayload, QueryJourneyDetailContext, QueryTripsContext, RefreshTripContext};
pub use error::ProviderError;
pub use options::{
    Accessibility, EventKind, Optimize, PageDirection, TripFlag, TripOptions, TripQuery, WalkSpeed,
};
pub use provider::{Capability, NetworkProvider};
pub use result::{
    NearbyLocationsResult, QueryDeparturesResult, QueryJourneyDetailResult, QueryTripsResult,
    SuggestLocationsResult, TripsPage,
};
pub use session::{SessionState, TripSession};
