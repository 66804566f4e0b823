//! Canonical transit data model.
//!
//! Every backend adapter converts its upstream payloads into these types.
//! Types with invariants enforce them at construction time, so code that
//! receives a `Location`, `PublicLeg` or `Trip` can trust its validity.

mod coord;
mod departure;
mod error;
mod format;
mod leg;
mod line;
mod location;
mod product;
mod stop;
mod trip;
mod wagon;

pub use coord::Coordinate;
pub use departure::{Departure, LineDestination, StationDepartures};
pub use error::DomainError;
pub use format::format_distance;
pub use leg::{IndividualLeg, IndividualMode, Leg, PublicLeg};
pub use line::{Line, LineAttr, LineDirection, Shape, Style};
pub use location::{InvalidLocation, Location, LocationType, SuggestedLocation, sort_by_priority};
pub use product::{InvalidProduct, Product, products_from_codes, products_to_codes};
pub use stop::{Position, Stop, StopEvent};
pub use trip::{Fare, FareType, Trip};
pub use wagon::{
    StationTrack, StationTrackSector, Wagon, WagonAttribute, WagonClass, WagonGroup,
    WagonSequence,
};
