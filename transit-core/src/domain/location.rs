//! Locations: stations, points of interest, addresses and raw coordinates.
//!
//! Backends disagree about almost everything here: some send ids but no
//! coordinates, some send coordinates but no ids, and many use generic
//! station names ("Hbf", "Bahnhof") that only make sense next to a place
//! name. `Location` absorbs these differences behind one equality rule and
//! two labelling functions.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::product::{products_from_codes, products_to_codes};
use super::{Coordinate, Product};

/// Station names that are ambiguous without their place.
const NON_UNIQUE_NAMES: &[&str] = &[
    "Hauptbahnhof",
    "Hbf",
    "Hbf.",
    "Bahnhof",
    "Bf",
    "Bf.",
    "Busbahnhof",
    "ZOB",
    "Zentrum",
    "Zentrum/Bahnhof",
    "Markt",
    "Marktplatz",
    "Kirche",
    "Rathaus",
    "Post",
    "Schule",
    "Friedhof",
    "Dorf",
    "Mitte",
    "Nord",
    "Ost",
    "Süd",
    "West",
    "Airport",
    "Flughafen",
    "Flugplatz",
    "Schiffstation",
    "Schiffsanleger",
];

/// The kind of place a [`Location`] denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    /// Unspecified; used for free-text input that still needs resolving
    Any,
    Station,
    Poi,
    Address,
    Coord,
}

impl LocationType {
    /// Human-readable label, used as the last-resort location name.
    pub fn label(self) -> &'static str {
        match self {
            LocationType::Any => "Any",
            LocationType::Station => "Station",
            LocationType::Poi => "Point of interest",
            LocationType::Address => "Address",
            LocationType::Coord => "Coordinate",
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when location fields violate an invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid location: {reason}")]
pub struct InvalidLocation {
    reason: &'static str,
}

impl InvalidLocation {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }

    /// Which invariant was violated.
    pub fn reason(&self) -> &'static str {
        self.reason
    }
}

/// A place a trip can start at, end at, or pass through.
///
/// # Invariants
///
/// - `id`, if present, is non-empty
/// - `place` requires `name`
/// - [`LocationType::Any`] never carries an id
/// - [`LocationType::Coord`] always carries a coordinate
///
/// # Equality
///
/// Ids are compared when both sides have one, otherwise coordinates when
/// both have one, otherwise place and name. This lets a location parsed
/// from a departure board (id only) match the same station parsed from a
/// trip (id, name and coordinate).
///
/// # Examples
///
/// ```
/// use transit_core::domain::{Location, LocationType};
///
/// let bare = Location::station("8011160").unwrap();
/// let named = Location::new(LocationType::Station, Some("8011160".into()), None, None, Some("Berlin Hbf".into()), None).unwrap();
/// assert_eq!(bare, named);
///
/// assert!(Location::new(LocationType::Any, Some("anything".into()), None, None, None, None).is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LocationRepr", into = "LocationRepr")]
pub struct Location {
    location_type: LocationType,
    id: Option<String>,
    coord: Option<Coordinate>,
    place: Option<String>,
    name: Option<String>,
    products: Option<BTreeSet<Product>>,
}

impl Location {
    /// Creates a location, checking its invariants.
    pub fn new(
        location_type: LocationType,
        id: Option<String>,
        coord: Option<Coordinate>,
        place: Option<String>,
        name: Option<String>,
        products: Option<BTreeSet<Product>>,
    ) -> Result<Self, InvalidLocation> {
        if id.as_deref().is_some_and(str::is_empty) {
            return Err(InvalidLocation::new("id must not be empty"));
        }
        if place.is_some() && name.is_none() {
            return Err(InvalidLocation::new("place requires a name"));
        }
        if location_type == LocationType::Any && id.is_some() {
            return Err(InvalidLocation::new("a location of type Any cannot have an id"));
        }
        if location_type == LocationType::Coord && coord.is_none() {
            return Err(InvalidLocation::new("a coordinate location needs a coordinate"));
        }

        Ok(Self {
            location_type,
            id,
            coord,
            place,
            name,
            products,
        })
    }

    /// A station known only by its id.
    pub fn station(id: impl Into<String>) -> Result<Self, InvalidLocation> {
        Self::new(LocationType::Station, Some(id.into()), None, None, None, None)
    }

    /// A station with id, optional place and name.
    pub fn named_station(
        id: impl Into<String>,
        place: Option<&str>,
        name: &str,
    ) -> Result<Self, InvalidLocation> {
        Self::new(
            LocationType::Station,
            Some(id.into()),
            None,
            place.map(str::to_owned),
            Some(name.to_owned()),
            None,
        )
    }

    /// A bare coordinate.
    pub fn coord(coord: Coordinate) -> Self {
        Self {
            location_type: LocationType::Coord,
            id: None,
            coord: Some(coord),
            place: None,
            name: None,
            products: None,
        }
    }

    /// Unresolved free-text input, e.g. what a user typed into a search box.
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            location_type: LocationType::Any,
            id: None,
            coord: None,
            place: None,
            name: Some(name.into()),
            products: None,
        }
    }

    /// Returns a copy with the coordinate set.
    pub fn with_coord(mut self, coord: Coordinate) -> Self {
        self.coord = Some(coord);
        self
    }

    /// Returns a copy with the served products set.
    pub fn with_products(mut self, products: BTreeSet<Product>) -> Self {
        self.products = Some(products);
        self
    }

    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.coord
    }

    pub fn place(&self) -> Option<&str> {
        self.place.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn products(&self) -> Option<&BTreeSet<Product>> {
        self.products.as_ref()
    }

    /// True if this location is specific enough to be sent to a backend
    /// (it has an id or a coordinate).
    pub fn is_identified(&self) -> bool {
        self.id.is_some() || self.coord.is_some()
    }

    /// A label that is unambiguous whenever the place disambiguates a
    /// generic station name.
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_core::domain::Location;
    ///
    /// let aachen = Location::named_station("8000001", Some("Aachen"), "Hbf").unwrap();
    /// assert_eq!(aachen.unique_short_name(), "Aachen, Hbf");
    ///
    /// let munich = Location::named_station("624637", Some("München"), "Marienplatz").unwrap();
    /// assert_eq!(munich.unique_short_name(), "Marienplatz");
    /// ```
    pub fn unique_short_name(&self) -> String {
        if let (Some(name), Some(place)) = (&self.name, &self.place)
            && is_generic_name(name)
            && !name.contains(place.as_str())
        {
            return format!("{place}, {name}");
        }
        self.name.clone().unwrap_or_else(|| self.fallback_name())
    }

    /// Name followed by place, without consulting the generic-name list.
    pub fn unique_long_name(&self) -> String {
        match (&self.name, &self.place) {
            (Some(name), Some(place)) if !name.contains(place.as_str()) => {
                format!("{name}, {place}")
            }
            (Some(name), _) => name.clone(),
            (None, _) => self.fallback_name(),
        }
    }

    fn fallback_name(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        if let Some(coord) = &self.coord {
            return coord.to_string();
        }
        self.location_type.label().to_owned()
    }
}

/// True if the whole name, or any whitespace/comma separated token of it,
/// is a generic station name.
fn is_generic_name(name: &str) -> bool {
    let is_listed = |s: &str| NON_UNIQUE_NAMES.contains(&s);
    is_listed(name)
        || name
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .any(is_listed)
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (&self.id, &other.id) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.coord, &other.coord) {
            return a == b;
        }
        self.place == other.place && self.name == other.name
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Some(id) = &self.id {
            id.hash(state);
        } else if let Some(coord) = &self.coord {
            coord.hash(state);
        }
        // Unidentified locations compare by place and name regardless of
        // type, so the type must not reach the hasher.
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unique_short_name())
    }
}

/// Wire form of a [`Location`].
#[derive(Serialize, Deserialize)]
struct LocationRepr {
    #[serde(rename = "type")]
    location_type: LocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lat: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lon: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    place: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    products: Option<String>,
}

impl From<Location> for LocationRepr {
    fn from(location: Location) -> Self {
        Self {
            location_type: location.location_type,
            id: location.id,
            lat: location.coord.map(|c| c.lat),
            lon: location.coord.map(|c| c.lon),
            place: location.place,
            name: location.name,
            products: location.products.as_ref().map(products_to_codes),
        }
    }
}

impl TryFrom<LocationRepr> for Location {
    type Error = String;

    fn try_from(repr: LocationRepr) -> Result<Self, Self::Error> {
        let coord = match (repr.lat, repr.lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            (None, None) => None,
            _ => return Err("lat and lon must be given together".to_owned()),
        };
        let products = repr
            .products
            .as_deref()
            .map(products_from_codes)
            .transpose()
            .map_err(|e| e.to_string())?;

        Location::new(
            repr.location_type,
            repr.id,
            coord,
            repr.place,
            repr.name,
            products,
        )
        .map_err(|e| e.to_string())
    }
}

/// A location returned by a suggestion query, with the backend's ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedLocation {
    pub location: Location,
    /// Higher is better
    pub priority: i32,
}

impl SuggestedLocation {
    pub fn new(location: Location, priority: i32) -> Self {
        Self { location, priority }
    }
}

/// Sorts suggestions best first, keeping backend order among equal priorities.
pub fn sort_by_priority(suggestions: &mut [SuggestedLocation]) {
    suggestions.sort_by_key(|s| std::cmp::Reverse(s.priority));
}
