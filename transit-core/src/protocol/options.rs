//! Query parameters.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Location, Product};

/// Whether a time refers to departing or arriving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Departure,
    Arrival,
}

/// Paging direction for `query_more_trips`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDirection {
    Later,
    Earlier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Optimize {
    LeastDuration,
    LeastChanges,
    LeastWalking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalkSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Accessibility {
    #[default]
    Neutral,
    /// Avoid stairs where possible
    Limited,
    /// Step-free only
    BarrierFree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripFlag {
    /// Bicycle carriage required
    Bike,
}

/// Preferences for a trip search. Backends ignore what they cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripOptions {
    /// Allowed products; `None` means all.
    pub products: Option<BTreeSet<Product>>,
    pub optimize: Option<Optimize>,
    pub walk_speed: WalkSpeed,
    pub accessibility: Accessibility,
    pub flags: BTreeSet<TripFlag>,
    pub max_changes: Option<u32>,
    /// Minimum change time in minutes.
    pub min_change_mins: Option<u32>,
}

impl TripOptions {
    pub fn with_products(mut self, products: BTreeSet<Product>) -> Self {
        self.products = Some(products);
        self
    }

    pub fn with_optimize(mut self, optimize: Optimize) -> Self {
        self.optimize = Some(optimize);
        self
    }

    pub fn with_walk_speed(mut self, walk_speed: WalkSpeed) -> Self {
        self.walk_speed = walk_speed;
        self
    }

    pub fn with_accessibility(mut self, accessibility: Accessibility) -> Self {
        self.accessibility = accessibility;
        self
    }

    pub fn with_flag(mut self, flag: TripFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn with_max_changes(mut self, max_changes: u32) -> Self {
        self.max_changes = Some(max_changes);
        self
    }

    pub fn with_min_change_mins(mut self, mins: u32) -> Self {
        self.min_change_mins = Some(mins);
        self
    }

    /// Returns the minimum change time as a Duration.
    pub fn min_change_time(&self) -> Option<Duration> {
        self.min_change_mins.map(|mins| Duration::minutes(i64::from(mins)))
    }

    /// True if `product` may be used.
    pub fn allows(&self, product: Product) -> bool {
        self.products
            .as_ref()
            .is_none_or(|products| products.contains(&product))
    }
}

/// A complete trip search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripQuery {
    pub from: Location,
    pub via: Option<Location>,
    pub to: Location,
    pub time: DateTime<Utc>,
    pub kind: EventKind,
    pub options: TripOptions,
}

impl TripQuery {
    /// Departing at `time`, default options.
    pub fn new(from: Location, to: Location, time: DateTime<Utc>) -> Self {
        Self {
            from,
            via: None,
            to,
            time,
            kind: EventKind::Departure,
            options: TripOptions::default(),
        }
    }

    pub fn with_via(mut self, via: Location) -> Self {
        self.via = Some(via);
        self
    }

    /// Interpret `time` as the latest arrival.
    pub fn arriving_by(mut self) -> Self {
        self.kind = EventKind::Arrival;
        self
    }

    pub fn with_options(mut self, options: TripOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_options() {
        let options = TripOptions::default();

        assert!(options.products.is_none());
        assert!(options.optimize.is_none());
        assert_eq!(options.walk_speed, WalkSpeed::Normal);
        assert_eq!(options.accessibility, Accessibility::Neutral);
        assert!(options.flags.is_empty());
        assert!(options.min_change_time().is_none());
        assert!(options.allows(Product::Ferry));
    }

    #[test]
    fn builder_options() {
        let options = TripOptions::default()
            .with_products([Product::Bus, Product::Tram].into_iter().collect())
            .with_optimize(Optimize::LeastChanges)
            .with_walk_speed(WalkSpeed::Slow)
            .with_accessibility(Accessibility::BarrierFree)
            .with_flag(TripFlag::Bike)
            .with_max_changes(2)
            .with_min_change_mins(7);

        assert!(options.allows(Product::Bus));
        assert!(!options.allows(Product::HighSpeedTrain));
        assert_eq!(options.max_changes, Some(2));
        assert_eq!(options.min_change_time(), Some(Duration::minutes(7)));
        assert!(options.flags.contains(&TripFlag::Bike));
    }

    #[test]
    fn query_builder() {
        let time = Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap();
        let query = TripQuery::new(Location::any("Alexanderplatz"), Location::any("Zoo"), time)
            .with_via(Location::any("Friedrichstraße"))
            .arriving_by();

        assert_eq!(query.kind, EventKind::Arrival);
        assert_eq!(query.via.as_ref().and_then(Location::name), Some("Friedrichstraße"));
    }
}
