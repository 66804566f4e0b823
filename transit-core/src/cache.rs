//! Caching layer for provider responses.
//!
//! Location lookups change rarely and are cached as-is. Departure boards are
//! cached per time bucket (5 minutes by default) which bounds cache
//! cardinality while keeping boards reasonably fresh. Trip searches, paging,
//! refresh and journey detail always go to the backend: their contexts and
//! real-time data must not be replayed.
//!
//! Only successful results are cached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use tracing::trace;

use crate::domain::{Location, LocationType, StationDepartures, SuggestedLocation};
use crate::protocol::{
    Capability, EventKind, NearbyLocationsResult, NetworkProvider, PageDirection,
    QueryDeparturesResult, QueryJourneyDetailContext, QueryJourneyDetailResult,
    QueryTripsContext, QueryTripsResult, RefreshTripContext, SuggestLocationsResult, TripQuery,
};

/// Cache key for suggestions: (normalized constraint, types, max).
type SuggestKey = (String, Vec<LocationType>, usize);

/// Cache key for nearby lookups: (anchor, types, max distance, max).
type NearbyKey = (String, Vec<LocationType>, u32, usize);

/// Cache key for boards: (station id, kind, time bucket, max, equivs).
/// Time bucket is epoch minutes divided by the bucket size.
type BoardKey = (String, EventKind, i64, usize, bool);

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries per operation.
    pub max_capacity: u64,

    /// Time bucket size in minutes.
    pub bucket_mins: u16,
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Zero is treated as one minute.
    pub fn with_bucket_mins(mut self, bucket_mins: u16) -> Self {
        self.bucket_mins = bucket_mins.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_capacity: 1000,
            bucket_mins: 5,
        }
    }
}

/// Provider wrapper that caches location lookups and departure boards.
pub struct CachedProvider<P> {
    inner: P,
    suggestions: MokaCache<SuggestKey, Arc<Vec<SuggestedLocation>>>,
    nearby: MokaCache<NearbyKey, Arc<Vec<Location>>>,
    boards: MokaCache<BoardKey, Arc<Vec<StationDepartures>>>,
    bucket_mins: i64,
}

impl<P: NetworkProvider> CachedProvider<P> {
    /// Create a new cached provider with the given configuration.
    pub fn new(inner: P, config: &CacheConfig) -> Self {
        Self {
            inner,
            suggestions: build(config),
            nearby: build(config),
            boards: build(config),
            bucket_mins: i64::from(config.bucket_mins.max(1)),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Compute the time bucket for a query time.
    fn time_bucket(&self, time: DateTime<Utc>) -> i64 {
        time.timestamp().div_euclid(60).div_euclid(self.bucket_mins)
    }

    /// Invalidate all cached entries.
    pub fn invalidate_all(&self) {
        self.suggestions.invalidate_all();
        self.nearby.invalidate_all();
        self.boards.invalidate_all();
    }
}

fn build<K, V>(config: &CacheConfig) -> MokaCache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    MokaCache::builder()
        .time_to_live(config.ttl)
        .max_capacity(config.max_capacity)
        .build()
}

/// Key for an anchor: the id when identified, otherwise the coordinate.
fn anchor_key(anchor: &Location) -> String {
    match (anchor.id(), anchor.coordinate()) {
        (Some(id), _) => format!("id:{id}"),
        (None, Some(coord)) => format!("coord:{}:{}", coord.lat, coord.lon),
        (None, None) => format!("name:{}", anchor.unique_long_name()),
    }
}

impl<P: NetworkProvider> NetworkProvider for CachedProvider<P> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn capabilities(&self) -> &[Capability] {
        self.inner.capabilities()
    }

    async fn suggest_locations(
        &self,
        constraint: &str,
        types: &[LocationType],
        max: usize,
    ) -> SuggestLocationsResult {
        let key = (constraint.trim().to_lowercase(), types.to_vec(), max);
        if let Some(cached) = self.suggestions.get(&key).await {
            trace!(constraint, "suggestion cache hit");
            return SuggestLocationsResult::Success(cached.as_ref().clone());
        }

        let result = self.inner.suggest_locations(constraint, types, max).await;
        if let SuggestLocationsResult::Success(found) = &result {
            self.suggestions.insert(key, Arc::new(found.clone())).await;
        }
        result
    }

    async fn query_nearby_locations(
        &self,
        anchor: &Location,
        types: &[LocationType],
        max_distance: u32,
        max: usize,
    ) -> NearbyLocationsResult {
        let key = (anchor_key(anchor), types.to_vec(), max_distance, max);
        if let Some(cached) = self.nearby.get(&key).await {
            trace!(anchor = %anchor, "nearby cache hit");
            return NearbyLocationsResult::Success(cached.as_ref().clone());
        }

        let result = self
            .inner
            .query_nearby_locations(anchor, types, max_distance, max)
            .await;
        if let NearbyLocationsResult::Success(found) = &result {
            self.nearby.insert(key, Arc::new(found.clone())).await;
        }
        result
    }

    async fn query_departures(
        &self,
        station_id: &str,
        kind: EventKind,
        time: DateTime<Utc>,
        max: usize,
        equivs: bool,
    ) -> QueryDeparturesResult {
        let key = (station_id.to_string(), kind, self.time_bucket(time), max, equivs);
        if let Some(cached) = self.boards.get(&key).await {
            trace!(station_id, bucket = key.2, "board cache hit");
            return QueryDeparturesResult::Success(cached.as_ref().clone());
        }

        let result = self
            .inner
            .query_departures(station_id, kind, time, max, equivs)
            .await;
        if let QueryDeparturesResult::Success(boards) = &result {
            self.boards.insert(key, Arc::new(boards.clone())).await;
        }
        result
    }

    async fn query_trips(&self, query: &TripQuery) -> QueryTripsResult {
        self.inner.query_trips(query).await
    }

    async fn query_more_trips(
        &self,
        context: &QueryTripsContext,
        direction: PageDirection,
    ) -> QueryTripsResult {
        self.inner.query_more_trips(context, direction).await
    }

    async fn refresh_trip(&self, context: &RefreshTripContext) -> QueryTripsResult {
        self.inner.refresh_trip(context).await
    }

    async fn query_journey_detail(
        &self,
        context: &QueryJourneyDetailContext,
    ) -> QueryJourneyDetailResult {
        self.inner.query_journey_detail(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{self, StubProvider};
    use chrono::TimeZone;

    fn stub_station(id: &str) -> Location {
        StubProvider::new().station(id).unwrap().clone()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, h, m, 0).unwrap()
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert_eq!(config.max_capacity, 1000);
        assert_eq!(config.bucket_mins, 5);
        assert_eq!(config.with_bucket_mins(0).bucket_mins, 1);
    }

    #[test]
    fn time_buckets() {
        let cached = CachedProvider::new(StubProvider::new(), &CacheConfig::default());
        assert_eq!(cached.time_bucket(at(10, 0)), cached.time_bucket(at(10, 4)));
        assert_ne!(cached.time_bucket(at(10, 4)), cached.time_bucket(at(10, 5)));
    }

    #[tokio::test]
    async fn boards_cached_within_bucket() {
        let cached = CachedProvider::new(StubProvider::new(), &CacheConfig::default());

        let first = cached
            .query_departures("8000207", EventKind::Departure, at(10, 1), 10, false)
            .await;
        assert!(matches!(first, QueryDeparturesResult::Success(_)));
        assert_eq!(cached.inner().request_count(), 1);

        // Same bucket: served from cache
        cached
            .query_departures("8000207", EventKind::Departure, at(10, 3), 10, false)
            .await;
        assert_eq!(cached.inner().request_count(), 1);

        // Next bucket: fetched again
        cached
            .query_departures("8000207", EventKind::Departure, at(10, 6), 10, false)
            .await;
        assert_eq!(cached.inner().request_count(), 2);
    }

    #[tokio::test]
    async fn failures_not_cached() {
        let cached = CachedProvider::new(StubProvider::new(), &CacheConfig::default());

        for _ in 0..2 {
            let result = cached
                .query_departures("unknown", EventKind::Departure, at(10, 0), 10, false)
                .await;
            assert!(matches!(result, QueryDeparturesResult::InvalidStation));
        }
        assert_eq!(cached.inner().request_count(), 2);
    }

    #[tokio::test]
    async fn suggestions_normalized() {
        let cached = CachedProvider::new(StubProvider::new(), &CacheConfig::default());

        cached.suggest_locations("Köln", &[], 5).await;
        cached.suggest_locations("  köln ", &[], 5).await;
        assert_eq!(cached.inner().request_count(), 1);

        cached.invalidate_all();
        cached.suggest_locations("Köln", &[], 5).await;
        assert_eq!(cached.inner().request_count(), 2);
    }

    #[tokio::test]
    async fn trips_pass_through() {
        let cached = CachedProvider::new(StubProvider::new(), &CacheConfig::default());
        let query = TripQuery::new(
            stub_station(stub::AACHEN_HBF),
            stub_station(stub::BONN_HBF),
            at(10, 0),
        );

        cached.query_trips(&query).await;
        cached.query_trips(&query).await;
        assert_eq!(cached.inner().request_count(), 2);
    }
}
