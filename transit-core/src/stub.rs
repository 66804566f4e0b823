//! Deterministic in-memory provider.
//!
//! Serves a small fixed network: the RE 1 corridor Aachen Hbf - Düren -
//! Köln Hbf - Bonn Hbf with a train every 30 minutes in each direction, plus
//! Köln Messe/Deutz as an equivalent station of Köln Hbf. Everything is
//! computed from the request, and contexts carry all state, so a context
//! issued by one instance is honoured by any other instance with the same id.
//!
//! Useful for testing callers without network access, and as a reference
//! for writing adapters.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::domain::{
    Coordinate, Departure, DomainError, Fare, FareType, Line, LineDestination, Location,
    LocationType, Position, Product, PublicLeg, Shape, StationDepartures, Stop, StopEvent, Style,
    SuggestedLocation, Trip, sort_by_priority,
};
use crate::protocol::{
    Capability, ContextPayload, EventKind, NearbyLocationsResult, NetworkProvider, PageDirection,
    ProviderError, QueryDeparturesResult, QueryJourneyDetailContext, QueryJourneyDetailResult,
    QueryTripsContext, QueryTripsResult, RefreshTripContext, SuggestLocationsResult, TripQuery,
    TripsPage,
};

pub const AACHEN_HBF: &str = "8000001";
pub const DUEREN: &str = "8000085";
pub const KOELN_HBF: &str = "8000207";
pub const KOELN_MESSE_DEUTZ: &str = "8003368";
pub const BONN_HBF: &str = "8000044";

/// (id, place, name, lat, lon)
const STATIONS: &[(&str, Option<&str>, &str, i32, i32)] = &[
    (AACHEN_HBF, Some("Aachen"), "Hbf", 50_767_803, 6_091_504),
    (DUEREN, None, "Düren", 50_809_553, 6_482_340),
    (KOELN_HBF, None, "Köln Hbf", 50_942_823, 6_958_730),
    (KOELN_MESSE_DEUTZ, None, "Köln Messe/Deutz", 50_940_871, 6_974_870),
    (BONN_HBF, Some("Bonn"), "Hbf", 50_732_007, 7_097_136),
];

/// RE 1 stops with minutes from Aachen.
const CORRIDOR: &[(&str, i64)] = &[(AACHEN_HBF, 0), (DUEREN, 20), (KOELN_HBF, 55), (BONN_HBF, 75)];

const EQUIVALENTS: &[(&str, &str)] = &[(KOELN_HBF, KOELN_MESSE_DEUTZ)];

const HEADWAY_MINS: i64 = 30;
const BOARD_INTERVAL_MINS: i64 = 10;
const PAGE_SIZE: i64 = 3;
/// Pages run from `-MAX_PAGE` to `MAX_PAGE`.
const MAX_PAGE: i64 = 3;
const DEFAULT_NEARBY_METERS: u32 = 5_000;
/// Coordinates further than this from every station don't resolve.
const SNAP_METERS: f64 = 1_000.0;
/// Reach of a search around its anchor: every page, the longest ride and one
/// change.
const SEARCH_WINDOW_MINS: i64 =
    (MAX_PAGE + 1) * PAGE_SIZE * HEADWAY_MINS + 2 * CORRIDOR[CORRIDOR.len() - 1].1 + HEADWAY_MINS;

const ALL_CAPABILITIES: &[Capability] = &[
    Capability::Suggest,
    Capability::Nearby,
    Capability::Departures,
    Capability::Trips,
    Capability::TripsVia,
    Capability::Refresh,
    Capability::JourneyDetail,
];

/// One trip search as carried in contexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Search {
    from: String,
    via: Option<String>,
    to: String,
    /// First departure of page 0, epoch ms
    anchor: i64,
}

/// One train along the corridor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Run {
    /// Towards Bonn
    forward: bool,
    /// Departure from the first stop, epoch ms
    start: i64,
}

impl Run {
    /// Minutes from the first stop to corridor position `idx`.
    fn offset(forward: bool, idx: usize) -> i64 {
        let last = CORRIDOR[CORRIDOR.len() - 1].1;
        if forward {
            CORRIDOR[idx].1
        } else {
            last - CORRIDOR[idx].1
        }
    }

    /// Planned time at corridor position `idx`.
    fn time_at(self, idx: usize) -> Result<DateTime<Utc>, ProviderError> {
        millis(self.start)
            .and_then(|start| plus_mins(start, Self::offset(self.forward, idx)))
            .ok_or_else(|| out_of_range("run time"))
    }

    /// Run that reaches `idx` at `time`.
    fn through(idx: usize, time: DateTime<Utc>, forward: bool) -> Result<Self, ProviderError> {
        let start = plus_mins(time, -Self::offset(forward, idx)).ok_or_else(|| out_of_range("run start"))?;
        Ok(Run {
            forward,
            start: start.timestamp_millis(),
        })
    }

    fn delay(self) -> Duration {
        Duration::minutes((self.start / 60_000 / HEADWAY_MINS).rem_euclid(4))
    }
}

fn millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}

fn plus_mins(time: DateTime<Utc>, mins: i64) -> Option<DateTime<Utc>> {
    time.checked_add_signed(Duration::try_minutes(mins)?)
}

/// Rounds down to a multiple of `mins`.
fn floor_to(time: DateTime<Utc>, mins: i64) -> Option<DateTime<Utc>> {
    let step = mins * 60_000;
    millis(time.timestamp_millis().div_euclid(step) * step)
}

/// A time carried in a context that chrono cannot represent.
fn out_of_range(what: &str) -> ProviderError {
    ProviderError::InvalidContext(format!("{what} out of range"))
}

fn corridor_index(id: &str) -> Option<usize> {
    CORRIDOR.iter().position(|(station, _)| *station == id)
}

fn re1() -> Line {
    let mut line = Line::new(
        Some("DB Regio NRW".into()),
        Some(Product::RegionalTrain),
        Some("RE 1".into()),
    )
    .with_style(Style::new(Shape::Rect, 0xFFEC_0016, Style::WHITE));
    line.id = Some("de:nrw:RE1".into());
    line
}

fn s12() -> Line {
    Line::new(Some("DB Regio NRW".into()), Some(Product::SuburbanTrain), Some("S 12".into()))
        .with_style(Style::new(Shape::Rounded, 0xFF00_8D4F, Style::WHITE))
}

enum Resolved {
    One(Location),
    Many(Vec<Location>),
    Unknown,
}

impl Resolved {
    fn candidates(&self) -> Vec<Location> {
        match self {
            Resolved::Many(candidates) => candidates.clone(),
            _ => Vec::new(),
        }
    }
}

/// In-memory provider over a fixed regional network.
pub struct StubProvider {
    id: String,
    capabilities: Vec<Capability>,
    stations: Vec<Location>,
    /// (station id, planned departure epoch ms) of cancelled departures
    cancelled: RwLock<BTreeSet<(String, i64)>>,
    requests: AtomicUsize,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StubProvider {
    pub fn new() -> Self {
        Self::with_id("stub")
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let stations = STATIONS
            .iter()
            .filter_map(|&(station_id, place, name, lat, lon)| {
                let mut products: BTreeSet<Product> = [Product::RegionalTrain].into();
                if station_id == KOELN_HBF || station_id == KOELN_MESSE_DEUTZ {
                    products.insert(Product::SuburbanTrain);
                }
                Location::named_station(station_id, place, name)
                    .ok()
                    .map(|station| station.with_coord(Coordinate::new(lat, lon)).with_products(products))
            })
            .collect();

        Self {
            id: id.into(),
            capabilities: ALL_CAPABILITIES.to_vec(),
            stations,
            cancelled: RwLock::new(BTreeSet::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Restricts the advertised capabilities.
    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Number of operations served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn station(&self, id: &str) -> Option<&Location> {
        self.stations.iter().find(|station| station.id() == Some(id))
    }

    pub fn stations(&self) -> &[Location] {
        &self.stations
    }

    /// Cancels the train leaving `station_id` at `planned`. Trips and
    /// refreshes issued afterwards show the departure as cancelled.
    pub async fn cancel_departure(&self, station_id: &str, planned: DateTime<Utc>) {
        self.cancelled
            .write()
            .await
            .insert((station_id.to_string(), planned.timestamp_millis()));
    }

    fn count_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    fn corridor_station(&self, idx: usize) -> Option<&Location> {
        CORRIDOR.get(idx).and_then(|(id, _)| self.station(id))
    }

    fn resolve(&self, location: &Location) -> Resolved {
        if let Some(id) = location.id() {
            return self
                .station(id)
                .cloned()
                .map_or(Resolved::Unknown, Resolved::One);
        }
        if let Some(coord) = location.coordinate() {
            return self
                .stations
                .iter()
                .map(|station| (station, station.coordinate().map(|c| c.distance_to(&coord))))
                .filter_map(|(station, distance)| Some((station, distance?)))
                .filter(|(_, distance)| *distance <= SNAP_METERS)
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(Resolved::Unknown, |(station, _)| Resolved::One(station.clone()));
        }
        let Some(name) = location.name() else {
            return Resolved::Unknown;
        };
        let needle = name.trim().to_lowercase();
        let mut matches: Vec<Location> = self
            .stations
            .iter()
            .filter(|station| station.unique_long_name().to_lowercase().contains(&needle))
            .cloned()
            .collect();
        match matches.len() {
            0 => Resolved::Unknown,
            1 => matches.pop().map_or(Resolved::Unknown, Resolved::One),
            _ => Resolved::Many(matches),
        }
    }

    fn stop_event(&self, planned: DateTime<Utc>, run: Run, cancelled: bool) -> Option<StopEvent> {
        let platform = if run.forward { "2" } else { "1" };
        let predicted = planned.checked_add_signed(run.delay());
        StopEvent::new(Some(planned), predicted).map(|event| {
            event
                .with_platforms(Some(Position::new(platform)), Some(Position::new(platform)))
                .with_cancelled(cancelled)
        })
    }

    /// Ride on `run` from corridor position `from` to `to`.
    fn ride(
        &self,
        from: usize,
        to: usize,
        run: Run,
        cancelled: &BTreeSet<(String, i64)>,
    ) -> Result<PublicLeg, ProviderError> {
        let unknown = || ProviderError::Other("corridor station missing".into());
        let indices: Vec<usize> = if from <= to {
            (from..=to).collect()
        } else {
            (to..=from).rev().collect()
        };

        let mut stops = Vec::with_capacity(indices.len());
        for (n, &idx) in indices.iter().enumerate() {
            let location = self.corridor_station(idx).ok_or_else(unknown)?.clone();
            let planned = run.time_at(idx)?;
            let key = (location.id().unwrap_or_default().to_string(), planned.timestamp_millis());
            let is_cancelled = cancelled.contains(&key);
            let arrival = (n > 0).then(|| self.stop_event(planned, run, false)).flatten();
            let departure = (n + 1 < indices.len())
                .then(|| self.stop_event(planned, run, is_cancelled))
                .flatten();
            stops.push(Stop::new(location, arrival, departure));
        }

        let path: Vec<Coordinate> = stops
            .iter()
            .filter_map(|stop| stop.location().coordinate())
            .collect();
        let arrival_stop = stops.pop().ok_or_else(unknown)?;
        let intermediate = stops.split_off(1.min(stops.len()));
        let departure_stop = stops.pop().ok_or_else(unknown)?;

        let terminus = if run.forward { CORRIDOR.len() - 1 } else { 0 };
        let mut payload = ContextPayload::new();
        payload.insert("run", &run)?;

        let leg = PublicLeg::new(
            re1(),
            self.corridor_station(terminus).cloned(),
            departure_stop,
            arrival_stop,
        )
        .map_err(|e: DomainError| ProviderError::Parse(e.to_string()))?
        .with_intermediate_stops(intermediate)
        .with_path(path)
        .with_journey_context(QueryJourneyDetailContext::new(&self.id, payload));
        Ok(leg)
    }

    /// The trip boarding `search.from` at `departure`.
    fn build_trip(
        &self,
        search: &Search,
        departure: DateTime<Utc>,
        cancelled: &BTreeSet<(String, i64)>,
    ) -> Result<Trip, ProviderError> {
        let not_served = || ProviderError::Other("station not on the corridor".into());
        let from = corridor_index(&search.from).ok_or_else(not_served)?;
        let to = corridor_index(&search.to).ok_or_else(not_served)?;
        let forward = from < to;

        let first = Run::through(from, departure, forward)?;
        let legs = match search.via.as_deref().map(corridor_index) {
            None => vec![self.ride(from, to, first, cancelled)?.into()],
            Some(Some(via)) => {
                // Change at via to the following train
                let onward = plus_mins(first.time_at(via)?, HEADWAY_MINS)
                    .ok_or_else(|| out_of_range("connection"))?;
                let connection = Run::through(via, onward, forward)?;
                vec![
                    self.ride(from, via, first, cancelled)?.into(),
                    self.ride(via, to, connection, cancelled)?.into(),
                ]
            }
            Some(None) => return Err(not_served()),
        };

        let mut payload = ContextPayload::new();
        payload.insert("search", search)?;
        payload.insert("departure", &departure.timestamp_millis())?;

        let minutes = (CORRIDOR[from].1 - CORRIDOR[to].1).abs();
        let fare = Fare {
            network: Some("VRS".into()),
            fare_type: FareType::Adult,
            currency: "EUR".into(),
            amount: 2.5 + 0.25 * minutes as f32,
            units_name: None,
            units: None,
        };

        let origin = self.corridor_station(from).ok_or_else(not_served)?.clone();
        let destination = self.corridor_station(to).ok_or_else(not_served)?.clone();
        Trip::new(
            None,
            origin,
            destination,
            legs,
            vec![fare],
            Some(RefreshTripContext::new(&self.id, payload)),
        )
        .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    async fn trips_page(&self, search: &Search, page: i64) -> Result<QueryTripsResult, ProviderError> {
        let cancelled = self.cancelled.read().await.clone();
        let anchor = millis(search.anchor).ok_or_else(|| out_of_range("search anchor"))?;

        let mut trips = Vec::new();
        for slot in 0..PAGE_SIZE {
            let departure = plus_mins(anchor, (page * PAGE_SIZE + slot) * HEADWAY_MINS)
                .ok_or_else(|| out_of_range("departure"))?;
            trips.push(self.build_trip(search, departure, &cancelled)?);
        }

        let mut payload = ContextPayload::new();
        payload.insert("search", search)?;
        payload.insert("page", &page)?;
        let context =
            QueryTripsContext::new(&self.id, page < MAX_PAGE, page > -MAX_PAGE).with_payload(payload);

        let lookup = |id: &str| {
            self.station(id)
                .cloned()
                .ok_or_else(|| ProviderError::Other(format!("unknown station {id}")))
        };
        let messages = if trips.iter().any(Trip::is_cancelled) {
            vec!["Zugausfälle auf der Linie RE 1".to_string()]
        } else {
            Vec::new()
        };

        trace!(page, trips = trips.len(), "built trips page");
        Ok(QueryTripsResult::Success(TripsPage {
            context: Some(context),
            from: lookup(&search.from)?,
            via: search.via.as_deref().map(&lookup).transpose()?,
            to: lookup(&search.to)?,
            trips,
            messages,
        }))
    }

    /// Board starting at `first`; ends early where times run out of range.
    fn board(&self, station: &Location, kind: EventKind, first: DateTime<Utc>, max: usize) -> StationDepartures {
        let others: Vec<&Location> = self
            .stations
            .iter()
            .filter(|other| *other != station)
            .collect();

        let departures: Vec<Departure> = (0..max)
            .map_while(|i| {
                let n = i64::try_from(i).ok()?;
                let planned = plus_mins(first, n.checked_mul(BOARD_INTERVAL_MINS)?)?;
                let predicted = plus_mins(planned, n % 3);
                let line = if i % 2 == 0 { re1() } else { s12() };
                let destination = others.get(i % others.len().max(1)).map(|l| (*l).clone());
                Departure::new(Some(planned), predicted, line, destination)
                    .map(|mut departure| {
                        departure.position = Some(Position::new(format!("{}", 1 + i % 3)));
                        departure
                    })
            })
            .collect();

        let mut lines: Vec<LineDestination> = Vec::new();
        for departure in &departures {
            let served = LineDestination {
                line: departure.line.clone(),
                destination: departure.destination.clone(),
            };
            if !lines.contains(&served) {
                lines.push(served);
            }
        }

        trace!(station = %station, ?kind, departures = departures.len(), "built board");
        StationDepartures::new(station.clone(), departures, Some(lines))
    }

    fn journey_run(&self, context: &QueryJourneyDetailContext) -> Result<Run, ProviderError> {
        context.check_issuer(&self.id)?;
        context.payload().get("run")
    }
}

impl NetworkProvider for StubProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    async fn suggest_locations(
        &self,
        constraint: &str,
        types: &[LocationType],
        max: usize,
    ) -> SuggestLocationsResult {
        self.count_request();
        let needle = constraint.trim().to_lowercase();
        if needle.is_empty() || !(types.is_empty() || types.contains(&LocationType::Station)) {
            return SuggestLocationsResult::Success(Vec::new());
        }

        let mut found: Vec<SuggestedLocation> = self
            .stations
            .iter()
            .filter_map(|station| {
                let name = station.unique_long_name().to_lowercase();
                let priority = if name.starts_with(&needle) {
                    2
                } else if name.contains(&needle) || station.id() == Some(constraint.trim()) {
                    1
                } else {
                    return None;
                };
                Some(SuggestedLocation::new(station.clone(), priority))
            })
            .collect();
        sort_by_priority(&mut found);
        found.truncate(max);
        SuggestLocationsResult::Success(found)
    }

    async fn query_nearby_locations(
        &self,
        anchor: &Location,
        types: &[LocationType],
        max_distance: u32,
        max: usize,
    ) -> NearbyLocationsResult {
        self.count_request();
        let center = match (anchor.id(), anchor.coordinate()) {
            (Some(id), _) => match self.station(id).and_then(Location::coordinate) {
                Some(coord) => coord,
                None => return NearbyLocationsResult::InvalidId,
            },
            (None, Some(coord)) => coord,
            (None, None) => {
                return ProviderError::Other("nearby search needs an id or a coordinate".into()).into();
            }
        };
        if !(types.is_empty() || types.contains(&LocationType::Station)) {
            return NearbyLocationsResult::Success(Vec::new());
        }

        let radius = if max_distance == 0 {
            DEFAULT_NEARBY_METERS
        } else {
            max_distance
        };
        let mut nearby: Vec<(f64, &Location)> = self
            .stations
            .iter()
            .filter_map(|station| Some((station.coordinate()?.distance_to(&center), station)))
            .filter(|(distance, _)| *distance <= f64::from(radius))
            .collect();
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0));

        NearbyLocationsResult::Success(
            nearby
                .into_iter()
                .take(max)
                .map(|(_, station)| station.clone())
                .collect(),
        )
    }

    async fn query_departures(
        &self,
        station_id: &str,
        kind: EventKind,
        time: DateTime<Utc>,
        max: usize,
        equivs: bool,
    ) -> QueryDeparturesResult {
        self.count_request();
        let Some(station) = self.station(station_id) else {
            return QueryDeparturesResult::InvalidStation;
        };
        let Some(first) = floor_to(time, BOARD_INTERVAL_MINS) else {
            return ProviderError::Other(format!("board time {time} out of range")).into();
        };

        let mut ids = vec![station_id];
        if equivs {
            ids.extend(EQUIVALENTS.iter().filter_map(|&(a, b)| match station_id {
                id if id == a => Some(b),
                id if id == b => Some(a),
                _ => None,
            }));
        }

        let boards = join_all(ids.iter().map(|id| async move {
            self.station(id)
                .map(|equivalent| self.board(equivalent, kind, first, max))
        }))
        .await;

        let boards: Vec<StationDepartures> = boards.into_iter().flatten().collect();
        debug!(station = %station, boards = boards.len(), "departures served");
        QueryDeparturesResult::Success(StationDepartures::merge_equivalent_boards(boards))
    }

    async fn query_trips(&self, query: &TripQuery) -> QueryTripsResult {
        self.count_request();

        let from = self.resolve(&query.from);
        let via = query.via.as_ref().map(|via| self.resolve(via));
        let to = self.resolve(&query.to);

        let via_many = matches!(via, Some(Resolved::Many(_)));
        if matches!(from, Resolved::Many(_)) || via_many || matches!(to, Resolved::Many(_)) {
            return QueryTripsResult::AmbiguousLocation {
                from: from.candidates(),
                via: via.as_ref().map(Resolved::candidates).unwrap_or_default(),
                to: to.candidates(),
            };
        }

        let (Resolved::One(from), Resolved::One(to)) = (from, to) else {
            return ProviderError::Other("unknown origin or destination".into()).into();
        };
        let via = match via {
            None => None,
            Some(Resolved::One(via)) => Some(via),
            Some(_) => return ProviderError::Other("unknown via location".into()).into(),
        };
        if from == to {
            return QueryTripsResult::TooClose;
        }
        if !query.options.allows(Product::RegionalTrain) {
            return QueryTripsResult::NoTrips;
        }

        let (Some(from_idx), Some(to_idx)) = (
            from.id().and_then(corridor_index),
            to.id().and_then(corridor_index),
        ) else {
            return QueryTripsResult::NoTrips;
        };
        if let Some(via) = &via {
            let between = via
                .id()
                .and_then(corridor_index)
                .is_some_and(|idx| from_idx.min(to_idx) < idx && idx < from_idx.max(to_idx));
            if !between {
                return QueryTripsResult::NoTrips;
            }
        }

        let travel = (CORRIDOR[from_idx].1 - CORRIDOR[to_idx].1).abs();
        let lead = match query.kind {
            EventKind::Departure => 0,
            EventKind::Arrival => travel + PAGE_SIZE * HEADWAY_MINS,
        };
        let anchor = floor_to(query.time, HEADWAY_MINS).and_then(|time| plus_mins(time, -lead));
        let in_range = anchor.filter(|anchor| {
            plus_mins(*anchor, -SEARCH_WINDOW_MINS).is_some() && plus_mins(*anchor, SEARCH_WINDOW_MINS).is_some()
        });
        let Some(anchor) = in_range else {
            debug!(time = %query.time, "search time at the edge of the calendar");
            return QueryTripsResult::NoTrips;
        };

        let search = Search {
            from: from.id().unwrap_or_default().to_string(),
            via: via.as_ref().and_then(Location::id).map(str::to_string),
            to: to.id().unwrap_or_default().to_string(),
            anchor: anchor.timestamp_millis(),
        };
        debug!(from = %from, to = %to, anchor = %anchor, "trip search");
        self.trips_page(&search, 0).await.unwrap_or_else(QueryTripsResult::Failure)
    }

    async fn query_more_trips(
        &self,
        context: &QueryTripsContext,
        direction: PageDirection,
    ) -> QueryTripsResult {
        self.count_request();
        let result = async {
            context.check_issuer(&self.id)?;
            let search: Search = context.payload().get("search")?;
            let page: i64 = context.payload().get("page")?;
            let page = match direction {
                PageDirection::Later => page.saturating_add(1),
                PageDirection::Earlier => page.saturating_sub(1),
            };
            if !(-MAX_PAGE..=MAX_PAGE).contains(&page) {
                return Ok(QueryTripsResult::NoTrips);
            }
            self.trips_page(&search, page).await
        };
        result.await.unwrap_or_else(QueryTripsResult::Failure)
    }

    async fn refresh_trip(&self, context: &RefreshTripContext) -> QueryTripsResult {
        self.count_request();
        let result = async {
            context.check_issuer(&self.id)?;
            let search: Search = context.payload().get("search")?;
            let departure: i64 = context.payload().get("departure")?;
            let cancelled = self.cancelled.read().await.clone();
            let departure = millis(departure).ok_or_else(|| out_of_range("departure"))?;
            let trip = self.build_trip(&search, departure, &cancelled)?;
            Ok::<_, ProviderError>(QueryTripsResult::Success(TripsPage {
                context: None,
                from: trip.from().clone(),
                via: None,
                to: trip.to().clone(),
                trips: vec![trip],
                messages: Vec::new(),
            }))
        };
        result.await.unwrap_or_else(QueryTripsResult::Failure)
    }

    async fn query_journey_detail(&self, context: &QueryJourneyDetailContext) -> QueryJourneyDetailResult {
        self.count_request();
        if let Err(e) = context.check_issuer(&self.id) {
            return e.into();
        }
        let Ok(run) = self.journey_run(context) else {
            return QueryJourneyDetailResult::InvalidId;
        };

        let cancelled = self.cancelled.read().await.clone();
        let (from, to) = if run.forward {
            (0, CORRIDOR.len() - 1)
        } else {
            (CORRIDOR.len() - 1, 0)
        };
        match self.ride(from, to, run, &cancelled) {
            Ok(leg) => QueryJourneyDetailResult::Success {
                context: context.clone(),
                leg,
            },
            Err(e) => e.into(),
        }
    }
}
