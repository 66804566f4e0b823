//! Disk store for trips and contexts.
//!
//! Each entry is one JSON file `{dir}/{key}.json` holding the write time and
//! a codec envelope. Entries older than the TTL are treated as absent, so a
//! resumed search never pages with a context the backend has long forgotten.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::{self, Archive, CodecError};
use crate::domain::Trip;
use crate::protocol::{NetworkProvider, ProviderError, QueryTripsContext, TripSession};

/// Default TTL: 24 hours.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors from the disk store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Stored entry could not be decoded
    #[error("corrupt entry: {0}")]
    Codec(#[from] CodecError),

    /// Keys are limited to ASCII letters, digits, '-', '_' and '.'
    #[error("invalid key '{0}'")]
    InvalidKey(String),

    #[error("system time before unix epoch")]
    Clock,
}

/// A stored entry with metadata.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    /// Unix timestamp when the entry was written.
    saved_at_secs: u64,
    /// Codec envelope of the stored value.
    envelope: String,
}

/// Configuration for the context store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the entry files.
    pub dir: PathBuf,
    /// How long an entry remains valid.
    pub ttl: Duration,
}

impl StoreConfig {
    /// Create a new store config with the given directory and default TTL (24 hours).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Set a custom TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("transit_store")
    }
}

/// Disk store for archived values.
#[derive(Debug, Clone)]
pub struct ContextStore {
    config: StoreConfig,
}

fn now_secs() -> Result<u64, StoreError> {
    Ok(SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| StoreError::Clock)?
        .as_secs())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl ContextStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.config.dir.join(format!("{key}.json")))
    }

    /// Writes `value` under `key`, replacing any previous entry.
    ///
    /// Creates the store directory if it doesn't exist.
    pub fn save<T: Archive>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let entry = StoredEntry {
            saved_at_secs: now_secs()?,
            envelope: codec::encode(value)?,
        };

        std::fs::create_dir_all(&self.config.dir).map_err(io_error(&self.config.dir))?;
        let json = serde_json::to_string_pretty(&entry).map_err(CodecError::from)?;
        std::fs::write(&path, json).map_err(io_error(&path))?;

        debug!(key, kind = T::KIND, "saved entry");
        Ok(())
    }

    /// Reads the entry under `key`.
    ///
    /// Returns `Ok(None)` if there is no entry or it has expired; expired
    /// entries are deleted.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors and on entries that cannot be decoded as `T`.
    pub fn load<T: Archive>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key)?;
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        let entry: StoredEntry = serde_json::from_str(&contents).map_err(CodecError::from)?;

        // Check if entry has expired
        let age_secs = now_secs()?.saturating_sub(entry.saved_at_secs);
        if age_secs >= self.config.ttl.as_secs() {
            debug!(key, age_secs, "entry expired");
            self.remove(key)?;
            return Ok(None);
        }

        Ok(Some(codec::decode(&entry.envelope)?))
    }

    /// Deletes the entry under `key`. Returns whether there was one.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path)(e)),
        }
    }

    /// Deletes expired and unreadable entries. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let entries = match std::fs::read_dir(&self.config.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(io_error(&self.config.dir)(e)),
        };

        let now = now_secs()?;
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(io_error(&self.config.dir))?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let stale = match std::fs::read_to_string(&path)
                .ok()
                .and_then(|contents| serde_json::from_str::<StoredEntry>(&contents).ok())
            {
                Some(stored) => now.saturating_sub(stored.saved_at_secs) >= self.config.ttl.as_secs(),
                None => {
                    warn!(path = %path.display(), "removing unreadable entry");
                    true
                }
            };
            if stale {
                std::fs::remove_file(&path).map_err(io_error(&path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// A trip search persisted for resumption after restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub context: Option<QueryTripsContext>,
    pub trips: Vec<Trip>,
}

impl Archive for SavedSearch {
    const KIND: &'static str = "SavedSearch";
}

impl SavedSearch {
    pub fn from_session<P: NetworkProvider>(session: &TripSession<P>) -> Self {
        Self {
            context: session.context().cloned(),
            trips: session.trips().to_vec(),
        }
    }

    /// Rebuilds a session on `provider`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidContext` if `provider` did not issue the context.
    pub fn into_session<P: NetworkProvider>(self, provider: P) -> Result<TripSession<P>, ProviderError> {
        TripSession::resume(provider, self.context, self.trips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Location;
    use crate::protocol::{PageDirection, TripQuery};
    use crate::stub::{self, StubProvider};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn stub_station(id: &str) -> Location {
        StubProvider::new().station(id).unwrap().clone()
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let store = ContextStore::new(StoreConfig::new(dir.path()));

        let location = Location::named_station("8000001", Some("Aachen"), "Hbf").unwrap();
        store.save("home", &location).unwrap();

        let loaded: Location = store.load("home").unwrap().unwrap();
        assert_eq!(loaded, location);
        assert_eq!(loaded.unique_short_name(), "Aachen, Hbf");
    }

    #[test]
    fn expired_entry_returns_none() {
        let dir = tempdir().unwrap();
        let store = ContextStore::new(StoreConfig::new(dir.path()).with_ttl(Duration::from_secs(0)));

        store.save("home", &Location::any("Dom")).unwrap();

        // With 0 TTL, entry should immediately be expired
        assert!(store.load::<Location>("home").unwrap().is_none());
        assert!(!dir.path().join("home.json").exists());
    }

    #[test]
    fn missing_entry_returns_none() {
        let store = ContextStore::new(StoreConfig::new("/nonexistent/path/store"));
        assert!(store.load::<Location>("home").unwrap().is_none());
        assert!(!store.remove("home").unwrap());
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn wrong_kind_is_an_error() {
        let dir = tempdir().unwrap();
        let store = ContextStore::new(StoreConfig::new(dir.path()));

        store.save("home", &Location::any("Dom")).unwrap();
        let err = store.load::<QueryTripsContext>("home").unwrap_err();
        assert!(matches!(err, StoreError::Codec(CodecError::Kind { .. })));

        std::fs::write(dir.path().join("junk.json"), "not json").unwrap();
        assert!(matches!(store.load::<Location>("junk"), Err(StoreError::Codec(_))));
    }

    #[test]
    fn rejects_path_like_keys() {
        let store = ContextStore::new(StoreConfig::default());
        for key in ["", "../etc/passwd", ".hidden", "a/b", "ä"] {
            assert!(matches!(
                store.save(key, &Location::any("x")),
                Err(StoreError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn creates_directory_and_purges() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("nested").join("store");
        let store = ContextStore::new(StoreConfig::new(&nested));

        store.save("a", &Location::any("A")).unwrap();
        store.save("b", &Location::any("B")).unwrap();
        std::fs::write(nested.join("broken.json"), "{").unwrap();
        assert!(nested.join("a.json").exists());

        // Only the broken one goes with the default TTL
        assert_eq!(store.purge_expired().unwrap(), 1);

        let expiring = ContextStore::new(StoreConfig::new(&nested).with_ttl(Duration::from_secs(0)));
        assert_eq!(expiring.purge_expired().unwrap(), 2);
    }

    #[tokio::test]
    async fn resume_search_after_restart() {
        let dir = tempdir().unwrap();
        let store = ContextStore::new(StoreConfig::new(dir.path()));
        let time = chrono::Utc.with_ymd_and_hms(2024, 3, 15, 8, 0, 0).unwrap();

        let mut session = TripSession::new(StubProvider::new());
        session
            .search(TripQuery::new(
                stub_station(stub::AACHEN_HBF),
                stub_station(stub::BONN_HBF),
                time,
            ))
            .await;
        store.save("search", &SavedSearch::from_session(&session)).unwrap();
        let before: Vec<String> = session.trips().iter().map(|t| t.id().to_string()).collect();

        // New process: fresh provider, state from disk
        let saved: SavedSearch = store.load("search").unwrap().unwrap();
        let mut resumed = saved.into_session(StubProvider::new()).unwrap();
        let restored: Vec<String> = resumed.trips().iter().map(|t| t.id().to_string()).collect();
        assert_eq!(restored, before);

        let page = resumed.more(PageDirection::Later).await.unwrap();
        assert!(page.is_success());
        assert!(resumed.trips().len() > before.len());

        // A different provider refuses the context
        let saved: SavedSearch = store.load("search").unwrap().unwrap();
        assert!(saved.into_session(StubProvider::with_id("other")).is_err());
    }
}
