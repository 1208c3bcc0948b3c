//! Durable key-value mirror of the client playback state.
//!
//! Each persisted field lives under its own key so a corrupt or missing value
//! only loses that field. State is read once at startup and written on every
//! change; write failures are logged and the in-memory state stays
//! authoritative.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PersistenceError, PersistenceResult};
use crate::protocol_constants::{
    KEY_CURRENT_AUDIO_ZONE_ID, KEY_CURRENT_SEEK, KEY_CURRENT_SESSION_ID, KEY_CURRENT_TRACK_LENGTH,
    KEY_PLAYBACK_QUALITY, KEY_PLAYLIST, KEY_PLAYLIST_POSITION,
};
use crate::state::ClientState;

/// Minimal durable key-value contract.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> PersistenceResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> PersistenceResult<()>;

    fn remove(&self, key: &str) -> PersistenceResult<()>;
}

/// Process-local store for tests and headless runs without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> PersistenceResult<Option<Value>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: Value) -> PersistenceResult<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> PersistenceResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Single JSON object on disk, rewritten atomically on every change.
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Default file name inside a data directory.
    pub const FILE_NAME: &'static str = "client_state.json";

    /// Opens (or lazily creates) the store at `path`.
    ///
    /// A missing file starts empty. An unreadable or corrupt file is logged
    /// and also starts empty; it is replaced on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(map) => map,
                Err(e) => {
                    log::warn!(
                        "[Persistence] Ignoring corrupt state file {}: {}",
                        path.display(),
                        e
                    );
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                log::warn!(
                    "[Persistence] Failed to read state file {}: {}",
                    path.display(),
                    e
                );
                Map::new()
            }
        };
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    /// Opens the store at `<dir>/client_state.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the cache using temp file + rename. Caller holds the cache lock.
    fn flush(&self, cache: &Map<String, Value>) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let temp_path = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(cache)?;
        std::fs::write(&temp_path, contents)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> PersistenceResult<Option<Value>> {
        Ok(self.cache.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> PersistenceResult<()> {
        let mut cache = self.cache.lock();
        if cache.get(key) == Some(&value) {
            return Ok(());
        }
        cache.insert(key.to_string(), value);
        self.flush(&cache)
    }

    fn remove(&self, key: &str) -> PersistenceResult<()> {
        let mut cache = self.cache.lock();
        if cache.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&cache)
    }
}

/// Maps [`ClientState`] fields onto their durable keys.
#[derive(Clone)]
pub struct ClientStatePersistence {
    store: Arc<dyn KeyValueStore>,
}

impl ClientStatePersistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reads every persisted field. Missing or unreadable keys fall back to
    /// their defaults.
    pub fn load(&self) -> ClientState {
        let mut state = ClientState {
            current_audio_zone_id: self.read(KEY_CURRENT_AUDIO_ZONE_ID),
            current_session_id: self.read(KEY_CURRENT_SESSION_ID),
            current_seek: self.read(KEY_CURRENT_SEEK),
            current_track_length: 0.0,
            playlist: self.read(KEY_PLAYLIST).unwrap_or_default(),
            position: self.read(KEY_PLAYLIST_POSITION),
            quality: self.read(KEY_PLAYBACK_QUALITY).unwrap_or_default(),
            current_track: None,
        };
        state.derive_current_track();
        if state.current_track.is_some() {
            if let Some(length) = self.read::<f64>(KEY_CURRENT_TRACK_LENGTH) {
                state.current_track_length = length;
            }
        }
        log::debug!(
            "[Persistence] Loaded client state: session={:?} zone={:?} position={:?} tracks={}",
            state.current_session_id,
            state.current_audio_zone_id,
            state.position,
            state.playlist.len()
        );
        state
    }

    /// Writes the fields that differ between `before` and `after`.
    ///
    /// Returns the failures; each one is also logged.
    pub fn write_changes(
        &self,
        before: &ClientState,
        after: &ClientState,
    ) -> Vec<PersistenceError> {
        let mut failures = Vec::new();
        let mut write = |key: &str, result: PersistenceResult<()>| {
            if let Err(e) = result {
                log::warn!("[Persistence] Failed to write {}: {}", key, e);
                failures.push(e);
            }
        };

        if before.current_seek != after.current_seek {
            write(KEY_CURRENT_SEEK, self.write_opt(KEY_CURRENT_SEEK, after.current_seek));
        }
        if before.current_track_length != after.current_track_length {
            write(
                KEY_CURRENT_TRACK_LENGTH,
                self.write_value(KEY_CURRENT_TRACK_LENGTH, &after.current_track_length),
            );
        }
        if before.playlist != after.playlist {
            write(KEY_PLAYLIST, self.write_value(KEY_PLAYLIST, &after.playlist));
        }
        if before.position != after.position {
            write(
                KEY_PLAYLIST_POSITION,
                self.write_opt(KEY_PLAYLIST_POSITION, after.position),
            );
        }
        if before.current_audio_zone_id != after.current_audio_zone_id {
            write(
                KEY_CURRENT_AUDIO_ZONE_ID,
                self.write_opt(KEY_CURRENT_AUDIO_ZONE_ID, after.current_audio_zone_id),
            );
        }
        if before.current_session_id != after.current_session_id {
            write(
                KEY_CURRENT_SESSION_ID,
                self.write_opt(KEY_CURRENT_SESSION_ID, after.current_session_id),
            );
        }
        if before.quality != after.quality {
            write(
                KEY_PLAYBACK_QUALITY,
                self.write_value(KEY_PLAYBACK_QUALITY, &after.quality),
            );
        }
        failures
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.store.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("[Persistence] Failed to read {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                log::warn!("[Persistence] Ignoring malformed {}: {}", key, e);
                None
            }
        }
    }

    fn write_value<T: Serialize>(&self, key: &str, value: &T) -> PersistenceResult<()> {
        self.store.set(key, serde_json::to_value(value)?)
    }

    fn write_opt<T: Serialize>(&self, key: &str, value: Option<T>) -> PersistenceResult<()> {
        match value {
            Some(v) => self.write_value(key, &v),
            None => self.store.remove(key),
        }
    }
}
