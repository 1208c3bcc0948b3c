//! Fixed constants shared with the session authority and the durable store.
//!
//! Changing any of these breaks compatibility with persisted state written by
//! earlier clients or with the server's track endpoint.

// ─────────────────────────────────────────────────────────────────────────────
// Persisted client state keys
// ─────────────────────────────────────────────────────────────────────────────

pub const KEY_CURRENT_SEEK: &str = "player.v1.currentSeek";
pub const KEY_CURRENT_TRACK_LENGTH: &str = "player.v1.currentTrackLength";
pub const KEY_PLAYLIST: &str = "player.v1.playlist";
pub const KEY_PLAYLIST_POSITION: &str = "player.v1.playlistPosition";
pub const KEY_CURRENT_AUDIO_ZONE_ID: &str = "player.v1.currentAudioZoneId";
pub const KEY_CURRENT_SESSION_ID: &str = "player.v1.currentPlaybackSessionId";
pub const KEY_PLAYBACK_QUALITY: &str = "player.v1.playbackQuality";

/// Every key written by the persistence layer.
pub const PERSISTED_KEYS: [&str; 7] = [
    KEY_CURRENT_SEEK,
    KEY_CURRENT_TRACK_LENGTH,
    KEY_PLAYLIST,
    KEY_PLAYLIST_POSITION,
    KEY_CURRENT_AUDIO_ZONE_ID,
    KEY_CURRENT_SESSION_ID,
    KEY_PLAYBACK_QUALITY,
];

// ─────────────────────────────────────────────────────────────────────────────
// Track endpoint
// ─────────────────────────────────────────────────────────────────────────────

/// Path of the track streaming endpoint, relative to the API base URL.
pub const TRACK_PATH: &str = "track";

pub const PARAM_TRACK_ID: &str = "trackId";
pub const PARAM_CLIENT_ID: &str = "clientId";
pub const PARAM_SIGNATURE: &str = "signature";
pub const PARAM_FORMAT: &str = "format";

// ─────────────────────────────────────────────────────────────────────────────
// Playback defaults
// ─────────────────────────────────────────────────────────────────────────────

/// Seek heartbeat period while an output is playing (milliseconds).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 200;
