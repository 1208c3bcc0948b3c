//! Engine configuration and the client-side playback mirror.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{PlaybackQuality, SessionId, Track, ZoneId};
use crate::protocol_constants::DEFAULT_HEARTBEAT_INTERVAL_MS;

/// Configuration for the synchronization engine.
///
/// All fields have sensible defaults.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Period of the seek heartbeat while an output is playing (milliseconds).
    pub heartbeat_interval_ms: u64,

    /// When set, `previous_track` restarts the current track instead of
    /// stepping back once the seek is at or past this many seconds.
    pub previous_track_restart_threshold_secs: Option<f64>,

    /// Capacity of the broadcast channel for engine events.
    pub event_channel_capacity: usize,

    /// Capacity of the inbound message queue feeding the controller.
    pub inbound_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            previous_track_restart_threshold_secs: None,
            event_channel_capacity: 100,
            inbound_channel_capacity: 64,
        }
    }
}

impl Config {
    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError(
                "heartbeat_interval_ms must be >= 1 (interval panics on 0)".into(),
            ));
        }
        if let Some(threshold) = self.previous_track_restart_threshold_secs {
            if !threshold.is_finite() || threshold < 0.0 {
                return Err(ConfigError(format!(
                    "previous_track_restart_threshold_secs must be a non-negative number, got {threshold}"
                )));
            }
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError(
                "event_channel_capacity must be >= 1 (broadcast::channel panics on 0)".into(),
            ));
        }
        if self.inbound_channel_capacity == 0 {
            return Err(ConfigError(
                "inbound_channel_capacity must be >= 1 (mpsc::channel panics on 0)".into(),
            ));
        }
        Ok(())
    }
}

/// Client-side playback state mirrored from the current session.
///
/// `current_track` is derived; it is never set directly, only through
/// [`ClientState::derive_current_track`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    pub current_audio_zone_id: Option<ZoneId>,
    pub current_session_id: Option<SessionId>,
    pub current_seek: Option<f64>,
    pub current_track_length: f64,
    pub playlist: Vec<Track>,
    pub position: Option<usize>,
    pub quality: PlaybackQuality,
    pub current_track: Option<Track>,
}

impl ClientState {
    /// Recomputes `current_track` from `playlist[position]`.
    ///
    /// Out-of-range or absent positions clear the track and reset the length
    /// to 0. A freshly bound track takes its catalog duration as the length
    /// until an output reports the real one.
    pub fn derive_current_track(&mut self) {
        let track = self.position.and_then(|p| self.playlist.get(p)).cloned();
        match track {
            Some(track) => {
                let changed = self.current_track.as_ref().map(|t| t.id) != Some(track.id);
                if changed {
                    self.current_track_length = track.rounded_duration().unwrap_or(0.0);
                }
                self.current_track = Some(track);
            }
            None => {
                self.current_track = None;
                self.current_track_length = 0.0;
            }
        }
    }

    /// Seek clamped to `[0, current_track_length]` for display.
    #[must_use]
    pub fn displayed_seek(&self) -> f64 {
        let seek = self.current_seek.unwrap_or(0.0);
        if !seek.is_finite() {
            return 0.0;
        }
        seek.clamp(0.0, self.current_track_length.max(0.0))
    }
}
