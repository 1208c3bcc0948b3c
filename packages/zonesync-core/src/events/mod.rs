//! Event system for store observers and UI consumers.
//!
//! This module provides:
//! - [`Listeners`] for synchronous in-process subscriptions with unsubscribe tokens
//! - [`EventEmitter`] trait for services to publish domain events
//! - [`BroadcastEventBridge`] for async consumers (UI, logging, the agent)

mod bridge;
mod emitter;
mod listeners;

pub use bridge::BroadcastEventBridge;
pub use emitter::{EventEmitter, LoggingEventEmitter, NoopEventEmitter};
pub use listeners::{Listeners, Subscription};

use serde::Serialize;

use crate::error::LoadError;
use crate::model::{PlaybackQuality, PlayerId, Session, SessionId, SessionUpdate, Track, ZoneId};
use crate::player::PlayerState;

/// Events broadcast to async consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum BroadcastEvent {
    /// Changes to the mirrored session/zone state.
    Session(SessionEvent),

    /// Local playback activity.
    Playback(PlaybackEvent),
}

/// Changes to the zone/session store, each carrying a consistent before/after pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The current session was replaced by a snapshot or a new selection.
    SessionChanged {
        current: Option<Box<Session>>,
        previous: Option<Box<Session>>,
    },
    /// A partial update was merged into a mirrored session.
    PartialApplied { update: Box<SessionUpdate> },
    /// The session list was refreshed wholesale.
    SessionsReplaced {
        #[serde(rename = "sessionIds")]
        session_ids: Vec<SessionId>,
    },
    /// The zone list was refreshed wholesale.
    ZonesReplaced {
        #[serde(rename = "zoneIds")]
        zone_ids: Vec<ZoneId>,
    },
    SeekChanged {
        value: Option<f64>,
        old: Option<f64>,
    },
    TrackLengthChanged {
        value: f64,
        old: f64,
    },
    PositionChanged {
        value: Option<usize>,
        old: Option<usize>,
    },
    PlaylistChanged {
        tracks: Vec<Track>,
    },
    AudioZoneChanged {
        value: Option<ZoneId>,
        old: Option<ZoneId>,
    },
    QualityChanged {
        value: PlaybackQuality,
        old: PlaybackQuality,
    },
}

/// Local playback activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlaybackEvent {
    /// A player adapter moved to a new state.
    StateChanged {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        state: PlayerState,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A player adapter failed to load its track and is stalled.
    LoadFailed {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        error: LoadError,
        /// Unix timestamp in milliseconds.
        timestamp: u64,
    },
    /// A seek was requested (manual) or observed.
    Seek { seconds: f64, manual: bool },
    PlayerRegistered {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    PlayerUnregistered {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
}
