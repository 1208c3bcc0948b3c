//! ZoneSync Core - playback session synchronization across audio zones.
//!
//! Several clients observe and control shared playback sessions held by a
//! remote session authority. Each client mirrors zones and sessions locally,
//! reconciles user requests and server pushes into one state, and, when it is
//! the elected master of a zone, drives the local players bound to it.
//!
//! # Architecture
//!
//! - [`model`]: sessions, zones, tracks and the partial update records
//! - [`services`]: session store, player registry, reconciler, playback controller
//! - [`player`]: player adapter contract and the reference output player
//! - [`transport`]: remote transport seam and its JSON envelopes
//! - [`persistence`]: key-value persistence of the client playback mirror
//! - [`events`]: in-process listeners and the broadcast event bridge
//! - [`context`]: API endpoint and track URL building
//! - [`state`]: engine configuration and the client playback mirror
//! - [`error`]: centralized error types
//!
//! # Abstraction Traits
//!
//! - [`TaskSpawner`](runtime::TaskSpawner): spawning background tasks
//! - [`EventEmitter`](events::EventEmitter): emitting domain events
//! - [`RemoteTransport`](transport::RemoteTransport): sending to the session authority
//! - [`KeyValueStore`](persistence::KeyValueStore): durable client state
//! - [`PlayerAdapter`](player::PlayerAdapter) and [`AudioOutput`](player::AudioOutput):
//!   local playback
//! - [`TrackResolver`](services::TrackResolver): album lookup

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod context;
pub mod error;
pub mod events;
pub mod model;
pub mod persistence;
pub mod player;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod state;
pub mod transport;
pub mod utils;

// Re-export commonly used types at the crate root
pub use context::{ApiContext, ClientCredentials, TrackUrlBuilder};
pub use error::{
    ConfigError, ErrorCode, ListenerError, LoadError, PersistenceError, ResolveError,
    TransportError, ZoneSyncError, ZoneSyncResult,
};
pub use events::{
    BroadcastEvent, BroadcastEventBridge, EventEmitter, Listeners, LoggingEventEmitter,
    NoopEventEmitter, PlaybackEvent, SessionEvent, Subscription,
};
pub use model::{
    AudioFormat, AudioZone, Connection, ConnectionPlayer, PlaybackCommand, PlaybackQuality,
    PlaybackUpdate, PlayerKind, Playlist, Session, SessionUpdate, Track, TrackOrigin,
};
pub use persistence::{ClientStatePersistence, JsonFileStore, KeyValueStore, MemoryStore};
pub use player::{
    AudioOutput, OutputPlayer, PlayerAdapter, PlayerContext, PlayerFactory, PlayerState,
    SimulatedOutput, SimulatedPlayerFactory,
};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use services::{
    AlbumRef, PlaybackController, PlayerRegistry, Reconciler, RequestOutcome, SeekNotice,
    SessionStore, StaticTrackResolver, TrackResolver,
};
pub use state::{ClientState, Config};
pub use transport::{ChannelTransport, InboundMessage, OutboundMessage, RemoteTransport};
pub use utils::{format_time, now_millis};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_engine, BootstrappedEngine, EngineDeps};
