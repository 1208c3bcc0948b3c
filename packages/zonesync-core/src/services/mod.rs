//! Engine services.
//!
//! - [`SessionStore`]: canonical mirror of zones, sessions and client state
//! - [`PlayerRegistry`]: locally attached adapters and master election
//! - [`Reconciler`]: request/inbound reconciliation and adapter dispatch
//! - [`PlaybackController`]: user-facing playback operations

pub mod master_election;
pub mod playback_controller;
pub mod player_registry;
pub mod reconciler;
pub mod session_store;
pub mod track_resolver;

pub use playback_controller::{PlaybackController, SeekNotice};
pub use player_registry::PlayerRegistry;
pub use reconciler::{Reconciler, RequestOutcome};
pub use session_store::SessionStore;
pub use track_resolver::{AlbumRef, StaticTrackResolver, TrackResolver};
