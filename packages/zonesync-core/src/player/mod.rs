//! Local audio-output abstractions.
//!
//! - [`PlayerAdapter`]: the uniform capability contract the reconciler drives
//! - [`AudioOutput`]: the device seam underneath the reference adapter
//! - [`OutputPlayer`]: the reference adapter state machine
//! - [`SimulatedOutput`]: a clock-driven output without audio hardware
//! - [`SimulatedPlayerFactory`]: adapters for advertised simulated players

mod output_player;
mod simulated;
mod traits;

pub use output_player::{OutputPlayer, PlayerContext};
pub use simulated::{SimulatedOutput, SimulatedPlayerFactory};
pub use traits::{AudioOutput, LoadedTrack, PlayerAdapter, PlayerFactory, TrackSource};

use serde::Serialize;

use crate::model::PlayerId;

/// Lifecycle of a player adapter.
///
/// `Idle -> Loading -> Ready -> Playing <-> Paused -> Ended -> Idle`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
}

impl PlayerState {
    /// Returns true once a track has finished loading and until it ends.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Ready | Self::Playing | Self::Paused)
    }
}

/// Requests an adapter originates on its own, processed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerRequest {
    /// The bound track ended; advance the session.
    NextTrack { player_id: PlayerId },
}
