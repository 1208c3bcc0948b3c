//! Trait seams between the engine and audio hardware.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::LoadResult;
use crate::model::{ConnectionPlayer, PlaybackCommand, PlaybackQuality, PlayerId, Track};
use crate::player::PlayerState;

/// Uniform capability contract for a local player.
///
/// Adapters execute commands; the only request they originate themselves is
/// "next track" after the bound track ends.
#[async_trait]
pub trait PlayerAdapter: Send + Sync {
    fn id(&self) -> PlayerId;

    /// Applies one reconciled command in the adapter's fixed field priority.
    ///
    /// # Errors
    ///
    /// Returns the load failure when a fresh load could not be prepared. The
    /// adapter then stays in `Loading` until the next explicit command.
    async fn update_playback(&self, command: &PlaybackCommand) -> LoadResult<()>;

    fn state(&self) -> PlayerState;

    /// Called once when the adapter is registered.
    fn activate(&self) {}

    /// Called once when the adapter is unregistered.
    fn deactivate(&self) {}
}

/// A track ready to be handed to an output.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSource {
    pub track: Track,
    pub url: String,
    pub quality: PlaybackQuality,
}

/// Result of a successful load.
#[derive(Debug)]
pub struct LoadedTrack {
    /// Duration reported by the decoder, if known.
    pub duration: Option<f64>,
    /// Fires once when playback reaches the end of the track. Dropped without
    /// firing when the output is stopped or reloaded.
    pub ended: oneshot::Receiver<()>,
}

/// Device seam under [`OutputPlayer`](super::OutputPlayer).
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Prepares `source` for playback, replacing whatever was loaded.
    async fn load(&self, source: &TrackSource) -> LoadResult<LoadedTrack>;

    fn play(&self);

    fn pause(&self);

    /// Stops playback and unloads the track.
    fn stop(&self);

    fn seek(&self, seconds: f64);

    fn set_volume(&self, volume: f64);

    /// Current playback position in seconds, `None` when nothing is loaded.
    fn position(&self) -> Option<f64>;
}

/// Creates adapters for the players a connection advertises.
pub trait PlayerFactory: Send + Sync {
    /// Returns `None` for player kinds this client cannot drive.
    fn create(&self, player: &ConnectionPlayer) -> Option<std::sync::Arc<dyn PlayerAdapter>>;
}
