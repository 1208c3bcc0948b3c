//! User-facing playback operations and the inbound/request loops.
//!
//! Every operation is expressed as a [`PlaybackUpdate`] handed to the
//! [`Reconciler`]; the controller never touches adapters directly.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{ListenerResult, ResolveResult};
use crate::events::{EventEmitter, Listeners, PlaybackEvent, Subscription};
use crate::model::{
    Connection, PlaybackQuality, PlaybackUpdate, PlayerId, SessionId, Track, ZoneId,
};
use crate::player::{PlayerFactory, PlayerRequest};
use crate::services::reconciler::{Reconciler, RequestOutcome};
use crate::services::track_resolver::{AlbumRef, TrackResolver};
use crate::services::{PlayerRegistry, SessionStore};
use crate::transport::InboundMessage;

/// A seek observed by the controller, passed to seek subscribers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekNotice {
    pub seconds: f64,
    pub manual: bool,
}

pub struct PlaybackController {
    store: Arc<SessionStore>,
    registry: Arc<PlayerRegistry>,
    reconciler: Arc<Reconciler>,
    resolver: Arc<dyn TrackResolver>,
    factory: Arc<dyn PlayerFactory>,
    emitter: Arc<dyn EventEmitter>,
    seek_listeners: Listeners<SeekNotice>,
    connection_id: RwLock<Option<String>>,
    restart_threshold: Option<f64>,
}

impl PlaybackController {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<PlayerRegistry>,
        reconciler: Arc<Reconciler>,
        resolver: Arc<dyn TrackResolver>,
        factory: Arc<dyn PlayerFactory>,
        emitter: Arc<dyn EventEmitter>,
        restart_threshold: Option<f64>,
    ) -> Self {
        Self {
            store,
            registry,
            reconciler,
            resolver,
            factory,
            emitter,
            seek_listeners: Listeners::new("Seek"),
            connection_id: RwLock::new(None),
            restart_threshold,
        }
    }

    /// Sets the connection id whose advertised players this client drives.
    pub fn set_connection_id(&self, connection_id: impl Into<String>) {
        *self.connection_id.write() = Some(connection_id.into());
    }

    pub fn connection_id(&self) -> Option<String> {
        self.connection_id.read().clone()
    }

    pub fn on_seek<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SeekNotice) -> ListenerResult + Send + Sync + 'static,
    {
        self.seek_listeners.subscribe(handler)
    }

    pub fn off_seek(&self, subscription: Subscription) -> bool {
        self.seek_listeners.unsubscribe(subscription)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn play(&self) -> RequestOutcome {
        log::debug!("[PlaybackController] Play");
        self.request(PlaybackUpdate {
            playing: Some(true),
            ..Default::default()
        })
        .await
    }

    pub async fn pause(&self) -> RequestOutcome {
        log::debug!("[PlaybackController] Pause");
        self.request(PlaybackUpdate {
            playing: Some(false),
            ..Default::default()
        })
        .await
    }

    pub async fn stop(&self) -> RequestOutcome {
        log::debug!("[PlaybackController] Stop");
        self.request(PlaybackUpdate {
            stop: Some(true),
            ..Default::default()
        })
        .await
    }

    /// Notifies seek subscribers; a manual seek is also requested, keeping
    /// the session's current play state.
    pub async fn seek(&self, seconds: f64, manual: bool) -> RequestOutcome {
        let outcome = if manual {
            let playing = self
                .store
                .current_session()
                .map(|s| s.playing)
                .unwrap_or(false);
            log::debug!("[PlaybackController] Seeking to {}", seconds);
            self.request(PlaybackUpdate {
                play: Some(playing),
                seek: Some(seconds),
                ..Default::default()
            })
            .await
        } else {
            RequestOutcome::Ignored
        };

        self.seek_listeners.trigger(&SeekNotice { seconds, manual });
        self.emitter
            .emit_playback(PlaybackEvent::Seek { seconds, manual });
        outcome
    }

    /// Advances to the next playlist entry, or stops at the end.
    pub async fn next_track(&self) -> RequestOutcome {
        let client = self.store.client_state();
        match client.position {
            Some(position) if position + 1 < client.playlist.len() => {
                log::debug!("[PlaybackController] Playing next track");
                self.request(PlaybackUpdate {
                    play: Some(true),
                    seek: Some(0.0),
                    position: Some(position + 1),
                    ..Default::default()
                })
                .await
            }
            _ => {
                log::debug!("[PlaybackController] No next track to play");
                self.stop().await
            }
        }
    }

    /// Steps back one entry. At the first entry, or past the restart
    /// threshold when one is configured, the current track restarts instead.
    pub async fn previous_track(&self) -> RequestOutcome {
        let client = self.store.client_state();
        let position = client.position.unwrap_or(0);
        let past_threshold = self
            .restart_threshold
            .is_some_and(|threshold| client.current_seek.unwrap_or(0.0) >= threshold);

        if position == 0 || past_threshold {
            log::debug!("[PlaybackController] Restarting current track");
            return self.seek(0.0, true).await;
        }

        log::debug!("[PlaybackController] Playing previous track");
        self.request(PlaybackUpdate {
            play: Some(true),
            seek: Some(0.0),
            position: Some(position - 1),
            ..Default::default()
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Playlist
    // ─────────────────────────────────────────────────────────────────────────

    /// Replaces the playlist and plays it from the start.
    pub async fn play_playlist(&self, tracks: Vec<Track>) -> RequestOutcome {
        log::debug!("[PlaybackController] Playing playlist of {} tracks", tracks.len());
        let quality = self.store.quality();
        self.request(PlaybackUpdate {
            play: Some(true),
            position: Some(0),
            seek: Some(0.0),
            tracks: Some(tracks),
            quality: Some(quality),
            ..Default::default()
        })
        .await
    }

    /// Resolves `album` and plays it from the start.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error; nothing is requested in that case.
    pub async fn play_album(&self, album: &AlbumRef) -> ResolveResult<RequestOutcome> {
        let tracks = self.resolve(album).await?;
        Ok(self.play_playlist(tracks).await)
    }

    /// Resolves `album` and appends it to the playlist.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error; nothing is requested in that case.
    pub async fn add_album_to_queue(&self, album: &AlbumRef) -> ResolveResult<RequestOutcome> {
        let tracks = self.resolve(album).await?;
        Ok(self.add_tracks_to_queue(tracks).await)
    }

    pub async fn add_tracks_to_queue(&self, tracks: Vec<Track>) -> RequestOutcome {
        let mut playlist = self.store.client_state().playlist;
        playlist.extend(tracks);
        self.request(PlaybackUpdate {
            tracks: Some(playlist),
            ..Default::default()
        })
        .await
    }

    /// Drops the entry at `index`, keeping the current track selected.
    ///
    /// Removing the current track restarts playback at the same position,
    /// which now holds the following track.
    pub async fn remove_track_from_playlist(&self, index: usize) -> RequestOutcome {
        let client = self.store.client_state();
        if index >= client.playlist.len() {
            log::debug!("[PlaybackController] No playlist entry at {}", index);
            return RequestOutcome::Ignored;
        }

        let mut tracks = client.playlist;
        tracks.remove(index);
        let mut update = PlaybackUpdate {
            tracks: Some(tracks),
            ..Default::default()
        };
        match client.position {
            Some(position) if index < position => update.position = Some(position - 1),
            Some(position) if index == position => {
                update.seek = Some(0.0);
                update.play = Some(true);
            }
            _ => {}
        }
        self.request(update).await
    }

    pub async fn play_from_playlist_position(&self, index: usize) -> RequestOutcome {
        self.request(PlaybackUpdate {
            play: Some(true),
            position: Some(index),
            seek: Some(0.0),
            ..Default::default()
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Settings
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn set_volume(&self, volume: f64) -> RequestOutcome {
        self.request(PlaybackUpdate {
            volume: Some(volume.clamp(0.0, 1.0)),
            ..Default::default()
        })
        .await
    }

    /// Persists the quality and requests it for the current session.
    pub async fn set_playback_quality(&self, quality: PlaybackQuality) -> RequestOutcome {
        self.store.set_quality(quality);
        self.request(PlaybackUpdate {
            quality: Some(quality),
            ..Default::default()
        })
        .await
    }

    /// Persists the zone selection and binds the current session to it.
    pub async fn set_current_audio_zone(&self, zone_id: ZoneId) -> RequestOutcome {
        self.store.select_zone(Some(zone_id));
        let quality = self.store.quality();
        self.request(PlaybackUpdate {
            audio_zone_id: Some(zone_id),
            quality: Some(quality),
            ..Default::default()
        })
        .await
    }

    pub fn set_current_session(&self, session_id: SessionId) {
        self.store.select_session(session_id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound
    // ─────────────────────────────────────────────────────────────────────────

    /// Applies one message from the session authority.
    pub async fn handle_inbound(&self, message: InboundMessage) {
        log::debug!("[PlaybackController] Inbound {}", message.kind());
        match message {
            InboundMessage::Sessions { payload } => self.store.replace_sessions(payload),
            InboundMessage::SessionSnapshot { payload } => {
                self.store.apply_snapshot(payload, false);
            }
            InboundMessage::SessionUpdated { payload } => {
                self.reconciler.session_updated(payload).await;
            }
            InboundMessage::AudioZones { payload } => self.store.replace_zones(payload),
            InboundMessage::Connections { payload } => self.sync_players(&payload),
        }
    }

    /// Registers the players advertised for this client's connection and
    /// drops local players the connection no longer lists.
    fn sync_players(&self, connections: &[Connection]) {
        let Some(connection_id) = self.connection_id() else {
            log::debug!("[PlaybackController] No connection id; ignoring connections");
            return;
        };
        let Some(connection) = connections
            .iter()
            .find(|c| c.connection_id == connection_id)
        else {
            return;
        };

        for player in &connection.players {
            if self.registry.contains(player.player_id) {
                continue;
            }
            match self.factory.create(player) {
                Some(adapter) => {
                    self.registry.register(adapter);
                }
                None => log::warn!(
                    "[PlaybackController] Cannot drive player {} of kind {:?}",
                    player.player_id,
                    player.kind
                ),
            }
        }

        for id in self.registry.ids() {
            if !connection.players.iter().any(|p| p.player_id == id) {
                self.registry.unregister(id);
            }
        }
    }

    /// Consumes inbound messages in arrival order until cancelled or closed.
    pub async fn run_inbound(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<InboundMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => self.handle_inbound(message).await,
                    None => break,
                },
            }
        }
        log::info!("[PlaybackController] Inbound loop stopped");
    }

    /// Serves requests originated by adapters until cancelled or closed.
    pub async fn run_player_requests(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<PlayerRequest>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                request = rx.recv() => match request {
                    Some(PlayerRequest::NextTrack { player_id }) => {
                        if self.drives_zone(player_id) {
                            log::debug!("[PlaybackController] Player {} finished its track", player_id);
                            self.next_track().await;
                        } else {
                            log::debug!(
                                "[PlaybackController] Ignoring end of track from follower {}",
                                player_id
                            );
                        }
                    }
                    None => break,
                },
            }
        }
        log::info!("[PlaybackController] Player request loop stopped");
    }

    /// Whether `player_id` is the local player leading one of its zones.
    /// Followers play the same track and end with it; only the leader advances.
    fn drives_zone(&self, player_id: PlayerId) -> bool {
        self.store
            .zones()
            .iter()
            .any(|zone| zone.binds(player_id) && self.registry.master_candidate(zone) == Some(player_id))
    }

    async fn resolve(&self, album: &AlbumRef) -> ResolveResult<Vec<Track>> {
        self.resolver.album_tracks(album).await.map_err(|e| {
            log::warn!("[PlaybackController] Could not resolve {}: {}", album, e);
            e
        })
    }

    async fn request(&self, update: PlaybackUpdate) -> RequestOutcome {
        self.reconciler.request_update(update).await
    }
}
