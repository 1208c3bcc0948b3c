//! Turns partial change requests into a remote session update and a local
//! playback command.
//!
//! Fields are evaluated in a fixed priority order regardless of how the
//! request was built:
//!
//! ```text
//! play > stop > playing > position > seek > volume > tracks > quality
//! ```
//!
//! Any client sends the session update. Only the master of the target zone
//! dispatches the playback command to its local adapters.

use std::sync::Arc;

use futures::future::join_all;

use crate::error::TransportError;
use crate::model::{
    PlaybackCommand, PlaybackQuality, PlaybackUpdate, Playlist, SessionId, SessionUpdate,
    UpdateField, ZoneId, SESSION_UPDATE_ORDER,
};
use crate::services::{PlayerRegistry, SessionStore};
use crate::transport::RemoteTransport;

/// What a reconciliation request ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// Empty request, or nothing to address.
    Ignored,
    /// The remote send failed; nothing was merged or dispatched.
    SendFailed(TransportError),
    /// The update was sent and merged; `dispatched` adapters received the
    /// command (zero unless this client is the zone's master).
    Applied { dispatched: usize },
}

pub struct Reconciler {
    store: Arc<SessionStore>,
    registry: Arc<PlayerRegistry>,
    transport: Arc<dyn RemoteTransport>,
}

impl Reconciler {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<PlayerRegistry>,
        transport: Arc<dyn RemoteTransport>,
    ) -> Self {
        Self {
            store,
            registry,
            transport,
        }
    }

    /// Reconciles one user or adapter request.
    pub async fn request_update(&self, update: PlaybackUpdate) -> RequestOutcome {
        if update.is_empty() {
            log::debug!("[Reconciler] Ignoring empty request");
            return RequestOutcome::Ignored;
        }
        let Some(session_id) = update.session_id.or_else(|| self.store.current_session_id())
        else {
            log::debug!("[Reconciler] No session selected; ignoring request");
            return RequestOutcome::Ignored;
        };
        let zone_id = update
            .audio_zone_id
            .or_else(|| self.store.current_audio_zone_id());

        let session_update = self.session_update(&update, session_id, zone_id);
        if let Err(e) = self.transport.send_session_update(&session_update) {
            log::warn!(
                "[Reconciler] Failed to send update for session {}: {}",
                session_id,
                e
            );
            return RequestOutcome::SendFailed(e);
        }
        self.store.apply_partial(&session_update);

        let command = playback_command(&update, session_id, zone_id);
        let dispatched = self.dispatch(zone_id, &command).await;
        RequestOutcome::Applied { dispatched }
    }

    /// Applies an inbound partial, then replays it on local hardware if this
    /// client is the master of the session's zone. Nothing is sent back.
    pub async fn session_updated(&self, update: SessionUpdate) -> usize {
        self.store.apply_partial(&update);

        let zone_id = update.audio_zone_id.or_else(|| {
            self.store
                .session(update.session_id)
                .and_then(|s| s.audio_zone_id)
        });

        let command = PlaybackCommand {
            play: update.play,
            stop: update.stop,
            playing: update.playing,
            tracks: update.playlist.map(|p| p.tracks),
            position: update.position,
            seek: update.seek,
            volume: update.volume,
            // Senders always fill quality; replaying it would defeat warm resume.
            ..PlaybackCommand::new(update.session_id, zone_id)
        };
        if command.is_empty() {
            return 0;
        }
        self.dispatch(zone_id, &command).await
    }

    /// Builds the outbound update in priority order.
    fn session_update(
        &self,
        update: &PlaybackUpdate,
        session_id: SessionId,
        zone_id: Option<ZoneId>,
    ) -> SessionUpdate {
        let mut out = SessionUpdate {
            audio_zone_id: zone_id,
            ..SessionUpdate::new(session_id)
        };
        for field in SESSION_UPDATE_ORDER {
            match field {
                UpdateField::Play => {
                    if let Some(play) = update.play {
                        out.play = Some(play);
                        if play {
                            out.playing = Some(true);
                        }
                    }
                }
                UpdateField::Stop => {
                    if let Some(stop) = update.stop {
                        out.stop = Some(stop);
                        if stop {
                            out.playing = Some(false);
                        }
                    }
                }
                UpdateField::Playing => {
                    if update.playing.is_some() {
                        out.playing = update.playing;
                    }
                }
                UpdateField::Position => out.position = update.position,
                UpdateField::Seek => out.seek = update.seek,
                UpdateField::Volume => out.volume = update.volume,
                UpdateField::Tracks => {
                    if let Some(ref tracks) = update.tracks {
                        let playlist_id = self
                            .store
                            .session(session_id)
                            .and_then(|s| s.playlist.session_playlist_id);
                        out.playlist = Some(Playlist {
                            session_playlist_id: playlist_id,
                            tracks: tracks.clone(),
                        });
                    }
                }
                UpdateField::Quality => {
                    out.quality = Some(update.quality.unwrap_or_else(|| self.default_quality()));
                }
            }
        }
        out
    }

    fn default_quality(&self) -> PlaybackQuality {
        self.store.quality()
    }

    /// Sends `command` to the zone's local adapters if this client is master.
    async fn dispatch(&self, zone_id: Option<ZoneId>, command: &PlaybackCommand) -> usize {
        let Some(zone) = zone_id.and_then(|id| self.store.zone(id)) else {
            log::debug!("[Reconciler] Unknown zone {:?}; nothing to dispatch", zone_id);
            return 0;
        };
        if !self.registry.is_master(&zone) {
            log::debug!("[Reconciler] Not master of zone {}; skipping dispatch", zone.id);
            return 0;
        }

        let adapters = self.registry.zone_players(&zone);
        let results = join_all(adapters.iter().map(|a| a.update_playback(command))).await;
        for (adapter, result) in adapters.iter().zip(results) {
            if let Err(e) = result {
                log::warn!(
                    "[Reconciler] Player {} failed to apply update: {}",
                    adapter.id(),
                    e
                );
            }
        }
        adapters.len()
    }
}

/// Adapter-facing projection of a request, in priority order.
///
/// `play: true` implies `playing: true` unless the request says otherwise, so
/// a manual seek while playing becomes a warm resume.
fn playback_command(
    update: &PlaybackUpdate,
    session_id: SessionId,
    zone_id: Option<ZoneId>,
) -> PlaybackCommand {
    let mut command = PlaybackCommand::new(session_id, zone_id);
    for field in SESSION_UPDATE_ORDER {
        match field {
            UpdateField::Play => {
                command.play = update.play;
                if update.play == Some(true) {
                    command.playing = Some(true);
                }
            }
            UpdateField::Stop => command.stop = update.stop,
            UpdateField::Playing => {
                if update.playing.is_some() {
                    command.playing = update.playing;
                }
            }
            UpdateField::Position => command.position = update.position,
            UpdateField::Seek => command.seek = update.seek,
            UpdateField::Volume => command.volume = update.volume,
            UpdateField::Tracks => command.tracks = update.tracks.clone(),
            UpdateField::Quality => command.quality = update.quality,
        }
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use crate::model::fixtures::{session, tracks, zone};
    use crate::model::AudioFormat;
    use crate::services::player_registry::testing::MockAdapter;
    use crate::services::session_store::testing::memory_store;
    use crate::transport::testing::MockTransport;

    struct Harness {
        reconciler: Reconciler,
        store: Arc<SessionStore>,
        registry: Arc<PlayerRegistry>,
        transport: Arc<MockTransport>,
    }

    /// Session 1 with three tracks in zone 1, which binds players 10 and 11.
    fn harness() -> Harness {
        let store = memory_store();
        store.replace_zones(vec![zone(1, &[10, 11]), zone(2, &[20])]);
        store.apply_snapshot(session(1, tracks(3), 0), true);
        let registry = Arc::new(PlayerRegistry::new(Arc::new(NoopEventEmitter)));
        let transport = Arc::new(MockTransport::default());
        Harness {
            reconciler: Reconciler::new(store.clone(), registry.clone(), transport.clone()),
            store,
            registry,
            transport,
        }
    }

    fn register(registry: &PlayerRegistry, id: u64) -> Arc<MockAdapter> {
        let adapter = Arc::new(MockAdapter::new(id));
        registry.register(adapter.clone());
        adapter
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session update projection
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_request_is_silent_noop() {
        let h = harness();
        let outcome = h
            .reconciler
            .request_update(PlaybackUpdate {
                session_id: Some(1),
                ..Default::default()
            })
            .await;

        assert_eq!(outcome, RequestOutcome::Ignored);
        assert!(h.transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn no_selected_session_is_noop() {
        let store = memory_store();
        let registry = Arc::new(PlayerRegistry::new(Arc::new(NoopEventEmitter)));
        let transport = Arc::new(MockTransport::default());
        let reconciler = Reconciler::new(store, registry, transport.clone());

        let outcome = reconciler
            .request_update(PlaybackUpdate {
                playing: Some(true),
                ..Default::default()
            })
            .await;

        assert_eq!(outcome, RequestOutcome::Ignored);
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn play_implies_playing_and_defaults_quality() {
        let h = harness();
        h.store.set_quality(PlaybackQuality::new(AudioFormat::Flac));

        h.reconciler
            .request_update(PlaybackUpdate {
                play: Some(true),
                ..Default::default()
            })
            .await;

        let sent = h.transport.last_sent().unwrap();
        assert_eq!(sent.session_id, 1);
        assert_eq!(sent.audio_zone_id, Some(1));
        assert_eq!(sent.play, Some(true));
        assert_eq!(sent.playing, Some(true));
        assert_eq!(sent.quality, Some(PlaybackQuality::new(AudioFormat::Flac)));
    }

    #[tokio::test]
    async fn explicit_playing_overrides_implications() {
        let h = harness();

        h.reconciler
            .request_update(PlaybackUpdate {
                stop: Some(true),
                playing: Some(true),
                ..Default::default()
            })
            .await;

        let sent = h.transport.last_sent().unwrap();
        assert_eq!(sent.stop, Some(true));
        assert_eq!(sent.playing, Some(true));
    }

    #[tokio::test]
    async fn stop_implies_not_playing() {
        let h = harness();

        h.reconciler
            .request_update(PlaybackUpdate {
                play: Some(true),
                stop: Some(true),
                ..Default::default()
            })
            .await;

        assert_eq!(h.transport.last_sent().unwrap().playing, Some(false));
    }

    #[tokio::test]
    async fn tracks_carry_existing_playlist_identity() {
        let h = harness();

        h.reconciler
            .request_update(PlaybackUpdate {
                tracks: Some(tracks(5)),
                ..Default::default()
            })
            .await;

        let playlist = h.transport.last_sent().unwrap().playlist.unwrap();
        assert_eq!(playlist.session_playlist_id, Some(101));
        assert_eq!(playlist.tracks.len(), 5);
        assert_eq!(h.store.client_state().playlist.len(), 5);
    }

    #[tokio::test]
    async fn successful_send_merges_optimistically() {
        let h = harness();

        h.reconciler
            .request_update(PlaybackUpdate {
                position: Some(2),
                seek: Some(0.0),
                ..Default::default()
            })
            .await;

        assert_eq!(h.store.current_track().map(|t| t.id), Some(3));
        assert_eq!(h.store.session(1).unwrap().position, Some(2));
    }

    #[tokio::test]
    async fn failed_send_changes_nothing() {
        let h = harness();
        let adapter = register(&h.registry, 10);
        h.transport.set_failing(true);
        let before = h.store.session(1);

        let outcome = h
            .reconciler
            .request_update(PlaybackUpdate {
                position: Some(2),
                play: Some(true),
                ..Default::default()
            })
            .await;

        assert!(matches!(outcome, RequestOutcome::SendFailed(_)));
        assert_eq!(h.store.session(1), before);
        assert!(adapter.commands.lock().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_still_sends() {
        let h = harness();
        register(&h.registry, 10);

        let outcome = h
            .reconciler
            .request_update(PlaybackUpdate {
                session_id: Some(77),
                audio_zone_id: Some(99),
                volume: Some(0.5),
                ..Default::default()
            })
            .await;

        assert_eq!(outcome, RequestOutcome::Applied { dispatched: 0 });
        assert_eq!(h.transport.last_sent().unwrap().session_id, 77);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn master_dispatches_to_local_zone_players_in_binding_order() {
        let h = harness();
        let second = register(&h.registry, 11);
        let first = register(&h.registry, 10);
        register(&h.registry, 20);

        let outcome = h
            .reconciler
            .request_update(PlaybackUpdate {
                volume: Some(0.4),
                ..Default::default()
            })
            .await;

        assert_eq!(outcome, RequestOutcome::Applied { dispatched: 2 });
        assert_eq!(first.last_command().unwrap().volume, Some(0.4));
        assert_eq!(second.last_command().unwrap().volume, Some(0.4));
    }

    #[tokio::test]
    async fn non_master_sends_but_does_not_dispatch() {
        let h = harness();
        let adapter = register(&h.registry, 11);

        let outcome = h
            .reconciler
            .request_update(PlaybackUpdate {
                playing: Some(true),
                ..Default::default()
            })
            .await;

        assert_eq!(outcome, RequestOutcome::Applied { dispatched: 0 });
        assert_eq!(h.transport.sent.lock().len(), 1);
        assert!(adapter.commands.lock().is_empty());
    }

    #[tokio::test]
    async fn manual_seek_while_playing_is_warm_resume() {
        let h = harness();
        let adapter = register(&h.registry, 10);

        h.reconciler
            .request_update(PlaybackUpdate {
                play: Some(true),
                seek: Some(42.0),
                ..Default::default()
            })
            .await;

        let command = adapter.last_command().unwrap();
        assert!(command.is_warm_resume());
        assert!(command.quality.is_none());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inbound partials
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn inbound_partial_replays_on_master_without_sending() {
        let h = harness();
        let adapter = register(&h.registry, 10);

        let dispatched = h
            .reconciler
            .session_updated(SessionUpdate {
                playing: Some(true),
                playlist: Some(Playlist::new(tracks(2))),
                ..SessionUpdate::new(1)
            })
            .await;

        assert_eq!(dispatched, 1);
        assert!(h.transport.sent.lock().is_empty());
        let command = adapter.last_command().unwrap();
        assert_eq!(command.playing, Some(true));
        assert_eq!(command.tracks.map(|t| t.len()), Some(2));
        assert_eq!(command.audio_zone_id, Some(1));
        assert!(h.store.session(1).unwrap().playing);
    }

    #[tokio::test]
    async fn remote_manual_seek_reaches_master_as_warm_resume() {
        let controller = harness();
        controller
            .reconciler
            .request_update(PlaybackUpdate {
                play: Some(true),
                seek: Some(42.0),
                ..Default::default()
            })
            .await;
        let sent = controller.transport.last_sent().unwrap();
        assert!(sent.quality.is_some());

        let master = harness();
        let adapter = register(&master.registry, 10);
        master.reconciler.session_updated(sent.clone()).await;

        let command = adapter.last_command().unwrap();
        assert!(command.is_warm_resume());
        assert_eq!(command.seek, Some(42.0));
        assert!(command.quality.is_none());
        assert_eq!(master.store.session(1).unwrap().quality, sent.quality);
    }

    #[tokio::test]
    async fn inbound_partial_on_non_master_only_merges() {
        let h = harness();
        let adapter = register(&h.registry, 11);

        let dispatched = h
            .reconciler
            .session_updated(SessionUpdate {
                seek: Some(9.0),
                ..SessionUpdate::new(1)
            })
            .await;

        assert_eq!(dispatched, 0);
        assert!(adapter.commands.lock().is_empty());
        assert_eq!(h.store.current_seek(), Some(9.0));
    }
}
