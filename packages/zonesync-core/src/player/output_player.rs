//! Reference [`PlayerAdapter`] driving an [`AudioOutput`].
//!
//! Commands are executed in [`ADAPTER_ORDER`](crate::model::ADAPTER_ORDER):
//! stop, volume, seek, play (full load), metadata-only fields, then the soft
//! play/pause toggle. Loads are validated against a generation counter when
//! they complete, so a superseded load never acts on its result.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::context::ApiContext;
use crate::error::LoadResult;
use crate::events::{EventEmitter, PlaybackEvent};
use crate::model::{PlaybackCommand, PlayerId, Track};
use crate::player::traits::{AudioOutput, PlayerAdapter, TrackSource};
use crate::player::{PlayerRequest, PlayerState};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::SessionStore;
use crate::utils::{now_millis, round_seconds};

/// Shared collaborators for every adapter a client creates.
#[derive(Clone)]
pub struct PlayerContext {
    pub store: Arc<SessionStore>,
    pub api: ApiContext,
    pub requests: mpsc::UnboundedSender<PlayerRequest>,
    pub emitter: Arc<dyn EventEmitter>,
    pub spawner: TokioSpawner,
    pub heartbeat_interval: Duration,
    /// Parent of every background task the adapter starts.
    pub shutdown: CancellationToken,
}

#[derive(Default)]
struct Inner {
    state: PlayerState,
    /// Bumped on every load and stop; stale completions compare against it.
    generation: u64,
    /// Seek received before the output was ready; applied once at `Ready`.
    pending_seek: Option<f64>,
    /// Whether playback should run once the output is ready.
    playing: bool,
    track: Option<Track>,
    heartbeat: Option<CancellationToken>,
}

/// Adapter executing reconciled commands on one output.
pub struct OutputPlayer {
    id: PlayerId,
    output: Arc<dyn AudioOutput>,
    ctx: PlayerContext,
    inner: Arc<Mutex<Inner>>,
}

impl OutputPlayer {
    pub fn new(id: PlayerId, output: Arc<dyn AudioOutput>, ctx: PlayerContext) -> Self {
        Self {
            id,
            output,
            ctx,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Track bound by the last load, if any.
    pub fn track(&self) -> Option<Track> {
        self.inner.lock().track.clone()
    }

    fn transition(&self, inner: &mut Inner, state: PlayerState) {
        if inner.state == state {
            return;
        }
        log::debug!("[Player {}] {:?} -> {:?}", self.id, inner.state, state);
        inner.state = state;
        self.ctx.emitter.emit_playback(PlaybackEvent::StateChanged {
            player_id: self.id,
            state,
            timestamp: now_millis(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Command steps
    // ─────────────────────────────────────────────────────────────────────────

    fn stop(&self) {
        {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.playing = false;
            inner.pending_seek = None;
            stop_heartbeat(&mut inner);
            self.transition(&mut inner, PlayerState::Idle);
        }
        self.output.stop();
    }

    fn seek(&self, seconds: f64) {
        let mut inner = self.inner.lock();
        if inner.state.is_loaded() {
            drop(inner);
            self.output.seek(seconds);
        } else {
            inner.pending_seek = Some(seconds);
        }
    }

    /// Soft toggle; only acts on a loaded output.
    fn set_playing(&self, playing: bool) {
        let mut inner = self.inner.lock();
        inner.playing = playing;
        match (playing, inner.state) {
            (true, PlayerState::Ready | PlayerState::Paused) => {
                self.output.play();
                self.transition(&mut inner, PlayerState::Playing);
                self.start_heartbeat(&mut inner);
            }
            (false, PlayerState::Playing) => {
                self.output.pause();
                stop_heartbeat(&mut inner);
                self.transition(&mut inner, PlayerState::Paused);
                drop(inner);
                self.publish_position();
            }
            _ => {}
        }
    }

    fn publish_position(&self) {
        if let Some(seconds) = self.output.position().and_then(round_seconds) {
            self.ctx.store.set_current_seek(Some(seconds));
        }
    }

    /// Track at the command's (or the session mirror's) position.
    fn resolve_track(&self, command: &PlaybackCommand) -> Option<Track> {
        let session = self.ctx.store.session(command.session_id);
        let position = command
            .position
            .or_else(|| session.as_ref().and_then(|s| s.position))?;
        match command.tracks {
            Some(ref tracks) => tracks.get(position).cloned(),
            None => session.and_then(|s| s.playlist.tracks.get(position).cloned()),
        }
    }

    /// Full load of the track at the current position.
    async fn load(&self, command: &PlaybackCommand) -> LoadResult<()> {
        let Some(track) = self.resolve_track(command) else {
            log::debug!("[Player {}] No track selected; staying idle", self.id);
            return Ok(());
        };
        let quality = command.quality.unwrap_or_else(|| self.ctx.store.quality());

        let (generation, initial_seek) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            stop_heartbeat(&mut inner);
            let initial_seek = command
                .seek
                .or(inner.pending_seek.take())
                .or_else(|| self.ctx.store.current_seek());
            inner.track = Some(track.clone());
            self.transition(&mut inner, PlayerState::Loading);
            (inner.generation, initial_seek)
        };

        let source = TrackSource {
            url: self.ctx.api.track_url(track.id, &quality),
            track,
            quality,
        };
        log::info!("[Player {}] Loading {}", self.id, source.url);

        let loaded = match self.output.load(&source).await {
            Ok(loaded) => loaded,
            Err(e) => {
                log::warn!("[Player {}] Load failed: {}", self.id, e);
                self.ctx.emitter.emit_playback(PlaybackEvent::LoadFailed {
                    player_id: self.id,
                    error: e.clone(),
                    timestamp: now_millis(),
                });
                return Err(e);
            }
        };

        let seek = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                log::debug!(
                    "[Player {}] Discarding superseded load of {}",
                    self.id,
                    source.track.id
                );
                if inner.state == PlayerState::Idle {
                    drop(inner);
                    self.output.stop();
                }
                return Ok(());
            }
            self.transition(&mut inner, PlayerState::Ready);
            inner.pending_seek.take().or(initial_seek)
        };

        if let Some(seconds) = seek {
            self.output.seek(seconds);
        }
        if let Some(length) = loaded.duration.and_then(round_seconds) {
            self.ctx.store.set_current_track_length(length);
        }
        self.watch_ended(generation, loaded.ended);

        let playing = self.inner.lock().playing;
        if playing {
            self.set_playing(true);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background tasks
    // ─────────────────────────────────────────────────────────────────────────

    fn start_heartbeat(&self, inner: &mut Inner) {
        if inner.heartbeat.is_some() {
            return;
        }
        let token = self.ctx.shutdown.child_token();
        inner.heartbeat = Some(token.clone());

        let output = Arc::clone(&self.output);
        let store = Arc::clone(&self.ctx.store);
        let period = self.ctx.heartbeat_interval;
        self.ctx.spawner.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(seconds) = output.position().and_then(round_seconds) {
                            store.set_current_seek(Some(seconds));
                        }
                    }
                }
            }
        });
    }

    /// `Playing -> Ended -> Idle`, then asks the controller for the next track.
    fn watch_ended(&self, generation: u64, ended: oneshot::Receiver<()>) {
        let id = self.id;
        let inner = Arc::clone(&self.inner);
        let emitter = Arc::clone(&self.ctx.emitter);
        let requests = self.ctx.requests.clone();
        let shutdown = self.ctx.shutdown.clone();

        self.ctx.spawner.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                result = ended => {
                    if result.is_err() {
                        return;
                    }
                }
            }

            {
                let mut inner = inner.lock();
                if inner.generation != generation {
                    return;
                }
                stop_heartbeat(&mut inner);
                for state in [PlayerState::Ended, PlayerState::Idle] {
                    inner.state = state;
                    emitter.emit_playback(PlaybackEvent::StateChanged {
                        player_id: id,
                        state,
                        timestamp: now_millis(),
                    });
                }
            }

            log::info!("[Player {}] Track ended; requesting next track", id);
            if requests.send(PlayerRequest::NextTrack { player_id: id }).is_err() {
                log::warn!("[Player {}] Request loop is gone; not advancing", id);
            }
        });
    }
}

fn stop_heartbeat(inner: &mut Inner) {
    if let Some(token) = inner.heartbeat.take() {
        token.cancel();
    }
}

#[async_trait]
impl PlayerAdapter for OutputPlayer {
    fn id(&self) -> PlayerId {
        self.id
    }

    async fn update_playback(&self, command: &PlaybackCommand) -> LoadResult<()> {
        if command.stop == Some(true) {
            self.stop();
            return Ok(());
        }
        if let Some(volume) = command.volume {
            self.output.set_volume(volume);
        }
        if let Some(seconds) = command.seek {
            self.seek(seconds);
        }
        if command.play == Some(true) {
            let loaded = self.inner.lock().state.is_loaded();
            if command.is_warm_resume() && loaded {
                log::debug!("[Player {}] Warm resume", self.id);
            } else {
                self.load(command).await?;
            }
        }
        if command.tracks.is_some() || command.position.is_some() || command.quality.is_some() {
            log::debug!(
                "[Player {}] Metadata update for session {}",
                self.id,
                command.session_id
            );
        }
        if let Some(playing) = command.playing {
            self.set_playing(playing);
        }
        Ok(())
    }

    fn state(&self) -> PlayerState {
        self.inner.lock().state
    }

    fn activate(&self) {
        log::info!("[Player {}] Activated", self.id);
    }

    fn deactivate(&self) {
        self.stop();
        log::info!("[Player {}] Deactivated", self.id);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEventEmitter;
    use crate::error::LoadError;
    use crate::model::fixtures::{session, track, tracks};
    use crate::player::SimulatedOutput;
    use crate::services::session_store::testing::memory_store;

    struct Harness {
        player: Arc<OutputPlayer>,
        output: Arc<SimulatedOutput>,
        store: Arc<SessionStore>,
        requests: mpsc::UnboundedReceiver<PlayerRequest>,
    }

    fn harness(output: SimulatedOutput, playlist: Vec<Track>) -> Harness {
        let store = memory_store();
        store.apply_snapshot(session(1, playlist, 0), true);
        let (tx, rx) = mpsc::unbounded_channel();
        let output = Arc::new(output);
        let ctx = PlayerContext {
            store: Arc::clone(&store),
            api: ApiContext::for_test(),
            requests: tx,
            emitter: Arc::new(NoopEventEmitter),
            spawner: TokioSpawner::current(),
            heartbeat_interval: Duration::from_millis(200),
            shutdown: CancellationToken::new(),
        };
        Harness {
            player: Arc::new(OutputPlayer::new(7, output.clone(), ctx)),
            output,
            store,
            requests: rx,
        }
    }

    fn play_from_start() -> PlaybackCommand {
        PlaybackCommand {
            play: Some(true),
            playing: Some(true),
            position: Some(0),
            seek: Some(0.0),
            ..PlaybackCommand::new(1, Some(1))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Priority
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn stop_outranks_simultaneous_play() {
        let h = harness(SimulatedOutput::new(), tracks(3));
        let command = PlaybackCommand {
            stop: Some(true),
            ..play_from_start()
        };

        h.player.update_playback(&command).await.unwrap();

        assert_eq!(h.player.state(), PlayerState::Idle);
        assert_eq!(h.output.load_count(), 0);
        assert!(!h.output.is_playing());
    }

    #[tokio::test]
    async fn stop_after_playing_ends_stopped() {
        let h = harness(SimulatedOutput::new(), tracks(3));
        h.player.update_playback(&play_from_start()).await.unwrap();
        assert_eq!(h.player.state(), PlayerState::Playing);

        let command = PlaybackCommand {
            stop: Some(true),
            play: Some(true),
            ..PlaybackCommand::new(1, Some(1))
        };
        h.player.update_playback(&command).await.unwrap();

        assert_eq!(h.player.state(), PlayerState::Idle);
        assert!(!h.output.is_playing());
        assert!(h.output.loaded().is_none());
    }

    #[tokio::test]
    async fn volume_applies_with_load() {
        let h = harness(SimulatedOutput::new(), tracks(3));
        let command = PlaybackCommand {
            volume: Some(0.25),
            ..play_from_start()
        };

        h.player.update_playback(&command).await.unwrap();

        assert_eq!(h.output.volume(), 0.25);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn full_load_binds_track_at_position_and_plays() {
        let h = harness(SimulatedOutput::new(), tracks(3));
        let command = PlaybackCommand {
            position: Some(2),
            ..play_from_start()
        };

        h.player.update_playback(&command).await.unwrap();

        assert_eq!(h.player.state(), PlayerState::Playing);
        assert_eq!(h.player.track().map(|t| t.id), Some(3));
        let loaded = h.output.loaded().unwrap();
        assert!(loaded.url.contains("trackId=3"));
        assert_eq!(h.store.client_state().current_track_length, 183.0);
    }

    #[tokio::test]
    async fn play_without_selection_stays_idle() {
        let h = harness(SimulatedOutput::new(), vec![]);

        h.player.update_playback(&play_from_start()).await.unwrap();

        assert_eq!(h.player.state(), PlayerState::Idle);
        assert_eq!(h.output.load_count(), 0);
    }

    #[tokio::test]
    async fn warm_resume_does_not_reload() {
        let h = harness(SimulatedOutput::new(), tracks(3));
        h.player.update_playback(&play_from_start()).await.unwrap();
        let pause = PlaybackCommand {
            playing: Some(false),
            ..PlaybackCommand::new(1, Some(1))
        };
        h.player.update_playback(&pause).await.unwrap();
        assert_eq!(h.player.state(), PlayerState::Paused);

        let resume = PlaybackCommand {
            play: Some(true),
            playing: Some(true),
            seek: Some(30.0),
            ..PlaybackCommand::new(1, Some(1))
        };
        h.player.update_playback(&resume).await.unwrap();

        assert_eq!(h.player.state(), PlayerState::Playing);
        assert_eq!(h.output.load_count(), 1);
        assert_eq!(h.output.position().map(f64::round), Some(30.0));
    }

    #[tokio::test(start_paused = true)]
    async fn seek_during_load_is_applied_at_ready() {
        let h = harness(
            SimulatedOutput::new().with_load_delay(Duration::from_secs(1)),
            tracks(3),
        );
        let command = PlaybackCommand {
            playing: None,
            ..play_from_start()
        };

        let player = Arc::clone(&h.player);
        let load = tokio::spawn(async move { player.update_playback(&command).await });
        tokio::task::yield_now().await;
        assert_eq!(h.player.state(), PlayerState::Loading);

        let seek = PlaybackCommand {
            seek: Some(12.0),
            ..PlaybackCommand::new(1, Some(1))
        };
        h.player.update_playback(&seek).await.unwrap();
        load.await.unwrap().unwrap();

        assert_eq!(h.player.state(), PlayerState::Ready);
        assert_eq!(h.output.position(), Some(12.0));
    }

    #[tokio::test]
    async fn load_failure_stalls_until_fresh_command() {
        let h = harness(SimulatedOutput::new(), tracks(3));
        h.output.fail_next_load(LoadError::Source("unreachable".into()));

        let err = h.player.update_playback(&play_from_start()).await.unwrap_err();
        assert_eq!(err, LoadError::Source("unreachable".into()));
        assert_eq!(h.player.state(), PlayerState::Loading);

        h.player.update_playback(&play_from_start()).await.unwrap();
        assert_eq!(h.player.state(), PlayerState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_load_is_discarded() {
        let h = harness(
            SimulatedOutput::new().with_load_delay(Duration::from_secs(1)),
            tracks(3),
        );
        let player = Arc::clone(&h.player);
        let load = tokio::spawn(async move { player.update_playback(&play_from_start()).await });
        tokio::task::yield_now().await;

        let stop = PlaybackCommand {
            stop: Some(true),
            ..PlaybackCommand::new(1, Some(1))
        };
        h.player.update_playback(&stop).await.unwrap();
        load.await.unwrap().unwrap();

        assert_eq!(h.player.state(), PlayerState::Idle);
        assert!(!h.output.is_playing());
        assert!(h.output.loaded().is_none());
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Background tasks
    // ─────────────────────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn heartbeat_publishes_rounded_position() {
        let h = harness(SimulatedOutput::new(), tracks(3));
        h.player.update_playback(&play_from_start()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2200)).await;

        assert_eq!(h.store.current_seek(), Some(2.0));
    }

    #[tokio::test(start_paused = true)]
    async fn ended_track_goes_idle_and_requests_next() {
        let mut h = harness(
            SimulatedOutput::new(),
            vec![track(1, 2.0), track(2, 2.0)],
        );
        h.player.update_playback(&play_from_start()).await.unwrap();

        let request = h.requests.recv().await.unwrap();

        assert_eq!(request, PlayerRequest::NextTrack { player_id: 7 });
        assert_eq!(h.player.state(), PlayerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_track_does_not_end() {
        let mut h = harness(SimulatedOutput::new(), vec![track(1, 2.0)]);
        h.player.update_playback(&play_from_start()).await.unwrap();
        let pause = PlaybackCommand {
            playing: Some(false),
            ..PlaybackCommand::new(1, Some(1))
        };
        h.player.update_playback(&pause).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(h.requests.try_recv().is_err());
        assert_eq!(h.player.state(), PlayerState::Paused);
    }
}
