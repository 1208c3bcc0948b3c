//! Clock-driven output without audio hardware.
//!
//! Position advances with the tokio clock while playing, so tests running on
//! a paused runtime can drive it with `tokio::time::advance`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Notify};
use tokio::time::Instant;

use crate::error::{LoadError, LoadResult};
use crate::model::{ConnectionPlayer, PlayerKind};
use crate::player::output_player::{OutputPlayer, PlayerContext};
use crate::player::traits::{AudioOutput, LoadedTrack, PlayerAdapter, PlayerFactory, TrackSource};

struct SimState {
    loaded: Option<TrackSource>,
    generation: u64,
    duration: f64,
    /// Position at `since`, or the frozen position while paused.
    anchor: f64,
    /// Set while playing.
    since: Option<Instant>,
    volume: f64,
    ended_tx: Option<oneshot::Sender<()>>,
    /// Wakes the end-of-track watcher of the current generation.
    changed: Arc<Notify>,
}

impl SimState {
    fn position(&self) -> f64 {
        let elapsed = self
            .since
            .map(|since| since.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.anchor + elapsed).min(self.duration)
    }
}

/// Output that only keeps time.
pub struct SimulatedOutput {
    state: Arc<Mutex<SimState>>,
    load_delay: Duration,
    fail_next: Mutex<Option<LoadError>>,
    loads: AtomicUsize,
}

impl Default for SimulatedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedOutput {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                loaded: None,
                generation: 0,
                duration: 0.0,
                anchor: 0.0,
                since: None,
                volume: 1.0,
                ended_tx: None,
                changed: Arc::new(Notify::new()),
            })),
            load_delay: Duration::ZERO,
            fail_next: Mutex::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    /// Makes every load take `delay` before completing.
    #[must_use]
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Makes the next load fail with `error`.
    pub fn fail_next_load(&self, error: LoadError) {
        *self.fail_next.lock() = Some(error);
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().since.is_some()
    }

    pub fn volume(&self) -> f64 {
        self.state.lock().volume
    }

    /// The source currently loaded, if any.
    pub fn loaded(&self) -> Option<TrackSource> {
        self.state.lock().loaded.clone()
    }

    /// Number of loads that completed successfully.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn spawn_end_watcher(state: Arc<Mutex<SimState>>, generation: u64, changed: Arc<Notify>) {
        tokio::spawn(async move {
            loop {
                let remaining = {
                    let mut s = state.lock();
                    if s.generation != generation || s.loaded.is_none() {
                        return;
                    }
                    match s.since {
                        Some(_) => {
                            let remaining = s.duration - s.position();
                            if remaining <= 0.0 {
                                s.anchor = s.duration;
                                s.since = None;
                                if let Some(tx) = s.ended_tx.take() {
                                    let _ = tx.send(());
                                }
                                return;
                            }
                            Some(Duration::from_secs_f64(remaining))
                        }
                        None => None,
                    }
                };

                match remaining {
                    Some(remaining) => {
                        tokio::select! {
                            _ = tokio::time::sleep(remaining) => {}
                            _ = changed.notified() => {}
                        }
                    }
                    None => changed.notified().await,
                }
            }
        });
    }
}

#[async_trait]
impl AudioOutput for SimulatedOutput {
    async fn load(&self, source: &TrackSource) -> LoadResult<LoadedTrack> {
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        if !source.track.duration.is_finite() || source.track.duration <= 0.0 {
            return Err(LoadError::Decode(format!(
                "track {} has no playable duration",
                source.track.id
            )));
        }

        let (tx, rx) = oneshot::channel();
        let (generation, changed) = {
            let mut s = self.state.lock();
            s.changed.notify_one();
            s.generation += 1;
            s.loaded = Some(source.clone());
            s.duration = source.track.duration;
            s.anchor = 0.0;
            s.since = None;
            s.ended_tx = Some(tx);
            s.changed = Arc::new(Notify::new());
            (s.generation, Arc::clone(&s.changed))
        };
        Self::spawn_end_watcher(Arc::clone(&self.state), generation, changed);
        self.loads.fetch_add(1, Ordering::SeqCst);
        log::debug!("[SimulatedOutput] Loaded {}", source.url);

        Ok(LoadedTrack {
            duration: Some(source.track.duration),
            ended: rx,
        })
    }

    fn play(&self) {
        let mut s = self.state.lock();
        if s.loaded.is_some() && s.since.is_none() {
            s.since = Some(Instant::now());
            s.changed.notify_one();
        }
    }

    fn pause(&self) {
        let mut s = self.state.lock();
        if s.since.is_some() {
            s.anchor = s.position();
            s.since = None;
            s.changed.notify_one();
        }
    }

    fn stop(&self) {
        let mut s = self.state.lock();
        s.generation += 1;
        s.loaded = None;
        s.anchor = 0.0;
        s.since = None;
        s.ended_tx = None;
        s.changed.notify_one();
    }

    fn seek(&self, seconds: f64) {
        let mut s = self.state.lock();
        if s.loaded.is_none() {
            return;
        }
        s.anchor = seconds.clamp(0.0, s.duration);
        if s.since.is_some() {
            s.since = Some(Instant::now());
        }
        s.changed.notify_one();
    }

    fn set_volume(&self, volume: f64) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn position(&self) -> Option<f64> {
        let s = self.state.lock();
        s.loaded.as_ref().map(|_| s.position())
    }
}

/// Creates an [`OutputPlayer`] over a fresh [`SimulatedOutput`] for every
/// simulated player a connection advertises.
pub struct SimulatedPlayerFactory {
    ctx: PlayerContext,
}

impl SimulatedPlayerFactory {
    pub fn new(ctx: PlayerContext) -> Self {
        Self { ctx }
    }
}

impl PlayerFactory for SimulatedPlayerFactory {
    fn create(&self, player: &ConnectionPlayer) -> Option<Arc<dyn PlayerAdapter>> {
        match player.kind {
            PlayerKind::Simulated => Some(Arc::new(OutputPlayer::new(
                player.player_id,
                Arc::new(SimulatedOutput::new()),
                self.ctx.clone(),
            ))),
            PlayerKind::Unsupported => None,
        }
    }
}
