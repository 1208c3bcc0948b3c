//! Fan-out of engine events to async subscribers.
//!
//! Session and playback events are published on one broadcast channel.
//! The agent's event log and any UI binding subscribe there; a host that
//! needs synchronous callbacks installs a second emitter alongside.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::emitter::EventEmitter;
use super::{BroadcastEvent, PlaybackEvent, SessionEvent};

/// [`EventEmitter`] that publishes on a `tokio::sync::broadcast` channel.
///
/// Slow subscribers lag and skip events; emitting never blocks the engine.
#[derive(Clone)]
pub struct BroadcastEventBridge {
    tx: broadcast::Sender<BroadcastEvent>,
    host: Arc<RwLock<Option<Arc<dyn EventEmitter>>>>,
}

impl BroadcastEventBridge {
    /// Creates a bridge whose channel buffers `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            host: Arc::new(RwLock::new(None)),
        }
    }

    /// Installs a host emitter. It sees each event before the channel does.
    pub fn set_external_emitter(&self, emitter: Arc<dyn EventEmitter>) {
        *self.host.write() = Some(emitter);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }
}

macro_rules! forward_event {
    ($method:ident, $event_ty:ty, $variant:ident) => {
        fn $method(&self, event: $event_ty) {
            if let Some(ref host) = *self.host.read() {
                host.$method(event.clone());
            }
            // Err only means nobody is subscribed yet.
            if self.tx.send(BroadcastEvent::$variant(event)).is_err() {
                log::trace!("[EventBridge] Dropped {} event", stringify!($variant));
            }
        }
    };
}

impl EventEmitter for BroadcastEventBridge {
    forward_event!(emit_session, SessionEvent, Session);
    forward_event!(emit_playback, PlaybackEvent, Playback);
}
