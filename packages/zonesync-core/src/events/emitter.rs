//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than concrete broadcast
//! channels, enabling testing and alternative delivery (UI bindings, logs).

use super::{PlaybackEvent, SessionEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn seeked(&self, seconds: f64) {
///         self.emitter.emit_playback(PlaybackEvent::Seek { seconds, manual: true });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits a change to the mirrored session/zone state.
    fn emit_session(&self, event: SessionEvent);

    /// Emits local playback activity.
    fn emit_playback(&self, event: PlaybackEvent);
}

/// No-op emitter for headless use or testing.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_session(&self, _event: SessionEvent) {}

    fn emit_playback(&self, _event: PlaybackEvent) {}
}

/// Logs every event at debug level.
///
/// Records reach a `log` backend such as `env_logger` when no tracing
/// subscriber is installed.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_session(&self, event: SessionEvent) {
        tracing::debug!(?event, "session_event");
    }

    fn emit_playback(&self, event: PlaybackEvent) {
        tracing::debug!(?event, "playback_event");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use parking_lot::Mutex;

    use super::*;

    /// Test emitter that records everything it is given.
    #[derive(Default)]
    pub struct RecordingEventEmitter {
        pub session: Mutex<Vec<SessionEvent>>,
        pub playback: Mutex<Vec<PlaybackEvent>>,
    }

    impl EventEmitter for RecordingEventEmitter {
        fn emit_session(&self, event: SessionEvent) {
            self.session.lock().push(event);
        }

        fn emit_playback(&self, event: PlaybackEvent) {
            self.playback.lock().push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingEventEmitter;
    use super::*;
    use std::sync::Arc;

    #[test]
    fn recording_emitter_tracks_events() {
        let emitter = Arc::new(RecordingEventEmitter::default());

        emitter.emit_playback(PlaybackEvent::Seek {
            seconds: 1.0,
            manual: true,
        });
        emitter.emit_session(SessionEvent::AudioZoneChanged {
            value: Some(1),
            old: None,
        });
        emitter.emit_playback(PlaybackEvent::PlayerRegistered { player_id: 1 });

        assert_eq!(emitter.playback.lock().len(), 2);
        assert_eq!(emitter.session.lock().len(), 1);
    }
}
