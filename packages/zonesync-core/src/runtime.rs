//! Task spawning seam for the engine's background loops.
//!
//! The seek heartbeat, the end-of-track watcher and the controller's inbound
//! and player-request loops are all started through [`TaskSpawner`], so an
//! embedder can run them on a runtime of its choosing.

use std::future::Future;

use crate::error::ConfigError;

/// Spawns detached background work.
///
/// Tasks must keep running after the spawner is dropped. Stopping them is the
/// task's own concern (each loop watches a `CancellationToken`).
pub trait TaskSpawner: Send + Sync {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Spawner backed by a Tokio runtime handle.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Spawner for the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside a Tokio runtime.
    pub fn try_current() -> Result<Self, ConfigError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| ConfigError(format!("no Tokio runtime available: {e}")))
    }

    /// Like [`try_current`](Self::try_current), for callers already on a runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl TaskSpawner for TokioSpawner {
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(future);
    }
}
