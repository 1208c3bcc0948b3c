//! Registry of locally attached player adapters.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{EventEmitter, PlaybackEvent};
use crate::model::{AudioZone, PlayerId};
use crate::player::PlayerAdapter;
use crate::services::master_election;

/// Id-to-adapter map with at most one adapter per id.
pub struct PlayerRegistry {
    players: RwLock<Vec<Arc<dyn PlayerAdapter>>>,
    emitter: Arc<dyn EventEmitter>,
}

impl PlayerRegistry {
    pub fn new(emitter: Arc<dyn EventEmitter>) -> Self {
        Self {
            players: RwLock::new(Vec::new()),
            emitter,
        }
    }

    /// Registers `adapter` and activates it.
    ///
    /// Returns false, without touching the existing adapter, if one with the
    /// same id is already registered.
    pub fn register(&self, adapter: Arc<dyn PlayerAdapter>) -> bool {
        let id = adapter.id();
        {
            let mut players = self.players.write();
            if players.iter().any(|p| p.id() == id) {
                log::debug!("[PlayerRegistry] Player {} already registered", id);
                return false;
            }
            players.push(Arc::clone(&adapter));
        }
        adapter.activate();
        log::info!("[PlayerRegistry] Registered player {}", id);
        self.emitter
            .emit_playback(PlaybackEvent::PlayerRegistered { player_id: id });
        true
    }

    /// Removes and deactivates the adapter with `id`.
    pub fn unregister(&self, id: PlayerId) -> bool {
        let removed = {
            let mut players = self.players.write();
            let index = players.iter().position(|p| p.id() == id);
            index.map(|i| players.remove(i))
        };
        let Some(adapter) = removed else {
            return false;
        };
        adapter.deactivate();
        log::info!("[PlayerRegistry] Unregistered player {}", id);
        self.emitter
            .emit_playback(PlaybackEvent::PlayerUnregistered { player_id: id });
        true
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.read().iter().any(|p| p.id() == id)
    }

    pub fn get(&self, id: PlayerId) -> Option<Arc<dyn PlayerAdapter>> {
        self.players.read().iter().find(|p| p.id() == id).cloned()
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.read().iter().map(|p| p.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }

    /// Local adapters bound to `zone`, in the zone's binding order.
    pub fn zone_players(&self, zone: &AudioZone) -> Vec<Arc<dyn PlayerAdapter>> {
        zone.players
            .iter()
            .filter_map(|binding| self.get(binding.player_id))
            .collect()
    }

    /// Whether this client is the master of `zone` right now.
    pub fn is_master(&self, zone: &AudioZone) -> bool {
        master_election::is_master(zone, |id| self.contains(id))
    }

    /// Local player that would drive `zone`, if any binding is local.
    pub fn master_candidate(&self, zone: &AudioZone) -> Option<PlayerId> {
        master_election::local_candidate(zone, |id| self.contains(id))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::LoadResult;
    use crate::model::{PlaybackCommand, PlayerId};
    use crate::player::{PlayerAdapter, PlayerState};

    /// Adapter that records every command it receives.
    #[derive(Default)]
    pub struct MockAdapter {
        pub id: PlayerId,
        pub commands: Mutex<Vec<PlaybackCommand>>,
        pub activations: AtomicUsize,
        pub deactivations: AtomicUsize,
    }

    impl MockAdapter {
        pub fn new(id: PlayerId) -> Self {
            Self {
                id,
                ..Default::default()
            }
        }

        pub fn last_command(&self) -> Option<PlaybackCommand> {
            self.commands.lock().last().cloned()
        }
    }

    #[async_trait]
    impl PlayerAdapter for MockAdapter {
        fn id(&self) -> PlayerId {
            self.id
        }

        async fn update_playback(&self, command: &PlaybackCommand) -> LoadResult<()> {
            self.commands.lock().push(command.clone());
            Ok(())
        }

        fn state(&self) -> PlayerState {
            PlayerState::Idle
        }

        fn activate(&self) {
            self.activations.fetch_add(1, Ordering::SeqCst);
        }

        fn deactivate(&self) {
            self.deactivations.fetch_add(1, Ordering::SeqCst);
        }
    }
}
