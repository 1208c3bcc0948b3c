//! Engine bootstrap and dependency wiring.
//!
//! This module contains the composition root - the single place where all
//! services are instantiated and wired together. Embedders supply the edges
//! (key-value store, remote transport, API context, catalog and the player
//! factory); everything in between is created here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::context::ApiContext;
use crate::error::ZoneSyncResult;
use crate::events::{BroadcastEventBridge, EventEmitter};
use crate::persistence::{ClientStatePersistence, KeyValueStore};
use crate::player::{PlayerContext, PlayerFactory};
use crate::runtime::{TaskSpawner, TokioSpawner};
use crate::services::{PlaybackController, PlayerRegistry, Reconciler, SessionStore, TrackResolver};
use crate::state::Config;
use crate::transport::{InboundMessage, RemoteTransport};

/// External collaborators the engine is wired to.
pub struct EngineDeps {
    /// Durable storage for the client playback mirror.
    pub store: Arc<dyn KeyValueStore>,
    /// Outbound half of the session authority connection.
    pub transport: Arc<dyn RemoteTransport>,
    pub api: ApiContext,
    pub resolver: Arc<dyn TrackResolver>,
}

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedEngine {
    /// Canonical zone/session mirror.
    pub store: Arc<SessionStore>,
    /// Locally attached player adapters.
    pub registry: Arc<PlayerRegistry>,
    pub reconciler: Arc<Reconciler>,
    /// User-facing playback operations.
    pub controller: Arc<PlaybackController>,
    /// Event bridge for async consumers and an optional external emitter.
    pub event_bridge: Arc<BroadcastEventBridge>,
    pub transport: Arc<dyn RemoteTransport>,
    /// Shared context handed to every adapter the factory creates.
    pub player_context: PlayerContext,
    /// Feeds the inbound loop; messages are applied in send order.
    pub inbound_tx: mpsc::Sender<InboundMessage>,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
}

impl BootstrappedEngine {
    /// Queues one inbound message for the controller.
    ///
    /// Returns false once the inbound loop has stopped.
    pub async fn deliver(&self, message: InboundMessage) -> bool {
        self.inbound_tx.send(message).await.is_ok()
    }

    /// Stops background loops and releases every local player.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");

        self.cancel_token.cancel();

        let ids = self.registry.ids();
        for id in &ids {
            self.registry.unregister(*id);
        }
        log::info!("[Bootstrap] Released {} player(s)", ids.len());

        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Bootstraps the engine with its dependencies.
///
/// Services are created in dependency order:
///
/// 1. Event bridge and cancellation token
/// 2. Session store (loads the persisted client state once)
/// 3. Player registry and reconciler
/// 4. Player context and the embedder's player factory
/// 5. Playback controller, then its inbound and player-request loops
///
/// # Errors
///
/// Returns an error if `config` is invalid or no Tokio runtime is running.
pub fn bootstrap_engine<F>(
    config: &Config,
    deps: EngineDeps,
    make_factory: F,
) -> ZoneSyncResult<BootstrappedEngine>
where
    F: FnOnce(PlayerContext) -> Arc<dyn PlayerFactory>,
{
    config.validate()?;

    let spawner = TokioSpawner::try_current()?;
    let cancel_token = CancellationToken::new();
    let event_bridge = Arc::new(BroadcastEventBridge::new(config.event_channel_capacity));
    let emitter = Arc::clone(&event_bridge) as Arc<dyn EventEmitter>;

    let store = Arc::new(SessionStore::new(
        ClientStatePersistence::new(deps.store),
        Arc::clone(&emitter),
    ));
    let registry = Arc::new(PlayerRegistry::new(Arc::clone(&emitter)));
    let reconciler = Arc::new(Reconciler::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&deps.transport),
    ));

    let (requests_tx, requests_rx) = mpsc::unbounded_channel();
    let player_context = PlayerContext {
        store: Arc::clone(&store),
        api: deps.api,
        requests: requests_tx,
        emitter: Arc::clone(&emitter),
        spawner: spawner.clone(),
        heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
        shutdown: cancel_token.clone(),
    };
    let factory = make_factory(player_context.clone());

    let controller = Arc::new(PlaybackController::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        Arc::clone(&reconciler),
        deps.resolver,
        factory,
        emitter,
        config.previous_track_restart_threshold_secs,
    ));

    let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_channel_capacity);
    spawner.spawn(
        Arc::clone(&controller).run_inbound(inbound_rx, cancel_token.clone()),
    );
    spawner.spawn(
        Arc::clone(&controller).run_player_requests(requests_rx, cancel_token.clone()),
    );
    log::info!("[Bootstrap] Engine ready");

    Ok(BootstrappedEngine {
        store,
        registry,
        reconciler,
        controller,
        event_bridge,
        transport: deps.transport,
        player_context,
        inbound_tx,
        spawner,
        cancel_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ZoneSyncError;
    use crate::events::{BroadcastEvent, SessionEvent};
    use crate::model::fixtures::{session, track, tracks, zone};
    use crate::model::{Connection, ConnectionPlayer, PlayerKind};
    use crate::persistence::MemoryStore;
    use crate::player::{PlayerState, SimulatedPlayerFactory};
    use crate::services::StaticTrackResolver;
    use crate::transport::testing::MockTransport;

    fn deps(transport: Arc<MockTransport>) -> EngineDeps {
        EngineDeps {
            store: Arc::new(MemoryStore::new()),
            transport,
            api: ApiContext::for_test(),
            resolver: Arc::new(StaticTrackResolver::new()),
        }
    }

    fn simulated(ctx: PlayerContext) -> Arc<dyn PlayerFactory> {
        Arc::new(SimulatedPlayerFactory::new(ctx))
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = Config {
            heartbeat_interval_ms: 0,
            ..Default::default()
        };

        let result = bootstrap_engine(&config, deps(Arc::default()), simulated);

        assert!(matches!(result, Err(ZoneSyncError::Config(_))));
    }

    #[test]
    fn requires_a_runtime() {
        let result = bootstrap_engine(&Config::default(), deps(Arc::default()), simulated);

        assert!(matches!(result, Err(ZoneSyncError::Config(_))));
    }

    async fn wait_for_sessions(events: &mut tokio::sync::broadcast::Receiver<BroadcastEvent>) {
        loop {
            if let Ok(BroadcastEvent::Session(SessionEvent::SessionsReplaced { .. })) =
                events.recv().await
            {
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn two_local_players_advance_one_track_per_ending() {
        let transport = Arc::new(MockTransport::default());
        let engine =
            bootstrap_engine(&Config::default(), deps(transport.clone()), simulated).unwrap();
        let mut events = engine.event_bridge.subscribe();
        engine.controller.set_connection_id("agent-1");

        engine
            .deliver(InboundMessage::AudioZones {
                payload: vec![zone(1, &[5, 6])],
            })
            .await;
        engine
            .deliver(InboundMessage::Connections {
                payload: vec![Connection {
                    connection_id: "agent-1".into(),
                    name: "Agent".into(),
                    players: [5, 6]
                        .into_iter()
                        .map(|player_id| ConnectionPlayer {
                            player_id,
                            kind: PlayerKind::Simulated,
                            name: format!("Sim {player_id}"),
                        })
                        .collect(),
                }],
            })
            .await;
        engine
            .deliver(InboundMessage::Sessions {
                payload: vec![session(
                    1,
                    vec![track(1, 2.0), track(2, 2.0), track(3, 2.0)],
                    0,
                )],
            })
            .await;
        wait_for_sessions(&mut events).await;

        engine.controller.play_from_playlist_position(0).await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(engine.registry.len(), 2);
        assert_eq!(engine.store.current_track().map(|t| t.id), Some(2));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn inbound_flow_registers_players_and_loads_track() {
        let transport = Arc::new(MockTransport::default());
        let engine =
            bootstrap_engine(&Config::default(), deps(transport.clone()), simulated).unwrap();
        let mut events = engine.event_bridge.subscribe();
        engine.controller.set_connection_id("agent-1");

        engine
            .deliver(InboundMessage::AudioZones {
                payload: vec![zone(1, &[5])],
            })
            .await;
        engine
            .deliver(InboundMessage::Connections {
                payload: vec![Connection {
                    connection_id: "agent-1".into(),
                    name: "Agent".into(),
                    players: vec![ConnectionPlayer {
                        player_id: 5,
                        kind: PlayerKind::Simulated,
                        name: "Sim".into(),
                    }],
                }],
            })
            .await;
        engine
            .deliver(InboundMessage::Sessions {
                payload: vec![session(1, tracks(3), 0)],
            })
            .await;

        // Wait for the session list to land before driving playback.
        wait_for_sessions(&mut events).await;
        engine.controller.play_from_playlist_position(1).await;

        let player = engine.registry.get(5).unwrap();
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(engine.store.current_track().map(|t| t.id), Some(2));
        assert_eq!(transport.last_sent().unwrap().position, Some(1));

        engine.shutdown().await;
        assert!(engine.registry.is_empty());
        assert_eq!(player.state(), PlayerState::Idle);
    }
}
