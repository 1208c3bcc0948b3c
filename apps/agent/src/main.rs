//! ZoneSync Agent - headless client for a ZoneSync session authority.
//!
//! Connects to the server over WebSocket, announces its simulated players,
//! mirrors zones and sessions, and drives its players whenever it is the
//! master of their zone. Playback can be controlled from stdin.

mod config;
mod console;
mod ws_transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use zonesync_core::{
    bootstrap_engine, ApiContext, ChannelTransport, ClientCredentials, Connection,
    ConnectionPlayer, EngineDeps, JsonFileStore, KeyValueStore, LoggingEventEmitter, MemoryStore,
    PlayerContext, PlayerFactory, PlayerKind, RemoteTransport, SimulatedPlayerFactory,
};

use crate::config::AgentConfig;

/// ZoneSync Agent - Headless playback client for shared audio zones.
#[derive(Parser, Debug)]
#[command(name = "zonesync-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "ZONESYNC_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Session authority WebSocket URL (overrides config file).
    #[arg(short = 's', long, env = "ZONESYNC_SERVER_URL")]
    server_url: Option<String>,

    /// Catalog API base URL (overrides config file).
    #[arg(short = 'a', long, env = "ZONESYNC_API_URL")]
    api_url: Option<String>,

    /// Connection id announced to the server (overrides config file).
    #[arg(long, env = "ZONESYNC_CONNECTION_ID")]
    connection_id: Option<String>,

    /// Data directory for persistent client state.
    #[arg(short = 'd', long, env = "ZONESYNC_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Do not read commands from stdin.
    #[arg(long)]
    no_console: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("ZoneSync Agent v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        AgentConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(url) = args.server_url {
        config.server_url = url;
    }
    if let Some(url) = args.api_url {
        config.api_url = url;
    }
    if let Some(id) = args.connection_id {
        config.connection_id = Some(id);
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }
    let connection_id = config
        .connection_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    log::info!(
        "Configuration: server_url={}, api_url={}, connection_id={}",
        config.server_url,
        config.api_url,
        connection_id
    );

    let store: Arc<dyn KeyValueStore> = match config.data_dir {
        Some(ref data_dir) => {
            log::info!("Using data directory: {}", data_dir.display());
            Arc::new(JsonFileStore::in_dir(data_dir))
        }
        None => {
            log::info!("No data directory configured - playback state will not persist");
            Arc::new(MemoryStore::new())
        }
    };

    let api = ApiContext::new(&config.api_url).context("Invalid API URL")?;
    api.set_credentials(ClientCredentials {
        client_id: config.client_id.clone(),
        signature: config.signature.clone(),
    });

    let (transport, outbound_rx) = ChannelTransport::new();
    let transport = Arc::new(transport);

    let engine = bootstrap_engine(
        &config.to_core_config(),
        EngineDeps {
            store,
            transport: Arc::clone(&transport) as Arc<dyn RemoteTransport>,
            api,
            resolver: Arc::new(config.to_resolver()),
        },
        |ctx: PlayerContext| Arc::new(SimulatedPlayerFactory::new(ctx)) as Arc<dyn PlayerFactory>,
    )
    .context("Failed to bootstrap engine")?;
    engine.controller.set_connection_id(connection_id.clone());

    log::info!("Engine bootstrapped successfully");

    if args.log_level >= log::LevelFilter::Debug {
        engine
            .event_bridge
            .set_external_emitter(Arc::new(LoggingEventEmitter));
    }

    let mut link = ws_transport::connect(
        &config.server_url,
        outbound_rx,
        engine.inbound_tx.clone(),
        engine.cancel_token.clone(),
    )
    .await?;

    transport
        .register_connection(&Connection {
            connection_id,
            name: config.connection_name.clone(),
            players: config
                .player_ids
                .iter()
                .map(|&player_id| ConnectionPlayer {
                    player_id,
                    kind: PlayerKind::Simulated,
                    name: format!("{} #{}", config.connection_name, player_id),
                })
                .collect(),
        })
        .context("Failed to register connection")?;

    if !args.no_console {
        tokio::spawn(console::run(
            Arc::clone(&engine.controller),
            Arc::clone(&engine.store),
            engine.cancel_token.clone(),
        ));
    }

    // Wait for shutdown signal or the server closing the connection
    tokio::select! {
        _ = shutdown_signal() => log::info!("Shutdown signal received, cleaning up..."),
        _ = &mut link.reader => log::warn!("Connection to the session authority lost"),
    }

    // Graceful shutdown
    engine.shutdown().await;
    link.abort();

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
