//! Agent configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use zonesync_core::{AlbumRef, StaticTrackResolver, Track};

/// An album the agent's static catalog can resolve.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogAlbum {
    #[serde(flatten)]
    pub album: AlbumRef,
    pub tracks: Vec<Track>,
}

/// Agent configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// WebSocket endpoint of the session authority.
    /// Override: `ZONESYNC_SERVER_URL`
    pub server_url: String,

    /// Base URL track sources are built from.
    /// Override: `ZONESYNC_API_URL`
    pub api_url: String,

    /// Connection id announced to the server; generated when absent.
    /// Override: `ZONESYNC_CONNECTION_ID`
    pub connection_id: Option<String>,

    /// Human-readable connection name.
    /// Override: `ZONESYNC_CONNECTION_NAME`
    pub connection_name: String,

    /// Ids of the simulated players this agent exposes.
    pub player_ids: Vec<u64>,

    /// Directory for the persisted client state.
    /// Override: `ZONESYNC_DATA_DIR`
    pub data_dir: Option<PathBuf>,

    /// Credentials appended to track URLs.
    pub client_id: Option<String>,
    pub signature: Option<String>,

    /// Seek heartbeat period while playing (milliseconds).
    /// Override: `ZONESYNC_HEARTBEAT_INTERVAL_MS`
    pub heartbeat_interval_ms: u64,

    /// Restart the current track on "previous" once past this many seconds.
    pub previous_track_restart_threshold_secs: Option<f64>,

    /// Albums served by the static catalog.
    pub catalog: Vec<CatalogAlbum>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let core = zonesync_core::Config::default();
        Self {
            server_url: "ws://127.0.0.1:8000/ws".to_string(),
            api_url: "http://127.0.0.1:8000".to_string(),
            connection_id: None,
            connection_name: "zonesync-agent".to_string(),
            player_ids: vec![1],
            data_dir: None,
            client_id: None,
            signature: None,
            heartbeat_interval_ms: core.heartbeat_interval_ms,
            previous_track_restart_threshold_secs: core.previous_track_restart_threshold_secs,
            catalog: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ZONESYNC_SERVER_URL") {
            self.server_url = val;
        }

        if let Ok(val) = std::env::var("ZONESYNC_API_URL") {
            self.api_url = val;
        }

        if let Ok(val) = std::env::var("ZONESYNC_CONNECTION_NAME") {
            self.connection_name = val;
        }

        if let Ok(val) = std::env::var("ZONESYNC_HEARTBEAT_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                self.heartbeat_interval_ms = interval;
            }
        }

        // Note: ZONESYNC_CONNECTION_ID and ZONESYNC_DATA_DIR are handled by clap
        // via #[arg(env = ...)] in main.rs
    }

    /// Converts to zonesync-core's Config type.
    pub fn to_core_config(&self) -> zonesync_core::Config {
        zonesync_core::Config {
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            previous_track_restart_threshold_secs: self.previous_track_restart_threshold_secs,
            ..Default::default()
        }
    }

    /// Builds the static catalog from the configured albums.
    pub fn to_resolver(&self) -> StaticTrackResolver {
        let resolver = StaticTrackResolver::new();
        for entry in &self.catalog {
            resolver.insert(entry.album.clone(), entry.tracks.clone());
        }
        resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::{TrackOrigin, TrackResolver};

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AgentConfig::parse("connection_name: kitchen\nplayer_ids: [4, 5]\n").unwrap();

        assert_eq!(config.connection_name, "kitchen");
        assert_eq!(config.player_ids, vec![4, 5]);
        assert_eq!(config.heartbeat_interval_ms, 200);
        assert!(config.catalog.is_empty());
    }

    #[test]
    fn core_config_carries_overrides() {
        let config = AgentConfig {
            heartbeat_interval_ms: 500,
            previous_track_restart_threshold_secs: Some(5.0),
            ..Default::default()
        };

        let core = config.to_core_config();

        assert_eq!(core.heartbeat_interval_ms, 500);
        assert_eq!(core.previous_track_restart_threshold_secs, Some(5.0));
        assert!(core.validate().is_ok());
    }

    #[tokio::test]
    async fn catalog_feeds_resolver() {
        let yaml = r#"
catalog:
  - origin: TIDAL
    albumId: "42"
    tracks:
      - trackId: 7
        title: Intro
        artist: Band
        album: Debut
        duration: 61.5
"#;
        let config = AgentConfig::parse(yaml).unwrap();
        let resolver = config.to_resolver();

        let tracks = resolver
            .album_tracks(&AlbumRef::new(TrackOrigin::Tidal, "42"))
            .await
            .unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, 7);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        assert!(AgentConfig::load(Some(&path)).is_err());
    }
}
