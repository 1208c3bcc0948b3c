//! Centralized error types for the ZoneSync core library.
//!
//! Every failure in this crate degrades to "state unchanged": errors are
//! logged where they happen and surfaced to callers as values, never as
//! panics or process exits.

use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
///
/// Implement this trait to provide consistent error codes across different
/// error conversion paths.
pub trait ErrorCode {
    /// Returns a machine-readable error code for logs and event payloads.
    fn code(&self) -> &'static str;
}

/// Send/receive failure on the remote transport. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The outbound channel has no live receiver.
    #[error("Transport closed")]
    Closed,

    /// A message could not be encoded for the wire.
    #[error("Failed to encode message: {0}")]
    Encode(String),

    /// An inbound frame could not be decoded.
    #[error("Failed to decode message: {0}")]
    Decode(String),

    /// The underlying connection failed.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Closed => "transport_closed",
            Self::Encode(_) => "transport_encode_failed",
            Self::Decode(_) => "transport_decode_failed",
            Self::Connection(_) => "transport_connection_failed",
        }
    }
}

/// An output failed to prepare a track. The adapter stays in `Loading`.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum LoadError {
    /// The track source could not be fetched.
    #[error("Source unavailable: {0}")]
    Source(String),

    /// The source was fetched but could not be decoded.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The output device rejected the track.
    #[error("Output rejected track: {0}")]
    Output(String),
}

impl ErrorCode for LoadError {
    fn code(&self) -> &'static str {
        match self {
            Self::Source(_) => "load_source_unavailable",
            Self::Decode(_) => "load_decode_failed",
            Self::Output(_) => "load_output_rejected",
        }
    }
}

/// A subscriber callback failed. Caught and logged at the trigger site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ListenerError {
    /// The handler returned an error.
    #[error("Listener failed: {0}")]
    Failed(String),

    /// The handler panicked.
    #[error("Listener panicked: {0}")]
    Panicked(String),
}

impl ErrorCode for ListenerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Failed(_) => "listener_failed",
            Self::Panicked(_) => "listener_panicked",
        }
    }
}

/// The durable key-value mirror could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ErrorCode for PersistenceError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "persistence_io",
            Self::Encoding(_) => "persistence_encoding",
        }
    }
}

/// The catalog could not resolve a reference to tracks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Album not found: {0}")]
    NotFound(String),

    #[error("Album has no tracks: {0}")]
    Empty(String),

    #[error("Catalog request failed: {0}")]
    Catalog(String),
}

impl ErrorCode for ResolveError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "album_not_found",
            Self::Empty(_) => "album_empty",
            Self::Catalog(_) => "catalog_failed",
        }
    }
}

/// Invalid engine configuration, rejected at bootstrap.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(pub String);

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        "invalid_configuration"
    }
}

/// Application-wide error type for ZoneSync.
#[derive(Debug, Error)]
pub enum ZoneSyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ErrorCode for ZoneSyncError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(e) => e.code(),
            Self::Load(e) => e.code(),
            Self::Persistence(e) => e.code(),
            Self::Resolve(e) => e.code(),
            Self::Config(e) => e.code(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result Type Aliases
// ─────────────────────────────────────────────────────────────────────────────

pub type TransportResult<T> = Result<T, TransportError>;
pub type LoadResult<T> = Result<T, LoadError>;
pub type ListenerResult = Result<(), ListenerError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Convenient Result alias for engine-wide operations.
pub type ZoneSyncResult<T> = Result<T, ZoneSyncError>;
