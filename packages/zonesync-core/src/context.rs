//! API context for building track URLs.
//!
//! [`ApiContext`] bundles the catalog base URL and the client credentials that
//! the track endpoint expects. Credentials may be refreshed at runtime, so the
//! context is cheap to clone and shares them behind a lock.

use std::sync::Arc;

use parking_lot::RwLock;
use url::Url;

use crate::error::ConfigError;
use crate::model::{AudioFormat, PlaybackQuality, TrackId};
use crate::protocol_constants::{
    PARAM_CLIENT_ID, PARAM_FORMAT, PARAM_SIGNATURE, PARAM_TRACK_ID, TRACK_PATH,
};

/// Client identity sent with every track request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: Option<String>,
    pub signature: Option<String>,
}

/// Catalog endpoint configuration shared across adapters.
#[derive(Clone)]
pub struct ApiContext {
    api_url: Url,
    credentials: Arc<RwLock<ClientCredentials>>,
}

impl ApiContext {
    /// Creates a context for the given API base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or cannot carry a path.
    pub fn new(api_url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(api_url)
            .map_err(|e| ConfigError(format!("invalid api url '{api_url}': {e}")))?;
        if url.cannot_be_a_base() {
            return Err(ConfigError(format!(
                "api url '{api_url}' cannot be used as a base"
            )));
        }
        Ok(Self {
            api_url: url,
            credentials: Arc::new(RwLock::new(ClientCredentials::default())),
        })
    }

    /// Creates a context pointing at a local placeholder API.
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            api_url: Url::parse("http://localhost:8000").expect("static url"),
            credentials: Arc::new(RwLock::new(ClientCredentials::default())),
        }
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn set_credentials(&self, credentials: ClientCredentials) {
        *self.credentials.write() = credentials;
    }

    pub fn credentials(&self) -> ClientCredentials {
        self.credentials.read().clone()
    }

    /// Returns a builder snapshotting the current credentials.
    #[must_use]
    pub fn url_builder(&self) -> TrackUrlBuilder {
        TrackUrlBuilder {
            api_url: self.api_url.clone(),
            credentials: self.credentials(),
        }
    }

    /// Shorthand for `url_builder().track_url(..)`.
    #[must_use]
    pub fn track_url(&self, track_id: TrackId, quality: &PlaybackQuality) -> String {
        self.url_builder().track_url(track_id, quality)
    }
}

/// Builder for track endpoint URLs.
pub struct TrackUrlBuilder {
    api_url: Url,
    credentials: ClientCredentials,
}

impl TrackUrlBuilder {
    /// Returns `{api}/track?trackId=..[&clientId=..&signature=..][&format=..]`.
    ///
    /// The format parameter is omitted for [`AudioFormat::Source`].
    #[must_use]
    pub fn track_url(&self, track_id: TrackId, quality: &PlaybackQuality) -> String {
        let mut url = self.api_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(TRACK_PATH);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair(PARAM_TRACK_ID, &track_id.to_string());
            if let Some(ref client_id) = self.credentials.client_id {
                query.append_pair(PARAM_CLIENT_ID, client_id);
            }
            if let Some(ref signature) = self.credentials.signature {
                query.append_pair(PARAM_SIGNATURE, signature);
            }
            if quality.format != AudioFormat::Source {
                query.append_pair(PARAM_FORMAT, quality.format.as_str());
            }
        }
        url.into()
    }
}
