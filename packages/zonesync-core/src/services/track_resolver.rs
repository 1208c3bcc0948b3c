//! Album-to-tracks resolution used by the play/queue operations.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, ResolveResult};
use crate::model::{Track, TrackOrigin};

/// Reference to an album in one of the catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumRef {
    pub origin: TrackOrigin,
    pub album_id: String,
}

impl AlbumRef {
    pub fn new(origin: TrackOrigin, album_id: impl Into<String>) -> Self {
        Self {
            origin,
            album_id: album_id.into(),
        }
    }
}

impl std::fmt::Display for AlbumRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}:{}", self.origin, self.album_id)
    }
}

/// Catalog lookup feeding the controller.
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Ordered tracks of `album`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if the album is unknown, empty, or the catalog
    /// could not be reached.
    async fn album_tracks(&self, album: &AlbumRef) -> ResolveResult<Vec<Track>>;
}

/// Resolver over a fixed in-memory catalog.
#[derive(Default)]
pub struct StaticTrackResolver {
    albums: DashMap<AlbumRef, Vec<Track>>,
}

impl StaticTrackResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, album: AlbumRef, tracks: Vec<Track>) {
        self.albums.insert(album, tracks);
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }
}

#[async_trait]
impl TrackResolver for StaticTrackResolver {
    async fn album_tracks(&self, album: &AlbumRef) -> ResolveResult<Vec<Track>> {
        let tracks = self
            .albums
            .get(album)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ResolveError::NotFound(album.to_string()))?;
        if tracks.is_empty() {
            return Err(ResolveError::Empty(album.to_string()));
        }
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::tracks;

    #[tokio::test]
    async fn resolves_known_album() {
        let resolver = StaticTrackResolver::new();
        let album = AlbumRef::new(TrackOrigin::Library, "a1");
        resolver.insert(album.clone(), tracks(4));

        let resolved = resolver.album_tracks(&album).await.unwrap();

        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved[0].id, 1);
    }

    #[tokio::test]
    async fn origin_is_part_of_the_key() {
        let resolver = StaticTrackResolver::new();
        resolver.insert(AlbumRef::new(TrackOrigin::Library, "a1"), tracks(2));

        let err = resolver
            .album_tracks(&AlbumRef::new(TrackOrigin::Tidal, "a1"))
            .await
            .unwrap_err();

        assert_eq!(err, ResolveError::NotFound("Tidal:a1".into()));
    }

    #[tokio::test]
    async fn empty_album_is_an_error() {
        let resolver = StaticTrackResolver::new();
        let album = AlbumRef::new(TrackOrigin::Qobuz, "empty");
        resolver.insert(album.clone(), vec![]);

        let err = resolver.album_tracks(&album).await.unwrap_err();

        assert!(matches!(err, ResolveError::Empty(_)));
    }
}
