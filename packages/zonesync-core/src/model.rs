//! Domain types shared by the store, the reconciler and the player adapters.
//!
//! Partial records ([`SessionUpdate`], [`PlaybackUpdate`], [`PlaybackCommand`])
//! use `Option` fields where `None` means "leave unchanged", never "reset".

use serde::{Deserialize, Serialize};

use crate::utils::round_seconds;

pub type SessionId = u64;
pub type ZoneId = u64;
pub type PlayerId = u64;
pub type TrackId = u64;

// ─────────────────────────────────────────────────────────────────────────────
// Catalog
// ─────────────────────────────────────────────────────────────────────────────

/// Encoding requested from the track endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioFormat {
    Aac,
    Flac,
    Mp3,
    Opus,
    /// Whatever the source file is encoded in.
    #[default]
    Source,
}

impl AudioFormat {
    /// Query-string value understood by the track endpoint.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aac => "AAC",
            Self::Flac => "FLAC",
            Self::Mp3 => "MP3",
            Self::Opus => "OPUS",
            Self::Source => "SOURCE",
        }
    }
}

/// Encoding/bitrate preference applied to subsequent loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackQuality {
    pub format: AudioFormat,
}

impl PlaybackQuality {
    #[must_use]
    pub fn new(format: AudioFormat) -> Self {
        Self { format }
    }
}

/// Catalog a track was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackOrigin {
    #[default]
    Library,
    Tidal,
    Qobuz,
    Yt,
}

/// Immutable catalog reference. Never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(rename = "trackId")]
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds as reported by the catalog.
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<AudioFormat>,
    #[serde(default)]
    pub origin: TrackOrigin,
}

impl Track {
    /// Duration rounded to whole seconds, `None` if the catalog value is unusable.
    #[must_use]
    pub fn rounded_duration(&self) -> Option<f64> {
        round_seconds(self.duration)
    }
}

/// Ordered track list owned by a session. Replaced wholesale, never spliced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    /// Server identity of the playlist. Survives track replacement unless a new
    /// id is supplied explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_playlist_id: Option<u64>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Playlist {
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            session_playlist_id: None,
            tracks,
        }
    }

    #[must_use]
    pub fn with_id(session_playlist_id: u64, tracks: Vec<Track>) -> Self {
        Self {
            session_playlist_id: Some(session_playlist_id),
            tracks,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Zones and Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// A player slot inside an audio zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerBinding {
    pub player_id: PlayerId,
    #[serde(default)]
    pub name: String,
}

/// Named group of players intended to play in lockstep.
///
/// The binding order is delivered by the server and is identical on every
/// client; master election relies on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioZone {
    pub id: ZoneId,
    pub name: String,
    #[serde(default)]
    pub players: Vec<PlayerBinding>,
}

impl AudioZone {
    /// Returns true if the zone has a binding for `player_id`.
    #[must_use]
    pub fn binds(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.player_id == player_id)
    }

    /// Player id of the first binding, if any.
    #[must_use]
    pub fn head(&self) -> Option<PlayerId> {
        self.players.first().map(|p| p.player_id)
    }
}

/// Server-authoritative playback session, mirrored locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub playing: bool,
    #[serde(default)]
    pub position: Option<usize>,
    #[serde(default)]
    pub seek: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub quality: Option<PlaybackQuality>,
    #[serde(default)]
    pub playlist: Playlist,
    #[serde(default)]
    pub audio_zone_id: Option<ZoneId>,
}

/// Partial session: the outbound update message and the inbound partial
/// notification share this shape.
///
/// `play` and `stop` are commands, not session fields; merging ignores them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_zone_id: Option<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seek: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<PlaybackQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playlist: Option<Playlist>,
}

impl SessionUpdate {
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            ..Default::default()
        }
    }

    /// Returns true if this update replaces the playlist or moves the position,
    /// which are the only changes that re-derive the current track.
    #[must_use]
    pub fn touches_playlist(&self) -> bool {
        self.playlist.is_some() || self.position.is_some()
    }

    /// Last-write-wins merge of the present fields into `session`.
    ///
    /// A playlist without an id keeps the session's playlist identity.
    pub fn merge_into(&self, session: &mut Session) {
        if let Some(zone_id) = self.audio_zone_id {
            session.audio_zone_id = Some(zone_id);
        }
        if let Some(ref name) = self.name {
            session.name = name.clone();
        }
        if let Some(active) = self.active {
            session.active = active;
        }
        if let Some(playing) = self.playing {
            session.playing = playing;
        }
        if let Some(position) = self.position {
            session.position = Some(position);
        }
        if let Some(seek) = self.seek {
            session.seek = Some(seek);
        }
        if let Some(volume) = self.volume {
            session.volume = Some(volume);
        }
        if let Some(quality) = self.quality {
            session.quality = Some(quality);
        }
        if let Some(ref playlist) = self.playlist {
            let id = playlist
                .session_playlist_id
                .or(session.playlist.session_playlist_id);
            session.playlist = Playlist {
                session_playlist_id: id,
                tracks: playlist.tracks.clone(),
            };
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests and Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Playback fields, in the order the reconciler and adapters evaluate them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateField {
    Play,
    Stop,
    Playing,
    Position,
    Seek,
    Volume,
    Tracks,
    Quality,
}

/// Evaluation order for building the outbound session update.
pub const SESSION_UPDATE_ORDER: [UpdateField; 8] = [
    UpdateField::Play,
    UpdateField::Stop,
    UpdateField::Playing,
    UpdateField::Position,
    UpdateField::Seek,
    UpdateField::Volume,
    UpdateField::Tracks,
    UpdateField::Quality,
];

/// Execution order inside a player adapter.
///
/// Stop first, then volume and seek so they land before a fresh load, then the
/// load itself, metadata-only fields, and finally the soft play/pause toggle.
pub const ADAPTER_ORDER: [UpdateField; 8] = [
    UpdateField::Stop,
    UpdateField::Volume,
    UpdateField::Seek,
    UpdateField::Play,
    UpdateField::Tracks,
    UpdateField::Position,
    UpdateField::Quality,
    UpdateField::Playing,
];

/// A partial change request issued by the user or by an adapter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackUpdate {
    /// Target session; the current selection when `None`.
    pub session_id: Option<SessionId>,
    /// Target zone; the current selection when `None`.
    pub audio_zone_id: Option<ZoneId>,
    pub play: Option<bool>,
    pub stop: Option<bool>,
    pub playing: Option<bool>,
    pub position: Option<usize>,
    pub seek: Option<f64>,
    pub volume: Option<f64>,
    pub tracks: Option<Vec<Track>>,
    pub quality: Option<PlaybackQuality>,
}

impl PlaybackUpdate {
    /// Returns true if no playback field is set. Routing ids do not count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.play.is_none()
            && self.stop.is_none()
            && self.playing.is_none()
            && self.position.is_none()
            && self.seek.is_none()
            && self.volume.is_none()
            && self.tracks.is_none()
            && self.quality.is_none()
    }
}

/// Adapter-facing projection of a reconciled update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackCommand {
    pub session_id: SessionId,
    pub audio_zone_id: Option<ZoneId>,
    pub play: Option<bool>,
    pub stop: Option<bool>,
    pub playing: Option<bool>,
    pub position: Option<usize>,
    pub seek: Option<f64>,
    pub volume: Option<f64>,
    pub tracks: Option<Vec<Track>>,
    pub quality: Option<PlaybackQuality>,
}

impl PlaybackCommand {
    #[must_use]
    pub fn new(session_id: SessionId, audio_zone_id: Option<ZoneId>) -> Self {
        Self {
            session_id,
            audio_zone_id,
            ..Default::default()
        }
    }

    /// Returns true if `field` is present in this command.
    #[must_use]
    pub fn has(&self, field: UpdateField) -> bool {
        match field {
            UpdateField::Play => self.play.is_some(),
            UpdateField::Stop => self.stop.is_some(),
            UpdateField::Playing => self.playing.is_some(),
            UpdateField::Position => self.position.is_some(),
            UpdateField::Seek => self.seek.is_some(),
            UpdateField::Volume => self.volume.is_some(),
            UpdateField::Tracks => self.tracks.is_some(),
            UpdateField::Quality => self.quality.is_some(),
        }
    }

    /// Present fields in [`SESSION_UPDATE_ORDER`].
    #[must_use]
    pub fn fields(&self) -> Vec<UpdateField> {
        SESSION_UPDATE_ORDER
            .into_iter()
            .filter(|f| self.has(*f))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Returns true for the `{sessionId, play, playing, seek}` shape, which an
    /// adapter holding a loaded track serves by resuming instead of reloading.
    #[must_use]
    pub fn is_warm_resume(&self) -> bool {
        self.play == Some(true)
            && self.fields() == [UpdateField::Play, UpdateField::Playing, UpdateField::Seek]
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connections
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of output a connection advertises for a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerKind {
    /// Clock-driven output without audio hardware.
    Simulated,
    /// A kind this client cannot drive.
    #[serde(other)]
    Unsupported,
}

/// A player as listed under a server connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPlayer {
    pub player_id: PlayerId,
    #[serde(rename = "type")]
    pub kind: PlayerKind,
    #[serde(default)]
    pub name: String,
}

/// The server's view of a client connection and the players it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub connection_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub players: Vec<ConnectionPlayer>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders shared by the test modules.

    use super::*;

    pub fn track(id: TrackId, duration: f64) -> Track {
        Track {
            id,
            title: format!("Track {id}"),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration,
            format: Some(AudioFormat::Flac),
            origin: TrackOrigin::Library,
        }
    }

    pub fn tracks(count: u64) -> Vec<Track> {
        (1..=count).map(|id| track(id, 180.0 + id as f64)).collect()
    }

    pub fn zone(id: ZoneId, player_ids: &[PlayerId]) -> AudioZone {
        AudioZone {
            id,
            name: format!("Zone {id}"),
            players: player_ids
                .iter()
                .map(|&player_id| PlayerBinding {
                    player_id,
                    name: format!("Player {player_id}"),
                })
                .collect(),
        }
    }

    pub fn session(session_id: SessionId, tracks: Vec<Track>, position: usize) -> Session {
        Session {
            session_id,
            name: format!("Session {session_id}"),
            active: true,
            playing: false,
            position: Some(position),
            seek: Some(0.0),
            volume: Some(1.0),
            quality: None,
            playlist: Playlist::with_id(100 + session_id, tracks),
            audio_zone_id: Some(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn merge_leaves_absent_fields_untouched() {
        let mut session = session(1, tracks(3), 1);
        let update = SessionUpdate {
            seek: Some(12.0),
            ..SessionUpdate::new(1)
        };

        update.merge_into(&mut session);

        assert_eq!(session.seek, Some(12.0));
        assert_eq!(session.position, Some(1));
        assert_eq!(session.volume, Some(1.0));
        assert_eq!(session.playlist.tracks.len(), 3);
    }

    #[test]
    fn merge_preserves_playlist_identity_without_explicit_id() {
        let mut session = session(1, tracks(3), 0);
        let update = SessionUpdate {
            playlist: Some(Playlist::new(tracks(1))),
            ..SessionUpdate::new(1)
        };

        update.merge_into(&mut session);

        assert_eq!(session.playlist.session_playlist_id, Some(101));
        assert_eq!(session.playlist.tracks.len(), 1);
    }

    #[test]
    fn merge_takes_explicit_playlist_id() {
        let mut session = session(1, tracks(3), 0);
        let update = SessionUpdate {
            playlist: Some(Playlist::with_id(7, vec![])),
            ..SessionUpdate::new(1)
        };

        update.merge_into(&mut session);

        assert_eq!(session.playlist.session_playlist_id, Some(7));
    }

    #[test]
    fn merge_ignores_play_and_stop() {
        let mut session = session(1, tracks(3), 0);
        let before = session.clone();
        let update = SessionUpdate {
            play: Some(true),
            stop: Some(true),
            ..SessionUpdate::new(1)
        };

        update.merge_into(&mut session);

        assert_eq!(session, before);
    }

    #[test]
    fn playback_update_emptiness_ignores_routing_ids() {
        let update = PlaybackUpdate {
            session_id: Some(1),
            audio_zone_id: Some(2),
            ..Default::default()
        };
        assert!(update.is_empty());

        let update = PlaybackUpdate {
            volume: Some(0.5),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }

    #[test]
    fn warm_resume_requires_exact_field_set() {
        let mut command = PlaybackCommand::new(1, Some(1));
        command.play = Some(true);
        command.playing = Some(true);
        command.seek = Some(30.0);
        assert!(command.is_warm_resume());

        command.position = Some(2);
        assert!(!command.is_warm_resume());

        let mut command = PlaybackCommand::new(1, None);
        command.play = Some(true);
        command.seek = Some(30.0);
        assert!(!command.is_warm_resume());
    }

    #[test]
    fn adapter_order_puts_stop_first_and_playing_last() {
        assert_eq!(ADAPTER_ORDER.first(), Some(&UpdateField::Stop));
        assert_eq!(ADAPTER_ORDER.last(), Some(&UpdateField::Playing));
        let play = ADAPTER_ORDER
            .iter()
            .position(|f| *f == UpdateField::Play)
            .unwrap();
        let seek = ADAPTER_ORDER
            .iter()
            .position(|f| *f == UpdateField::Seek)
            .unwrap();
        assert!(seek < play);
    }

    #[test]
    fn session_update_serializes_only_present_fields() {
        let update = SessionUpdate {
            audio_zone_id: Some(3),
            seek: Some(5.0),
            ..SessionUpdate::new(9)
        };

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["sessionId"], 9);
        assert_eq!(json["audioZoneId"], 3);
        assert_eq!(json["seek"], 5.0);
        assert!(json.get("playing").is_none());
        assert!(json.get("playlist").is_none());
    }

    #[test]
    fn connection_player_kind_falls_back_to_unsupported() {
        let json = r#"{"connectionId":"c1","name":"Kitchen","players":[
            {"playerId":4,"type":"SIMULATED","name":"Sim"},
            {"playerId":5,"type":"HOWLER","name":"Web"}]}"#;

        let connection: Connection = serde_json::from_str(json).unwrap();
        assert_eq!(connection.players[0].kind, PlayerKind::Simulated);
        assert_eq!(connection.players[1].kind, PlayerKind::Unsupported);
    }

    #[test]
    fn track_rounded_duration() {
        assert_eq!(track(1, 181.6).rounded_duration(), Some(182.0));
        assert_eq!(track(1, f64::NAN).rounded_duration(), None);
    }
}
