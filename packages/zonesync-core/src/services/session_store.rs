//! Canonical mirror of zones, sessions and the client playback state.
//!
//! Every mutation goes through [`SessionStore::transition`], which:
//! 1. runs the mutation under the write lock,
//! 2. diffs [`ClientState`] before/after and writes changed keys through to
//!    persistence (still under the lock, so writes land in mutation order),
//! 3. releases the lock and notifies subscribers and the event emitter.
//!
//! Subscribers may therefore read the store from inside a handler.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{EventEmitter, Listeners, SessionEvent, Subscription};
use crate::error::ListenerResult;
use crate::model::{
    AudioZone, PlaybackQuality, Session, SessionId, SessionUpdate, Track, ZoneId,
};
use crate::persistence::ClientStatePersistence;
use crate::state::ClientState;

#[derive(Default)]
struct StoreState {
    zones: Vec<AudioZone>,
    sessions: Vec<Session>,
    client: ClientState,
}

impl StoreState {
    fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == id)
    }

    fn current_session(&self) -> Option<&Session> {
        self.client.current_session_id.and_then(|id| self.session(id))
    }

    /// Inserts or replaces the mirror for `session`.
    fn upsert(&mut self, session: Session) {
        match self
            .sessions
            .iter_mut()
            .find(|s| s.session_id == session.session_id)
        {
            Some(existing) => *existing = session,
            None => self.sessions.push(session),
        }
    }

    /// Makes `session` current and copies its playback fields into the client
    /// mirror. Returns the `SessionChanged` event if anything changed.
    fn make_current(
        &mut self,
        session: &Session,
        previous: Option<Session>,
    ) -> Option<SessionEvent> {
        let same_id = self.client.current_session_id == Some(session.session_id);
        if same_id && previous.as_ref() == Some(session) {
            return None;
        }
        self.client.current_session_id = Some(session.session_id);
        mirror_session(&mut self.client, session);
        Some(SessionEvent::SessionChanged {
            current: Some(Box::new(session.clone())),
            previous: previous.map(Box::new),
        })
    }
}

fn mirror_session(client: &mut ClientState, session: &Session) {
    client.playlist = session.playlist.tracks.clone();
    client.position = if client.playlist.is_empty() {
        None
    } else {
        session.position
    };
    if session.seek.is_some() {
        client.current_seek = session.seek;
    }
    if session.audio_zone_id.is_some() {
        client.current_audio_zone_id = session.audio_zone_id;
    }
    client.derive_current_track();
}

fn mirror_partial(client: &mut ClientState, update: &SessionUpdate) {
    if let Some(ref playlist) = update.playlist {
        client.playlist = playlist.tracks.clone();
    }
    if let Some(position) = update.position {
        client.position = Some(position);
    }
    if let Some(seek) = update.seek {
        client.current_seek = Some(seek);
    }
    if let Some(zone_id) = update.audio_zone_id {
        client.current_audio_zone_id = Some(zone_id);
    }
    if update.touches_playlist() {
        client.derive_current_track();
    }
}

/// Field-level change events between two client states.
fn client_events(before: &ClientState, after: &ClientState) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    if before.current_seek != after.current_seek {
        events.push(SessionEvent::SeekChanged {
            value: after.current_seek,
            old: before.current_seek,
        });
    }
    if before.current_track_length != after.current_track_length {
        events.push(SessionEvent::TrackLengthChanged {
            value: after.current_track_length,
            old: before.current_track_length,
        });
    }
    if before.position != after.position {
        events.push(SessionEvent::PositionChanged {
            value: after.position,
            old: before.position,
        });
    }
    if before.playlist != after.playlist {
        events.push(SessionEvent::PlaylistChanged {
            tracks: after.playlist.clone(),
        });
    }
    if before.current_audio_zone_id != after.current_audio_zone_id {
        events.push(SessionEvent::AudioZoneChanged {
            value: after.current_audio_zone_id,
            old: before.current_audio_zone_id,
        });
    }
    if before.quality != after.quality {
        events.push(SessionEvent::QualityChanged {
            value: after.quality,
            old: before.quality,
        });
    }
    events
}

/// The single process-wide zone/session state store.
pub struct SessionStore {
    state: RwLock<StoreState>,
    persistence: ClientStatePersistence,
    listeners: Listeners<SessionEvent>,
    emitter: Arc<dyn EventEmitter>,
}

impl SessionStore {
    /// Creates the store, loading the client state from persistence once.
    pub fn new(persistence: ClientStatePersistence, emitter: Arc<dyn EventEmitter>) -> Self {
        let client = persistence.load();
        Self {
            state: RwLock::new(StoreState {
                client,
                ..Default::default()
            }),
            persistence,
            listeners: Listeners::new("SessionStore"),
            emitter,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    /// Subscribes to every store change. Handlers run synchronously after the
    /// mutation, outside the store lock.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.listeners.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.listeners.unsubscribe(subscription)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    pub fn client_state(&self) -> ClientState {
        self.state.read().client.clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.read().current_session().cloned()
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.state.read().client.current_session_id
    }

    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.state.read().session(id).cloned()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state.read().sessions.clone()
    }

    pub fn zones(&self) -> Vec<AudioZone> {
        self.state.read().zones.clone()
    }

    pub fn zone(&self, id: ZoneId) -> Option<AudioZone> {
        self.state.read().zones.iter().find(|z| z.id == id).cloned()
    }

    pub fn current_audio_zone_id(&self) -> Option<ZoneId> {
        self.state.read().client.current_audio_zone_id
    }

    pub fn current_zone(&self) -> Option<AudioZone> {
        let state = self.state.read();
        let id = state.client.current_audio_zone_id?;
        state.zones.iter().find(|z| z.id == id).cloned()
    }

    pub fn current_track(&self) -> Option<Track> {
        self.state.read().client.current_track.clone()
    }

    pub fn current_seek(&self) -> Option<f64> {
        self.state.read().client.current_seek
    }

    /// Seek clamped to the current track length.
    pub fn displayed_seek(&self) -> f64 {
        self.state.read().client.displayed_seek()
    }

    pub fn quality(&self) -> PlaybackQuality {
        self.state.read().client.quality
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Replaces the mirror of `session` (inserting it on first sight).
    ///
    /// When `make_current` is set, or the session already is the current one,
    /// the client mirror is re-derived and `SessionChanged` fires with the
    /// new and previous session. An identical repeat fires nothing.
    pub fn apply_snapshot(&self, session: Session, make_current: bool) -> bool {
        self.transition(|state| {
            let is_current =
                make_current || state.client.current_session_id == Some(session.session_id);
            let previous = state.current_session().cloned();
            let mirror_changed = state.session(session.session_id) != Some(&session);

            state.upsert(session.clone());

            let mut events = Vec::new();
            if is_current {
                events.extend(state.make_current(&session, previous));
            }
            (mirror_changed || !events.is_empty(), events)
        })
    }

    /// Merges the present fields of `update` into the matching mirror.
    ///
    /// Returns false if the session is not mirrored. The current track is
    /// re-derived only when the playlist or the position was part of the
    /// update.
    pub fn apply_partial(&self, update: &SessionUpdate) -> bool {
        self.transition(|state| {
            let Some(session) = state
                .sessions
                .iter_mut()
                .find(|s| s.session_id == update.session_id)
            else {
                log::debug!(
                    "[SessionStore] Ignoring partial for unknown session {}",
                    update.session_id
                );
                return (false, Vec::new());
            };
            update.merge_into(session);

            if state.client.current_session_id == Some(update.session_id) {
                mirror_partial(&mut state.client, update);
            }
            (
                true,
                vec![SessionEvent::PartialApplied {
                    update: Box::new(update.clone()),
                }],
            )
        })
    }

    /// Refreshes the session list wholesale.
    ///
    /// Mirrors absent from `sessions` are discarded. An existing current
    /// session is re-applied from the list, or cleared if it is gone. With no
    /// current session, the persisted session id is selected if listed,
    /// otherwise the first session.
    pub fn replace_sessions(&self, sessions: Vec<Session>) {
        self.transition(|state| {
            let previous = state.current_session().cloned();
            let selected_id = match previous {
                Some(ref current) => sessions
                    .iter()
                    .any(|s| s.session_id == current.session_id)
                    .then_some(current.session_id),
                None => state
                    .client
                    .current_session_id
                    .filter(|id| sessions.iter().any(|s| s.session_id == *id))
                    .or_else(|| sessions.first().map(|s| s.session_id)),
            };

            let session_ids = sessions.iter().map(|s| s.session_id).collect();
            state.sessions = sessions;

            let mut events = vec![SessionEvent::SessionsReplaced { session_ids }];
            match selected_id.and_then(|id| state.session(id).cloned()) {
                Some(selected) => events.extend(state.make_current(&selected, previous)),
                None if previous.is_some() => {
                    state.client.current_session_id = None;
                    events.push(SessionEvent::SessionChanged {
                        current: None,
                        previous: previous.map(Box::new),
                    });
                }
                None => {}
            }
            ((), events)
        });
    }

    /// Refreshes the zone list wholesale, keeping the selected zone if it is
    /// still listed and otherwise selecting the first one.
    pub fn replace_zones(&self, zones: Vec<AudioZone>) {
        self.transition(|state| {
            let keep = state
                .client
                .current_audio_zone_id
                .filter(|id| zones.iter().any(|z| z.id == *id));
            state.client.current_audio_zone_id = keep.or_else(|| zones.first().map(|z| z.id));

            let zone_ids = zones.iter().map(|z| z.id).collect();
            state.zones = zones;
            ((), vec![SessionEvent::ZonesReplaced { zone_ids }])
        });
    }

    /// Publishes a seek observed locally (heartbeat or manual seek).
    pub fn set_current_seek(&self, seek: Option<f64>) {
        self.transition(|state| {
            state.client.current_seek = seek;
            ((), Vec::new())
        });
    }

    /// Records the duration reported by a loaded output.
    pub fn set_current_track_length(&self, length: f64) {
        self.transition(|state| {
            state.client.current_track_length = if length.is_finite() {
                length.max(0.0)
            } else {
                0.0
            };
            ((), Vec::new())
        });
    }

    pub fn set_quality(&self, quality: PlaybackQuality) {
        self.transition(|state| {
            state.client.quality = quality;
            ((), Vec::new())
        });
    }

    /// Selects the zone this client controls.
    pub fn select_zone(&self, zone_id: Option<ZoneId>) {
        self.transition(|state| {
            state.client.current_audio_zone_id = zone_id;
            ((), Vec::new())
        });
    }

    /// Selects the current session.
    ///
    /// A mirrored session becomes current immediately; an unknown id is
    /// recorded and picked up when its snapshot or the session list arrives.
    pub fn select_session(&self, session_id: SessionId) {
        self.transition(|state| {
            let previous = state.current_session().cloned();
            let events = match state.session(session_id).cloned() {
                Some(session) => state.make_current(&session, previous).into_iter().collect(),
                None => {
                    state.client.current_session_id = Some(session_id);
                    Vec::new()
                }
            };
            ((), events)
        });
    }

    /// Runs one mutation and publishes its consequences.
    fn transition<R>(&self, mutate: impl FnOnce(&mut StoreState) -> (R, Vec<SessionEvent>)) -> R {
        let (result, events) = {
            let mut state = self.state.write();
            let before = state.client.clone();
            let (result, mut events) = mutate(&mut *state);
            self.persistence.write_changes(&before, &state.client);
            events.extend(client_events(&before, &state.client));
            (result, events)
        };

        for event in events {
            self.listeners.trigger(&event);
            self.emitter.emit_session(event);
        }
        result
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::events::NoopEventEmitter;
    use crate::persistence::MemoryStore;

    /// Store backed by memory with no emitter.
    pub fn memory_store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(
            ClientStatePersistence::new(Arc::new(MemoryStore::new())),
            Arc::new(NoopEventEmitter),
        ))
    }
}
