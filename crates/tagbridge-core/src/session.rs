// ── Inventory session registry ──
//
// Maps caller-assigned session ids to running inventories and routes
// every inventory event onto the owning session's reply stream. All of
// the stream-continuation logic lives in `route`: interest gating,
// lifecycle transitions, and the decision whether a stop is final.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::driver::{InventoryEvent, InventoryHandle};
use crate::encode::{self, SessionEventPayload};
use crate::error::CoreError;
use crate::model::{CompletedResult, Epc};
use crate::reply::ReplySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Starting,
    Active,
    Paused,
    Stopping,
    Stopped,
}

/// Which optional event kinds the caller wants on its stream.
///
/// Start and stop events are always delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventInterest {
    pub tag_changed: bool,
    pub tag_found: bool,
    pub tag_subsequent_finds: bool,
    pub history_interval: bool,
}

impl EventInterest {
    pub const ALL: Self = Self {
        tag_changed: true,
        tag_found: true,
        tag_subsequent_finds: true,
        history_interval: true,
    };

    pub fn wants(&self, event: &InventoryEvent) -> bool {
        match event {
            InventoryEvent::Started | InventoryEvent::Stopped { .. } => true,
            InventoryEvent::TagChanged { .. } => self.tag_changed,
            InventoryEvent::TagFound { .. } => self.tag_found,
            InventoryEvent::TagSubsequentFinds { .. } => self.tag_subsequent_finds,
            InventoryEvent::HistoryInterval => self.history_interval,
        }
    }
}

/// Which tags an inventory reports.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetEpcs {
    #[default]
    All,
    Only(Vec<Epc>),
    Except(Vec<Epc>),
}

impl TargetEpcs {
    pub fn from_list(epcs: Option<Vec<Epc>>, exclude: bool) -> Self {
        match epcs {
            None => Self::All,
            Some(epcs) if exclude => Self::Except(epcs),
            Some(epcs) => Self::Only(epcs),
        }
    }

    pub fn matches(&self, epc: &Epc) -> bool {
        match self {
            Self::All => true,
            Self::Only(epcs) => epcs.contains(epc),
            Self::Except(epcs) => !epcs.contains(epc),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Session {
    id: String,
    handle: InventoryHandle,
    interest: EventInterest,
    state: SessionState,
    sink: ReplySink,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn handle(&self) -> InventoryHandle {
        self.handle
    }

    pub fn interest(&self) -> EventInterest {
        self.interest
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

/// What `route` did with an inventory event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Delivered; the stream stays open.
    Delivered,
    /// The session is not interested in this event kind.
    Filtered,
    /// No session owns the handle.
    Unknown,
    /// Final stop delivered and the session removed. The handle must now
    /// be released.
    Final(InventoryHandle),
}

// ── SessionRegistry ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_id: HashMap<String, Session>,
    by_handle: HashMap<InventoryHandle, String>,
    next_handle: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn lookup(&self, id: &str) -> Option<&Session> {
        self.by_id.get(id)
    }

    /// Register a new session in `Starting` state and allocate its handle.
    ///
    /// On a duplicate id the new sink is failed with the error and the
    /// existing session is untouched.
    pub fn start(
        &mut self,
        id: &str,
        interest: EventInterest,
        sink: ReplySink,
    ) -> Result<InventoryHandle, CoreError> {
        if self.by_id.contains_key(id) {
            let err = CoreError::DuplicateSessionId { id: id.to_owned() };
            sink.fail(&err);
            return Err(err);
        }

        self.next_handle += 1;
        let handle = InventoryHandle(self.next_handle);
        self.by_handle.insert(handle, id.to_owned());
        self.by_id.insert(
            id.to_owned(),
            Session {
                id: id.to_owned(),
                handle,
                interest,
                state: SessionState::Starting,
                sink,
            },
        );
        info!(session = id, %handle, "inventory session registered");
        Ok(handle)
    }

    fn existing(&mut self, command: &str, id: &str) -> Result<&mut Session, CoreError> {
        self.by_id
            .get_mut(id)
            .ok_or_else(|| CoreError::NoActiveSession {
                command: command.to_owned(),
                id: id.to_owned(),
            })
    }

    /// Handle of an existing session, for commands that act on it
    /// without changing its lifecycle.
    pub fn handle_for(&mut self, command: &str, id: &str) -> Result<InventoryHandle, CoreError> {
        self.existing(command, id).map(|s| s.handle)
    }

    /// Mark a session as stopping. The session stays registered until its
    /// stopped event arrives.
    pub fn begin_stop(&mut self, command: &str, id: &str) -> Result<InventoryHandle, CoreError> {
        let session = self.existing(command, id)?;
        session.state = SessionState::Stopping;
        Ok(session.handle)
    }

    pub fn pause(&mut self, command: &str, id: &str) -> Result<InventoryHandle, CoreError> {
        let session = self.existing(command, id)?;
        if matches!(session.state, SessionState::Starting | SessionState::Active) {
            session.state = SessionState::Paused;
        }
        Ok(session.handle)
    }

    pub fn resume(&mut self, command: &str, id: &str) -> Result<InventoryHandle, CoreError> {
        let session = self.existing(command, id)?;
        if session.state == SessionState::Paused {
            session.state = SessionState::Active;
        }
        Ok(session.handle)
    }

    /// Route one inventory event to the session running `handle`.
    pub fn route(&mut self, handle: InventoryHandle, event: &InventoryEvent) -> Routed {
        let Some(id) = self.by_handle.get(&handle) else {
            debug!(%handle, event = event.name(), "event for unknown inventory, dropping");
            return Routed::Unknown;
        };
        let Some(session) = self.by_id.get_mut(id) else {
            return Routed::Unknown;
        };

        if !session.interest.wants(event) {
            debug!(session = %session.id, event = event.name(), "event filtered by interest");
            return Routed::Filtered;
        }

        let payload = encode::to_payload("sessionEvent", &SessionEventPayload::from(event));

        match event {
            InventoryEvent::Started => {
                if matches!(session.state, SessionState::Starting | SessionState::Paused) {
                    session.state = SessionState::Active;
                }
            }
            InventoryEvent::Stopped { result } => {
                if is_final_stop(session.state, *result) {
                    let id = id.clone();
                    self.by_handle.remove(&handle);
                    if let Some(mut session) = self.by_id.remove(&id) {
                        session.state = SessionState::Stopped;
                        if let Some(payload) = payload {
                            session.sink.finish(payload);
                        }
                    }
                    info!(session = %id, %handle, result = result.0, "inventory session stopped");
                    return Routed::Final(handle);
                }
                if result.is_lost_connection() && session.state == SessionState::Active {
                    session.state = SessionState::Starting;
                }
                debug!(
                    session = %session.id,
                    state = ?session.state,
                    result = result.0,
                    "non-final stop, session kept"
                );
            }
            _ => {}
        }

        if let Some(payload) = payload {
            session.sink.send(payload);
        }
        Routed::Delivered
    }

    /// Remove every session, returning the handles that still need a
    /// hardware stop and release. Their streams end without a stop event.
    pub fn drain(&mut self) -> Vec<InventoryHandle> {
        self.by_handle.clear();
        self.by_id.drain().map(|(_, session)| session.handle).collect()
    }
}

/// A stop ends the session unless the session was paused or the reader
/// connection was lost.
pub fn is_final_stop(state: SessionState, result: CompletedResult) -> bool {
    state != SessionState::Paused && !result.is_lost_connection()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Tag;
    use crate::reply::{self, ReplyStream};
    use chrono::Utc;

    fn started(reg: &mut SessionRegistry, id: &str, interest: EventInterest) -> (InventoryHandle, ReplyStream) {
        let (sink, stream) = reply::channel();
        let handle = reg.start(id, interest, sink).unwrap();
        assert_eq!(reg.route(handle, &InventoryEvent::Started), Routed::Delivered);
        (handle, stream)
    }

    fn stopped(result: CompletedResult) -> InventoryEvent {
        InventoryEvent::Stopped { result }
    }

    #[test]
    fn duplicate_id_is_rejected_until_final_stop() {
        let mut reg = SessionRegistry::new();
        let (handle, _stream) = started(&mut reg, "s1", EventInterest::ALL);

        let (sink, mut dup) = reply::channel();
        assert!(matches!(
            reg.start("s1", EventInterest::ALL, sink),
            Err(CoreError::DuplicateSessionId { .. })
        ));
        assert!(dup.try_next().unwrap().is_error());

        reg.begin_stop("stopInventory", "s1").unwrap();
        assert_eq!(reg.route(handle, &stopped(CompletedResult::OK)), Routed::Final(handle));

        let (sink, _again) = reply::channel();
        assert!(reg.start("s1", EventInterest::ALL, sink).is_ok());
    }

    #[test]
    fn active_stop_is_final() {
        let mut reg = SessionRegistry::new();
        let (handle, mut stream) = started(&mut reg, "s1", EventInterest::ALL);
        assert_eq!(reg.lookup("s1").unwrap().state(), SessionState::Active);

        assert_eq!(
            reg.route(handle, &stopped(CompletedResult::OK)),
            Routed::Final(handle)
        );
        assert!(reg.lookup("s1").is_none());

        assert_eq!(stream.try_next().unwrap().callback(), Some("didStart"));
        let stop = stream.try_next().unwrap();
        assert_eq!(stop.callback(), Some("didStop"));
        assert!(!stop.keep_open);
    }

    #[test]
    fn paused_stop_keeps_session() {
        let mut reg = SessionRegistry::new();
        let (handle, mut stream) = started(&mut reg, "s1", EventInterest::ALL);
        reg.pause("pauseInventory", "s1").unwrap();

        assert_eq!(reg.route(handle, &stopped(CompletedResult::OK)), Routed::Delivered);
        let session = reg.lookup("s1").unwrap();
        assert_eq!(session.state(), SessionState::Paused);

        stream.try_next().unwrap();
        assert!(stream.try_next().unwrap().keep_open);

        reg.resume("resumeInventory", "s1").unwrap();
        assert_eq!(reg.lookup("s1").unwrap().state(), SessionState::Active);
    }

    #[test]
    fn lost_connection_stop_keeps_session() {
        let mut reg = SessionRegistry::new();
        let (handle, _stream) = started(&mut reg, "s1", EventInterest::ALL);

        assert_eq!(
            reg.route(handle, &stopped(CompletedResult::LOST_CONNECTION)),
            Routed::Delivered
        );
        assert_eq!(reg.lookup("s1").unwrap().state(), SessionState::Starting);

        reg.route(handle, &InventoryEvent::Started);
        assert_eq!(reg.lookup("s1").unwrap().state(), SessionState::Active);
    }

    #[test]
    fn stop_requested_while_paused_is_final() {
        let mut reg = SessionRegistry::new();
        let (handle, _stream) = started(&mut reg, "s1", EventInterest::ALL);
        reg.pause("pauseInventory", "s1").unwrap();
        reg.begin_stop("stopInventory", "s1").unwrap();
        assert_eq!(
            reg.route(handle, &stopped(CompletedResult::OK)),
            Routed::Final(handle)
        );
    }

    #[test]
    fn uninterested_events_are_never_delivered() {
        let mut reg = SessionRegistry::new();
        let interest = EventInterest {
            tag_changed: false,
            ..EventInterest::ALL
        };
        let (handle, mut stream) = started(&mut reg, "s1", interest);
        stream.try_next().unwrap();

        for _ in 0..5 {
            let event = InventoryEvent::TagChanged {
                tag: Tag::first_seen("a1", Utc::now()),
                first_find: true,
            };
            assert_eq!(reg.route(handle, &event), Routed::Filtered);
        }
        assert!(stream.try_next().is_none());
    }

    #[test]
    fn unknown_session_commands_name_the_command() {
        let mut reg = SessionRegistry::new();
        let err = reg.begin_stop("stopInventory", "nope").unwrap_err();
        assert_eq!(err.to_string(), "stopInventory called with no active inventory");
        assert!(reg.pause("pauseInventory", "nope").is_err());
        assert!(reg.resume("resumeInventory", "nope").is_err());
    }

    #[test]
    fn drain_empties_registry_and_ends_streams() {
        let mut reg = SessionRegistry::new();
        let (h1, mut s1) = started(&mut reg, "a", EventInterest::ALL);
        let (h2, _s2) = started(&mut reg, "b", EventInterest::ALL);

        let mut handles = reg.drain();
        handles.sort();
        assert_eq!(handles, vec![h1, h2]);
        assert!(reg.is_empty());
        assert_eq!(reg.route(h1, &InventoryEvent::HistoryInterval), Routed::Unknown);

        s1.try_next().unwrap();
        assert!(s1.try_next().is_none());
    }

    #[test]
    fn target_list_semantics() {
        let epc = Epc::from("e2");
        assert!(TargetEpcs::from_list(None, true).matches(&epc));
        assert!(TargetEpcs::from_list(Some(vec![epc.clone()]), false).matches(&epc));
        assert!(!TargetEpcs::from_list(Some(vec![epc.clone()]), true).matches(&epc));
    }
}
