//! Process-wide map of live sessions.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::code::{CodeSource, RandomCodes};
use crate::errors::{RegistryError, SessionError};
use crate::ids::{ConnectionId, RoomCode};
use crate::session::{Departure, Session};

/// Candidates drawn before `create` gives up.
pub const MAX_CODE_ATTEMPTS: usize = 64;

/// A session behind its own lock. Every operation on one session is
/// serialized through this mutex.
pub type SharedSession = Arc<Mutex<Session>>;

pub struct SessionRegistry {
    sessions: DashMap<RoomCode, SharedSession>,
    codes: Box<dyn CodeSource>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_codes(RandomCodes::default())
    }

    pub fn with_codes(codes: impl CodeSource + 'static) -> Self {
        Self {
            sessions: DashMap::new(),
            codes: Box::new(codes),
        }
    }

    /// Create a lobby seated with its creator under a fresh code. An
    /// existing code is never overwritten.
    pub fn create(
        &self,
        total_rounds: u32,
        creator_name: String,
        creator: ConnectionId,
    ) -> Result<(RoomCode, SharedSession), RegistryError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = self.codes.generate();
            match self.sessions.entry(code.clone()) {
                Entry::Occupied(_) => {
                    tracing::debug!(room_code = %code, "Room code collision, regenerating");
                }
                Entry::Vacant(slot) => {
                    let session = Arc::new(Mutex::new(Session::new(
                        code.clone(),
                        total_rounds,
                        creator_name,
                        creator,
                    )));
                    slot.insert(Arc::clone(&session));
                    return Ok((code, session));
                }
            }
        }
        Err(RegistryError::CodeSpaceExhausted {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    pub fn get(&self, code: &RoomCode) -> Result<SharedSession, SessionError> {
        self.sessions
            .get(code)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SessionError::RoomNotFound)
    }

    /// No-op when absent.
    pub fn delete(&self, code: &RoomCode) {
        if self.sessions.remove(code).is_some() {
            tracing::info!(room_code = %code, "Room destroyed");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Every session where `id` is a player or spectator. Scans the whole
    /// map; membership of a single room is not assumed.
    pub fn sessions_containing(&self, id: &ConnectionId) -> Vec<(RoomCode, SharedSession)> {
        // Collect first so no shard lock is held while session locks are taken.
        let all: Vec<(RoomCode, SharedSession)> = self
            .sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        all.into_iter()
            .filter(|(_, session)| session.lock().contains(id))
            .collect()
    }

    /// Remove `id` from the session at `code`, destroying the session when
    /// its last player leaves.
    pub fn leave(&self, code: &RoomCode, id: &ConnectionId) -> Result<Option<Departure>, SessionError> {
        let session = self.get(code)?;
        Ok(self.leave_session(code, &session, id))
    }

    /// Apply `leave` to every session containing `id`.
    pub fn handle_disconnect(&self, id: &ConnectionId) -> Vec<(RoomCode, Departure)> {
        self.sessions_containing(id)
            .into_iter()
            .filter_map(|(code, session)| {
                self.leave_session(&code, &session, id)
                    .map(|departure| (code, departure))
            })
            .collect()
    }

    fn leave_session(
        &self,
        code: &RoomCode,
        session: &SharedSession,
        id: &ConnectionId,
    ) -> Option<Departure> {
        let departure = session.lock().leave(id)?;
        if departure.session_empty {
            // Only drop the entry if it is still this session.
            if self
                .sessions
                .remove_if(code, |_, current| Arc::ptr_eq(current, session))
                .is_some()
            {
                tracing::info!(room_code = %code, "Room destroyed");
            }
        }
        Some(departure)
    }
}
