//! Inbound event handlers.
//!
//! Each handler resolves the target session, runs one state-machine
//! operation under the session lock, then turns the result into replies and
//! room broadcasts through the [`Gateway`]. Errors are only ever replied to
//! the requesting connection.

use std::sync::Arc;

use duel_core::session::{Role, RoundAdvance};
use duel_core::{ConnectionId, RegistryError, RoomCode, SessionError, SessionRegistry};

use crate::gateway::Gateway;
use crate::protocol::{
    self, CreateRoom, JoinRoom, PlayerChoice, PlayerNamed, ProtocolError, RoomAck, RoomNamed, RoomRef,
    ServerEvent,
};

/// Validation bounds for client-supplied values.
#[derive(Clone, Debug)]
pub struct Limits {
    pub max_rounds: u32,
    pub max_name_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_rounds: 99,
            max_name_len: 32,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RouterError {
    /// Room-level failures go out as `roomError`, frame-level ones as `error`.
    fn to_event(&self) -> ServerEvent {
        match self {
            Self::Protocol(e) => ServerEvent::error(e.code(), e.to_string()),
            Self::Session(e) => ServerEvent::room_error(e.code(), e.to_string()),
            Self::Registry(e) => ServerEvent::room_error(e.code(), e.to_string()),
        }
    }
}

pub struct Router {
    sessions: Arc<SessionRegistry>,
    gateway: Arc<dyn Gateway>,
    limits: Limits,
}

impl Router {
    pub fn new(sessions: Arc<SessionRegistry>, gateway: Arc<dyn Gateway>, limits: Limits) -> Self {
        Self {
            sessions,
            gateway,
            limits,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Decode and dispatch one raw frame, replying with an error on failure.
    pub fn handle_frame(&self, conn: &ConnectionId, raw: &str) {
        let result = protocol::parse_frame(raw)
            .map_err(RouterError::from)
            .and_then(|frame| self.dispatch(conn, &frame.event, frame.data));

        if let Err(e) = result {
            tracing::debug!(conn_id = %conn, error = %e, "Rejected client event");
            self.gateway.send_to(conn, &e.to_event());
        }
    }

    /// Route an event name to its handler.
    pub fn dispatch(&self, conn: &ConnectionId, event: &str, data: serde_json::Value) -> Result<(), RouterError> {
        match event {
            "createRoom" => self.create_room(conn, protocol::decode(event, data)?),
            "joinRoom" => self.join_room(conn, protocol::decode(event, data)?),
            "playerChoice" => self.player_choice(conn, protocol::decode(event, data)?),
            "startFirstRound" => self.start_first_round(conn, protocol::decode(event, data)?),
            "nextRound" => self.next_round(conn, protocol::decode(event, data)?),
            "leaveRoom" => self.leave_room(conn, protocol::decode(event, data)?),
            _ => Err(ProtocolError::UnknownEvent(event.to_string()).into()),
        }
    }

    fn player_name(&self, event: &str, raw: &str) -> Result<String, RouterError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ProtocolError::invalid(event, "playerName must not be empty").into());
        }
        if name.chars().count() > self.limits.max_name_len {
            return Err(ProtocolError::invalid(
                event,
                format!("playerName longer than {} characters", self.limits.max_name_len),
            )
            .into());
        }
        Ok(name.to_string())
    }

    fn create_room(&self, conn: &ConnectionId, req: CreateRoom) -> Result<(), RouterError> {
        let name = self.player_name("createRoom", &req.player_name)?;
        if req.total_rounds == 0 || req.total_rounds > self.limits.max_rounds {
            return Err(ProtocolError::invalid(
                "createRoom",
                format!("totalRounds must be between 1 and {}", self.limits.max_rounds),
            )
            .into());
        }

        let (code, _) = self.sessions.create(req.total_rounds, name.clone(), conn.clone())?;
        self.gateway.join_group(conn, &code);
        self.gateway.send_to(
            conn,
            &ServerEvent::RoomCreated(RoomAck {
                room_code: code.clone(),
                player_role: Role::Player,
            }),
        );
        tracing::info!(room_code = %code, player = %name, total_rounds = req.total_rounds, "Room created");
        Ok(())
    }

    fn join_room(&self, conn: &ConnectionId, req: JoinRoom) -> Result<(), RouterError> {
        let name = self.player_name("joinRoom", &req.player_name)?;
        let code = req.room_code;
        let session = self.sessions.get(&code)?;

        if req.is_spectator {
            let snapshot = session.lock().join_as_spectator(name.clone(), conn.clone())?;
            self.gateway.join_group(conn, &code);
            self.gateway.send_to(
                conn,
                &ServerEvent::RoomJoined(RoomAck {
                    room_code: code.clone(),
                    player_role: Role::Spectator,
                }),
            );
            self.gateway.send_to(conn, &ServerEvent::GameState(snapshot));
            tracing::info!(room_code = %code, spectator = %name, "Spectator joined");
            return Ok(());
        }

        let join = session.lock().join_as_player(name, conn.clone())?;
        self.gateway.join_group(conn, &code);
        self.gateway.send_to(
            conn,
            &ServerEvent::RoomJoined(RoomAck {
                room_code: code.clone(),
                player_role: Role::Player,
            }),
        );
        self.gateway.broadcast_to_room(
            &code,
            &ServerEvent::PlayerJoined(PlayerNamed {
                player_name: join.name.clone(),
            }),
        );
        tracing::info!(room_code = %code, player = %join.name, "Player joined");

        if let Some(start) = join.game_start {
            self.gateway.broadcast_to_room(&code, &ServerEvent::GameStart(start));
            tracing::info!(room_code = %code, "Game started");
        }
        Ok(())
    }

    fn player_choice(&self, conn: &ConnectionId, req: PlayerChoice) -> Result<(), RouterError> {
        // A stale client may still reference a room that is gone.
        let Ok(session) = self.sessions.get(&req.room_code) else {
            tracing::debug!(room_code = %req.room_code, conn_id = %conn, "Choice for unknown room ignored");
            return Ok(());
        };

        let result = session.lock().submit_choice(conn, req.choice);
        if let Some(result) = result {
            tracing::info!(
                room_code = %req.room_code,
                round = result.current_round,
                "Round resolved"
            );
            self.gateway
                .broadcast_to_room(&req.room_code, &ServerEvent::RoundResult(result));
        }
        Ok(())
    }

    fn start_first_round(&self, conn: &ConnectionId, req: RoomRef) -> Result<(), RouterError> {
        let session = self.sessions.get(&req.room_code)?;
        let (start, phase) = {
            let mut session = session.lock();
            (session.start_first_round(conn), session.phase())
        };
        match start {
            Some(start) => {
                tracing::info!(room_code = %req.room_code, round = start.current_round, "Round opened");
                self.gateway
                    .broadcast_to_room(&req.room_code, &ServerEvent::NewRound(start));
            }
            None => {
                tracing::debug!(room_code = %req.room_code, conn_id = %conn, phase = ?phase, "startFirstRound ignored");
            }
        }
        Ok(())
    }

    fn next_round(&self, conn: &ConnectionId, req: RoomRef) -> Result<(), RouterError> {
        let session = self.sessions.get(&req.room_code)?;
        let (advance, phase) = {
            let mut session = session.lock();
            (session.advance_round(conn), session.phase())
        };
        match advance {
            Some(RoundAdvance::NewRound(start)) => {
                tracing::info!(room_code = %req.room_code, round = start.current_round, "Round opened");
                self.gateway
                    .broadcast_to_room(&req.room_code, &ServerEvent::NewRound(start));
            }
            Some(RoundAdvance::GameOver(over)) => {
                tracing::info!(room_code = %req.room_code, "Game over");
                self.gateway
                    .broadcast_to_room(&req.room_code, &ServerEvent::GameOver(over));
            }
            None => {
                tracing::debug!(room_code = %req.room_code, conn_id = %conn, phase = ?phase, "nextRound ignored");
            }
        }
        Ok(())
    }

    fn leave_room(&self, conn: &ConnectionId, req: RoomRef) -> Result<(), RouterError> {
        let code = req.room_code;
        let departure = match self.sessions.leave(&code, conn) {
            Ok(departure) => departure,
            Err(SessionError::RoomNotFound) => None,
            Err(e) => return Err(e.into()),
        };

        self.gateway.leave_group(conn, &code);
        if let Some(departure) = departure {
            tracing::info!(room_code = %code, name = %departure.name, role = ?departure.role, "Left room");
            self.announce_departure(&code, departure.role, departure.name, departure.session_empty);
        }
        self.gateway.send_to(
            conn,
            &ServerEvent::LeftRoom(RoomNamed { room_code: code }),
        );
        Ok(())
    }

    /// Remove a vanished connection from every session it appears in.
    pub fn handle_disconnect(&self, conn: &ConnectionId) {
        for (code, departure) in self.sessions.handle_disconnect(conn) {
            tracing::info!(room_code = %code, name = %departure.name, role = ?departure.role, "Disconnected from room");
            self.announce_departure(&code, departure.role, departure.name, departure.session_empty);
        }
        self.gateway.leave_all_groups(conn);
    }

    fn announce_departure(&self, code: &RoomCode, role: Role, name: String, session_empty: bool) {
        if role == Role::Player && !session_empty {
            self.gateway.broadcast_to_room(
                code,
                &ServerEvent::PlayerLeft(PlayerNamed { player_name: name }),
            );
        }
    }
}
