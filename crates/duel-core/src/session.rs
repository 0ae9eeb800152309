//! Per-room state machine.
//!
//! A session moves `Lobby -> Waiting -> RoundOpen -> Waiting -> ... -> Finished`.
//! Every transition is a method on [`Session`] that returns the data the
//! caller needs to broadcast, or `None` when the request does not apply to
//! the current phase and must be dropped silently.

use serde::{Serialize, Serializer};

use crate::errors::SessionError;
use crate::game::{resolve, Choice, Outcome};
use crate::ids::{ConnectionId, RoomCode};

/// Competitive seats per session.
pub const MAX_PLAYERS: usize = 2;

/// A player occupying one of the two seats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub id: ConnectionId,
    pub name: String,
    pub score: u32,
    pub choice: Option<Choice>,
}

impl Participant {
    fn new(id: ConnectionId, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            choice: None,
        }
    }
}

/// An observer. Holds no game state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spectator {
    pub id: ConnectionId,
    pub name: String,
}

/// Ordered seats, at most [`MAX_PLAYERS`]. When the first player leaves the
/// second one moves up.
#[derive(Clone, Debug, Default)]
pub struct Roster {
    seats: Vec<Participant>,
}

impl Roster {
    pub fn first(&self) -> Option<&Participant> {
        self.seats.first()
    }

    pub fn second(&self) -> Option<&Participant> {
        self.seats.get(1)
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= MAX_PLAYERS
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.seats.iter()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Participant> {
        self.seats.iter().find(|p| &p.id == id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.get(id).is_some()
    }

    fn first_mut(&mut self) -> Option<&mut Participant> {
        self.seats.first_mut()
    }

    fn second_mut(&mut self) -> Option<&mut Participant> {
        self.seats.get_mut(1)
    }

    fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut Participant> {
        self.seats.iter_mut().find(|p| &p.id == id)
    }

    fn seat(&mut self, participant: Participant) -> Result<(), SessionError> {
        if self.is_full() {
            return Err(SessionError::RoomFull);
        }
        self.seats.push(participant);
        Ok(())
    }

    fn remove(&mut self, id: &ConnectionId) -> Option<Participant> {
        let idx = self.seats.iter().position(|p| &p.id == id)?;
        Some(self.seats.remove(idx))
    }

    fn both_chosen(&self) -> Option<(Choice, Choice)> {
        match (self.first()?.choice, self.second()?.choice) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    fn clear_choices(&mut self) {
        for p in &mut self.seats {
            p.choice = None;
        }
    }

    fn reset_scores(&mut self) {
        for p in &mut self.seats {
            p.score = 0;
        }
    }
}

/// Coarse lifecycle phase derived from the session flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Waiting,
    RoundOpen,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Spectator,
}

/// Public view of a player. Pending choices are never exposed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: ConnectionId,
    pub name: String,
    pub score: u32,
    pub has_chosen: bool,
}

impl From<&Participant> for PlayerView {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            score: p.score,
            has_chosen: p.choice.is_some(),
        }
    }
}

/// Everything a late observer needs to render the room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub players: Vec<PlayerView>,
    pub current_round: u32,
    pub total_rounds: u32,
    pub game_active: bool,
    pub round_active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStart {
    pub players: Vec<PlayerView>,
    pub current_round: u32,
    pub total_rounds: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerJoin {
    pub name: String,
    /// Set when this join filled the second seat.
    pub game_start: Option<GameStart>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreLine {
    pub name: String,
    pub score: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlayedMove {
    pub name: String,
    pub choice: Choice,
}

/// `"draw"` or the winning connection id on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Winner {
    Draw,
    Player(ConnectionId),
}

impl Serialize for Winner {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Winner::Draw => serializer.serialize_str("draw"),
            Winner::Player(id) => serializer.serialize_str(id.as_str()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub player1: PlayedMove,
    pub player2: PlayedMove,
    pub winner: Winner,
    pub scores: Vec<ScoreLine>,
    pub current_round: u32,
    pub total_rounds: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStart {
    pub current_round: u32,
    pub total_rounds: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameOver {
    pub scores: Vec<ScoreLine>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundAdvance {
    NewRound(RoundStart),
    GameOver(GameOver),
}

/// What a leave removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Departure {
    pub role: Role,
    pub name: String,
    /// The last player left; the session must be destroyed.
    pub session_empty: bool,
}

#[derive(Debug)]
pub struct Session {
    code: RoomCode,
    players: Roster,
    spectators: Vec<Spectator>,
    current_round: u32,
    total_rounds: u32,
    rounds_played: u32,
    game_active: bool,
    round_active: bool,
    closed: bool,
}

impl Session {
    /// A fresh lobby seated with its creator.
    pub fn new(code: RoomCode, total_rounds: u32, creator_name: String, creator: ConnectionId) -> Self {
        let mut players = Roster::default();
        players.seats.push(Participant::new(creator, creator_name));
        Self {
            code,
            players,
            spectators: Vec::new(),
            current_round: 1,
            total_rounds: total_rounds.max(1),
            rounds_played: 0,
            game_active: false,
            round_active: false,
            closed: false,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn players(&self) -> &Roster {
        &self.players
    }

    pub fn spectators(&self) -> &[Spectator] {
        &self.spectators
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn game_active(&self) -> bool {
        self.game_active
    }

    pub fn round_active(&self) -> bool {
        self.round_active
    }

    /// Emptied of players and awaiting removal from the registry.
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn phase(&self) -> Phase {
        if self.round_active {
            Phase::RoundOpen
        } else if self.game_active {
            Phase::Waiting
        } else if self.current_round > self.total_rounds {
            Phase::Finished
        } else {
            Phase::Lobby
        }
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.players.contains(id) || self.spectators.iter().any(|s| &s.id == id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            players: self.player_views(),
            current_round: self.current_round,
            total_rounds: self.total_rounds,
            game_active: self.game_active,
            round_active: self.round_active,
        }
    }

    pub fn scores(&self) -> Vec<ScoreLine> {
        self.players
            .iter()
            .map(|p| ScoreLine {
                name: p.name.clone(),
                score: p.score,
            })
            .collect()
    }

    fn player_views(&self) -> Vec<PlayerView> {
        self.players.iter().map(PlayerView::from).collect()
    }

    pub fn join_as_player(&mut self, name: String, id: ConnectionId) -> Result<PlayerJoin, SessionError> {
        if self.closed {
            return Err(SessionError::RoomNotFound);
        }
        if self.players.contains(&id) {
            return Err(SessionError::AlreadySeated);
        }
        self.players.seat(Participant::new(id, name.clone()))?;

        let game_start = if self.players.is_full() {
            // A refilled seat never replays a resolved round.
            if self.rounds_played >= self.current_round {
                self.current_round += 1;
            }
            // A rematch after a finished game starts over from round one.
            if self.current_round > self.total_rounds {
                self.current_round = 1;
                self.rounds_played = 0;
                self.players.reset_scores();
            }
            self.game_active = true;
            Some(GameStart {
                players: self.player_views(),
                current_round: self.current_round,
                total_rounds: self.total_rounds,
            })
        } else {
            None
        };

        Ok(PlayerJoin { name, game_start })
    }

    pub fn join_as_spectator(&mut self, name: String, id: ConnectionId) -> Result<SessionSnapshot, SessionError> {
        if self.closed {
            return Err(SessionError::RoomNotFound);
        }
        self.spectators.push(Spectator { id, name });
        Ok(self.snapshot())
    }

    /// Record a move. Returns the round result once both seats have chosen.
    /// Moves outside an open round or from non-players are dropped.
    pub fn submit_choice(&mut self, id: &ConnectionId, choice: Choice) -> Option<RoundResult> {
        if !self.game_active || !self.round_active {
            return None;
        }
        self.players.get_mut(id)?.choice = Some(choice);
        self.resolve_round()
    }

    /// Score the open round if both seats have a pending move.
    pub fn resolve_round(&mut self) -> Option<RoundResult> {
        if !self.round_active {
            return None;
        }
        let (first_choice, second_choice) = self.players.both_chosen()?;
        let outcome = resolve(first_choice, second_choice);

        let winner = match outcome {
            Outcome::Draw => None,
            Outcome::FirstWins => self.players.first_mut(),
            Outcome::SecondWins => self.players.second_mut(),
        }
        .map_or(Winner::Draw, |p| {
            p.score += 1;
            Winner::Player(p.id.clone())
        });

        let (first, second) = (self.players.first()?, self.players.second()?);
        let result = RoundResult {
            player1: PlayedMove {
                name: first.name.clone(),
                choice: first_choice,
            },
            player2: PlayedMove {
                name: second.name.clone(),
                choice: second_choice,
            },
            winner,
            scores: self.scores(),
            current_round: self.current_round,
            total_rounds: self.total_rounds,
        };

        self.players.clear_choices();
        self.round_active = false;
        self.rounds_played = self.current_round;
        Some(result)
    }

    /// Open the current round if it has not been played yet.
    pub fn start_first_round(&mut self, caller: &ConnectionId) -> Option<RoundStart> {
        if !self.game_active
            || self.round_active
            || !self.players.is_full()
            || !self.players.contains(caller)
            || self.rounds_played >= self.current_round
        {
            return None;
        }
        Some(self.open_round())
    }

    /// Move past a resolved round: open the next one, or finish the game
    /// when the last round has been played.
    pub fn advance_round(&mut self, caller: &ConnectionId) -> Option<RoundAdvance> {
        if !self.game_active
            || self.round_active
            || !self.players.is_full()
            || !self.players.contains(caller)
            || self.rounds_played < self.current_round
        {
            return None;
        }

        self.current_round += 1;
        if self.current_round > self.total_rounds {
            self.game_active = false;
            return Some(RoundAdvance::GameOver(GameOver { scores: self.scores() }));
        }
        Some(RoundAdvance::NewRound(self.open_round()))
    }

    fn open_round(&mut self) -> RoundStart {
        self.players.clear_choices();
        self.round_active = true;
        RoundStart {
            current_round: self.current_round,
            total_rounds: self.total_rounds,
        }
    }

    /// Remove `id` from whichever role it holds. Returns `None` when the
    /// connection is not a member.
    pub fn leave(&mut self, id: &ConnectionId) -> Option<Departure> {
        let player = self.players.remove(id);
        if player.is_some() {
            // A round cannot resolve with a single seat.
            self.round_active = false;
            self.players.clear_choices();
            if self.players.is_empty() {
                self.closed = true;
            }
        }

        let spectator = self
            .spectators
            .iter()
            .position(|s| &s.id == id)
            .map(|idx| self.spectators.remove(idx));

        match (player, spectator) {
            (Some(p), _) => Some(Departure {
                role: Role::Player,
                name: p.name,
                session_empty: self.closed,
            }),
            (None, Some(s)) => Some(Departure {
                role: Role::Spectator,
                name: s.name,
                session_empty: false,
            }),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Choice::*;

    fn alice() -> ConnectionId {
        ConnectionId::from_raw("conn_alice")
    }

    fn bob() -> ConnectionId {
        ConnectionId::from_raw("conn_bob")
    }

    fn lobby(total_rounds: u32) -> Session {
        Session::new(RoomCode::new("ABC123"), total_rounds, "Alice".into(), alice())
    }

    fn playing(total_rounds: u32) -> Session {
        let mut s = lobby(total_rounds);
        s.join_as_player("Bob".into(), bob()).unwrap();
        s
    }

    fn play(s: &mut Session, a: Choice, b: Choice) -> RoundResult {
        assert!(s.submit_choice(&alice(), a).is_none());
        s.submit_choice(&bob(), b).expect("round should resolve")
    }

    #[test]
    fn new_session_is_lobby_with_creator() {
        let s = lobby(3);
        assert_eq!(s.phase(), Phase::Lobby);
        assert_eq!(s.players().len(), 1);
        assert_eq!(s.players().first().unwrap().name, "Alice");
        assert_eq!(s.current_round(), 1);
        assert!(!s.game_active());
        assert!(!s.round_active());
    }

    #[test]
    fn second_player_starts_game_once() {
        let mut s = lobby(3);
        let join = s.join_as_player("Bob".into(), bob()).unwrap();
        let start = join.game_start.expect("game should start");
        assert_eq!(start.players.len(), 2);
        assert_eq!(start.current_round, 1);
        assert!(s.game_active());
        assert_eq!(s.phase(), Phase::Waiting);
    }

    #[test]
    fn third_player_is_rejected() {
        let mut s = playing(3);
        let err = s
            .join_as_player("Carol".into(), ConnectionId::from_raw("conn_carol"))
            .unwrap_err();
        assert_eq!(err, SessionError::RoomFull);
        assert_eq!(s.players().len(), 2);
    }

    #[test]
    fn same_connection_cannot_take_two_seats() {
        let mut s = lobby(3);
        let err = s.join_as_player("Alice again".into(), alice()).unwrap_err();
        assert_eq!(err, SessionError::AlreadySeated);
        assert!(!s.game_active());
    }

    #[test]
    fn choices_ignored_before_round_opens() {
        let mut s = playing(3);
        assert!(s.submit_choice(&alice(), Rock).is_none());
        assert!(s.players().first().unwrap().choice.is_none());
    }

    #[test]
    fn choices_from_strangers_are_ignored() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        let stranger = ConnectionId::from_raw("conn_eve");
        assert!(s.submit_choice(&stranger, Rock).is_none());
        assert!(s.round_active());
    }

    #[test]
    fn round_resolves_and_resets() {
        let mut s = playing(3);
        let start = s.start_first_round(&alice()).unwrap();
        assert_eq!(start.current_round, 1);

        let result = play(&mut s, Rock, Scissors);
        assert_eq!(result.winner, Winner::Player(alice()));
        assert_eq!(
            result.scores,
            vec![
                ScoreLine { name: "Alice".into(), score: 1 },
                ScoreLine { name: "Bob".into(), score: 0 },
            ]
        );
        assert_eq!(result.player1.choice, Rock);
        assert_eq!(result.player2.choice, Scissors);
        assert!(!s.round_active());
        assert!(s.players().iter().all(|p| p.choice.is_none()));
        assert_eq!(s.current_round(), 1);
    }

    #[test]
    fn draw_awards_nobody() {
        let mut s = playing(1);
        s.start_first_round(&bob()).unwrap();
        let result = play(&mut s, Paper, Paper);
        assert_eq!(result.winner, Winner::Draw);
        assert!(result.scores.iter().all(|l| l.score == 0));
    }

    #[test]
    fn duplicate_choice_after_resolution_is_ignored() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Paper, Rock);
        assert!(s.submit_choice(&bob(), Rock).is_none());
        assert_eq!(s.players().first().unwrap().score, 1);
        assert!(s.players().second().unwrap().choice.is_none());
    }

    #[test]
    fn changing_a_pending_choice_keeps_round_open() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        assert!(s.submit_choice(&alice(), Rock).is_none());
        assert!(s.submit_choice(&alice(), Paper).is_none());
        let result = s.submit_choice(&bob(), Rock).unwrap();
        assert_eq!(result.player1.choice, Paper);
    }

    #[test]
    fn advance_opens_next_round_before_last() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Rock, Rock);
        match s.advance_round(&alice()).unwrap() {
            RoundAdvance::NewRound(r) => assert_eq!(r.current_round, 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(s.round_active());
        assert!(s.game_active());
    }

    #[test]
    fn advance_after_last_round_ends_game() {
        let mut s = playing(1);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Scissors, Rock);
        match s.advance_round(&bob()).unwrap() {
            RoundAdvance::GameOver(over) => {
                assert_eq!(over.scores[1], ScoreLine { name: "Bob".into(), score: 1 });
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!s.game_active());
        assert!(!s.round_active());
        assert_eq!(s.current_round(), 2);
        assert_eq!(s.phase(), Phase::Finished);
        assert!(s.advance_round(&bob()).is_none());
        assert_eq!(s.current_round(), 2);
    }

    #[test]
    fn duplicate_advance_does_not_skip_rounds() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Rock, Paper);
        assert!(s.advance_round(&alice()).is_some());
        assert!(s.advance_round(&bob()).is_none());
        assert_eq!(s.current_round(), 2);
    }

    #[test]
    fn advance_requires_resolved_round() {
        let mut s = playing(3);
        assert!(s.advance_round(&alice()).is_none());
        assert_eq!(s.current_round(), 1);
    }

    #[test]
    fn start_round_guards() {
        let mut s = lobby(3);
        assert!(s.start_first_round(&alice()).is_none(), "lobby");
        s.join_as_player("Bob".into(), bob()).unwrap();
        let watcher = ConnectionId::from_raw("conn_watch");
        s.join_as_spectator("Watcher".into(), watcher.clone()).unwrap();
        assert!(s.start_first_round(&watcher).is_none(), "spectator");
        assert!(s.start_first_round(&alice()).is_some());
        assert!(s.start_first_round(&bob()).is_none(), "already open");
        play(&mut s, Rock, Scissors);
        assert!(s.start_first_round(&alice()).is_none(), "already played");
    }

    #[test]
    fn spectator_snapshot_reflects_live_state() {
        let mut s = playing(5);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Rock, Scissors);
        s.advance_round(&alice()).unwrap();
        s.submit_choice(&bob(), Paper);

        let snap = s
            .join_as_spectator("Watcher".into(), ConnectionId::from_raw("conn_watch"))
            .unwrap();
        assert_eq!(snap.current_round, 2);
        assert_eq!(snap.total_rounds, 5);
        assert!(snap.game_active);
        assert!(snap.round_active);
        assert_eq!(snap.players[0].score, 1);
        assert!(!snap.players[0].has_chosen);
        assert!(snap.players[1].has_chosen);
    }

    #[test]
    fn last_player_leaving_closes_session() {
        let mut s = lobby(3);
        let dep = s.leave(&alice()).unwrap();
        assert_eq!(dep.role, Role::Player);
        assert!(dep.session_empty);
        assert!(s.is_closed());
        assert_eq!(
            s.join_as_player("Bob".into(), bob()).unwrap_err(),
            SessionError::RoomNotFound
        );
    }

    #[test]
    fn player_leaving_mid_round_closes_round() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        s.submit_choice(&bob(), Rock);
        let dep = s.leave(&alice()).unwrap();
        assert!(!dep.session_empty);
        assert_eq!(dep.name, "Alice");
        assert!(!s.round_active());
        assert_eq!(s.players().first().unwrap().id, bob());
        assert!(s.players().first().unwrap().choice.is_none());
    }

    #[test]
    fn spectator_leaving_keeps_players() {
        let mut s = lobby(3);
        let watcher = ConnectionId::from_raw("conn_watch");
        s.join_as_spectator("Watcher".into(), watcher.clone()).unwrap();
        let dep = s.leave(&watcher).unwrap();
        assert_eq!(dep.role, Role::Spectator);
        assert!(!dep.session_empty);
        assert!(s.spectators().is_empty());
        assert_eq!(s.players().len(), 1);
    }

    #[test]
    fn leave_by_stranger_is_noop() {
        let mut s = lobby(3);
        assert!(s.leave(&ConnectionId::from_raw("conn_eve")).is_none());
        assert_eq!(s.players().len(), 1);
    }

    #[test]
    fn rejoin_after_finished_game_starts_rematch() {
        let mut s = playing(1);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Rock, Scissors);
        s.advance_round(&alice()).unwrap();
        s.leave(&bob()).unwrap();

        let carol = ConnectionId::from_raw("conn_carol");
        let join = s.join_as_player("Carol".into(), carol).unwrap();
        let start = join.game_start.unwrap();
        assert_eq!(start.current_round, 1);
        assert!(start.players.iter().all(|p| p.score == 0));
        assert!(s.game_active());
        assert!(s.start_first_round(&alice()).is_some());
    }

    #[test]
    fn refilled_seat_moves_past_resolved_round() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Rock, Scissors);
        s.leave(&bob()).unwrap();

        let carol = ConnectionId::from_raw("conn_carol");
        let start = s
            .join_as_player("Carol".into(), carol.clone())
            .unwrap()
            .game_start
            .unwrap();
        assert_eq!(start.current_round, 2);
        assert_eq!(start.players[0].score, 1);

        let opened = s.start_first_round(&carol).expect("round should open");
        assert_eq!(opened.current_round, 2);
        assert!(s.submit_choice(&alice(), Paper).is_none());
        let result = s.submit_choice(&carol, Rock).unwrap();
        assert_eq!(result.current_round, 2);
        assert_eq!(result.winner, Winner::Player(alice()));
    }

    #[test]
    fn refilled_seat_after_interrupted_round_replays_it() {
        let mut s = playing(3);
        s.start_first_round(&alice()).unwrap();
        s.submit_choice(&alice(), Rock);
        s.leave(&bob()).unwrap();

        let carol = ConnectionId::from_raw("conn_carol");
        let start = s.join_as_player("Carol".into(), carol).unwrap().game_start.unwrap();
        assert_eq!(start.current_round, 1);
        assert_eq!(s.start_first_round(&alice()).unwrap().current_round, 1);
    }

    #[test]
    fn refilled_seat_after_unannounced_last_round_starts_rematch() {
        let mut s = playing(2);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Rock, Scissors);
        s.advance_round(&alice()).unwrap();
        play(&mut s, Rock, Scissors);
        s.leave(&bob()).unwrap();

        let carol = ConnectionId::from_raw("conn_carol");
        let start = s.join_as_player("Carol".into(), carol).unwrap().game_start.unwrap();
        assert_eq!(start.current_round, 1);
        assert!(start.players.iter().all(|p| p.score == 0));
        assert!(s.start_first_round(&alice()).is_some());
    }

    #[test]
    fn lone_player_cannot_start_round() {
        let mut s = playing(3);
        s.leave(&bob()).unwrap();
        assert!(s.game_active());
        assert!(s.start_first_round(&alice()).is_none());
        assert!(!s.round_active());
    }

    #[test]
    fn lone_player_cannot_advance_or_end_game() {
        let mut s = playing(2);
        s.start_first_round(&alice()).unwrap();
        play(&mut s, Rock, Scissors);
        s.advance_round(&alice()).unwrap();
        play(&mut s, Rock, Scissors);
        // Last round resolved, game over not yet announced.
        s.leave(&bob()).unwrap();

        assert!(s.advance_round(&alice()).is_none());
        assert!(s.game_active());
        assert!(!s.round_active());
        assert_eq!(s.current_round(), 2);
    }

    #[test]
    fn winner_serializes_as_string() {
        assert_eq!(serde_json::to_string(&Winner::Draw).unwrap(), "\"draw\"");
        assert_eq!(
            serde_json::to_string(&Winner::Player(alice())).unwrap(),
            "\"conn_alice\""
        );
    }

    #[test]
    fn snapshot_uses_camel_case() {
        let json = serde_json::to_value(lobby(3).snapshot()).unwrap();
        assert_eq!(json["currentRound"], 1);
        assert_eq!(json["totalRounds"], 3);
        assert_eq!(json["gameActive"], false);
        assert_eq!(json["players"][0]["hasChosen"], false);
        assert!(json["players"][0].get("choice").is_none());
    }
}
