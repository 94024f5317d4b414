//! Per-match state and its legal transitions.
//!
//! Every transition validates first and mutates only on success, so a
//! rejected message leaves the session exactly as it was. Callers decide
//! what, if anything, to tell the players.

use std::time::Instant;

use crate::util::id::{GameId, PlayerId};

use super::board::{Board, Seat};
use super::rules::{evaluate, Verdict};

/// The most recently applied move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastMove {
    pub index: usize,
    pub seat: Seat,
}

/// An outstanding two-phase negotiation. A session holds at most one at a
/// time; a request of any kind is refused while another is unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRequest {
    Undo { from: PlayerId },
    YieldTurn { from: PlayerId },
    PlayAgain { from: PlayerId },
}

impl PendingRequest {
    pub fn requester(&self) -> PlayerId {
        match *self {
            PendingRequest::Undo { from }
            | PendingRequest::YieldTurn { from }
            | PendingRequest::PlayAgain { from } => from,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            PendingRequest::Undo { .. } => "undo",
            PendingRequest::YieldTurn { .. } => "yield_turn",
            PendingRequest::PlayAgain { .. } => "play_again",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    Winner(PlayerId),
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Continue { next_turn: PlayerId },
    Finished(GameOutcome),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("sender is not a player in this game")]
    NotAPlayer,
    #[error("game is already over")]
    GameOver,
    #[error("game is not over yet")]
    GameNotOver,
    #[error("not the sender's turn")]
    NotYourTurn,
    #[error("cell {0} is off the board")]
    CellOutOfRange(usize),
    #[error("cell {0} is already occupied")]
    CellOccupied(usize),
    #[error("there is no move to undo")]
    NoMoveToUndo,
    #[error("only the player who made the last move may undo it")]
    NotLastMover,
    #[error("a move has already been made this turn")]
    MoveAlreadyMade,
    #[error("a {0} request is already pending")]
    RequestPending(&'static str),
    #[error("no matching request is pending")]
    NoPendingRequest,
    #[error("a player cannot answer their own request")]
    OwnRequest,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    id: GameId,
    players: [PlayerId; 2],
    board: Board,
    turn: PlayerId,
    is_over: bool,
    last_move: Option<LastMove>,
    disconnected_player: Option<PlayerId>,
    pending: Option<PendingRequest>,
    block_win_if_two_ends: bool,
    last_activity: Instant,
}

impl GameSession {
    /// Starts a match; the inviter takes seat 0 and moves first.
    pub fn new(id: GameId, inviter: PlayerId, accepter: PlayerId, block_win_if_two_ends: bool) -> Self {
        Self {
            id,
            players: [inviter, accepter],
            board: Board::empty(),
            turn: inviter,
            is_over: false,
            last_move: None,
            disconnected_player: None,
            pending: None,
            block_win_if_two_ends,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn players(&self) -> [PlayerId; 2] {
        self.players
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> PlayerId {
        self.turn
    }

    pub fn is_over(&self) -> bool {
        self.is_over
    }

    pub fn last_move(&self) -> Option<LastMove> {
        self.last_move
    }

    pub fn disconnected_player(&self) -> Option<PlayerId> {
        self.disconnected_player
    }

    pub fn pending(&self) -> Option<PendingRequest> {
        self.pending
    }

    pub fn block_win_if_two_ends(&self) -> bool {
        self.block_win_if_two_ends
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn has_player(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    pub fn seat_of(&self, player: PlayerId) -> Option<Seat> {
        match self.players {
            [first, _] if first == player => Some(Seat::First),
            [_, second] if second == player => Some(Seat::Second),
            _ => None,
        }
    }

    pub fn player_at(&self, seat: Seat) -> PlayerId {
        self.players[seat.index()]
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.seat_of(player).map(|seat| self.player_at(seat.other()))
    }

    pub fn is_turn_of(&self, player: PlayerId) -> bool {
        self.turn == player
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn ensure_no_pending(&self) -> Result<(), SessionError> {
        match self.pending {
            Some(req) => Err(SessionError::RequestPending(req.kind())),
            None => Ok(()),
        }
    }

    fn opponent_or_reject(&self, player: PlayerId) -> Result<PlayerId, SessionError> {
        self.opponent_of(player).ok_or(SessionError::NotAPlayer)
    }

    /// Places the sender's mark and settles the game if it is now decided.
    ///
    /// Clears any pending request; an outstanding undo or yield no longer
    /// refers to the position on the board.
    pub fn apply_move(&mut self, player: PlayerId, index: usize) -> Result<MoveOutcome, SessionError> {
        let seat = self.seat_of(player).ok_or(SessionError::NotAPlayer)?;
        if self.is_over {
            return Err(SessionError::GameOver);
        }
        if self.turn != player {
            return Err(SessionError::NotYourTurn);
        }
        if index >= super::board::BOARD_CELLS {
            return Err(SessionError::CellOutOfRange(index));
        }
        if !self.board.is_vacant(index) {
            return Err(SessionError::CellOccupied(index));
        }

        self.board.place(index, seat);
        self.last_move = Some(LastMove { index, seat });
        self.pending = None;
        self.touch();

        let outcome = match evaluate(&self.board, self.block_win_if_two_ends) {
            Verdict::Won(winner) => MoveOutcome::Finished(GameOutcome::Winner(self.player_at(winner))),
            Verdict::Draw => MoveOutcome::Finished(GameOutcome::Draw),
            Verdict::InProgress => {
                self.turn = self.player_at(seat.other());
                MoveOutcome::Continue { next_turn: self.turn }
            }
        };
        if matches!(outcome, MoveOutcome::Finished(_)) {
            self.is_over = true;
        }
        Ok(outcome)
    }

    /// Records an undo request from the author of the last move. Returns the
    /// opponent whose consent is needed.
    pub fn request_undo(&mut self, player: PlayerId) -> Result<PlayerId, SessionError> {
        let opponent = self.opponent_or_reject(player)?;
        if self.is_over {
            return Err(SessionError::GameOver);
        }
        let last = self.last_move.ok_or(SessionError::NoMoveToUndo)?;
        if self.player_at(last.seat) != player {
            return Err(SessionError::NotLastMover);
        }
        self.ensure_no_pending()?;
        self.pending = Some(PendingRequest::Undo { from: player });
        self.touch();
        Ok(opponent)
    }

    /// Settles a pending undo. Returns the requester.
    ///
    /// On acceptance the last move's cell is emptied and the turn goes back
    /// to the requester.
    pub fn respond_undo(&mut self, responder: PlayerId, accepted: bool) -> Result<PlayerId, SessionError> {
        let requester = match self.pending {
            Some(PendingRequest::Undo { from }) => from,
            _ => return Err(SessionError::NoPendingRequest),
        };
        self.ensure_responder(responder, requester)?;
        if accepted {
            let last = self.last_move.ok_or(SessionError::NoMoveToUndo)?;
            self.board.clear(last.index);
            self.turn = requester;
            self.last_move = None;
        }
        self.pending = None;
        self.touch();
        Ok(requester)
    }

    /// Records a request to hand the opening move to the opponent. Only
    /// allowed on the player's own turn while no move is on record.
    pub fn request_yield_turn(&mut self, player: PlayerId) -> Result<PlayerId, SessionError> {
        let opponent = self.opponent_or_reject(player)?;
        if self.is_over {
            return Err(SessionError::GameOver);
        }
        if self.turn != player {
            return Err(SessionError::NotYourTurn);
        }
        if self.last_move.is_some() {
            return Err(SessionError::MoveAlreadyMade);
        }
        self.ensure_no_pending()?;
        self.pending = Some(PendingRequest::YieldTurn { from: player });
        self.touch();
        Ok(opponent)
    }

    /// Settles a pending yield. Returns the requester; on acceptance the
    /// responder now holds the turn.
    pub fn respond_yield_turn(&mut self, responder: PlayerId, accepted: bool) -> Result<PlayerId, SessionError> {
        let requester = match self.pending {
            Some(PendingRequest::YieldTurn { from }) => from,
            _ => return Err(SessionError::NoPendingRequest),
        };
        self.ensure_responder(responder, requester)?;
        if accepted {
            self.turn = responder;
        }
        self.pending = None;
        self.touch();
        Ok(requester)
    }

    /// Records a rematch request on a finished game. Returns the opponent.
    pub fn request_play_again(&mut self, player: PlayerId) -> Result<PlayerId, SessionError> {
        let opponent = self.opponent_or_reject(player)?;
        if !self.is_over {
            return Err(SessionError::GameNotOver);
        }
        self.ensure_no_pending()?;
        self.pending = Some(PendingRequest::PlayAgain { from: player });
        self.touch();
        Ok(opponent)
    }

    /// Settles a pending rematch. Returns the requester.
    ///
    /// On acceptance the board is wiped and the requester moves first. On
    /// decline the session is left as is; the caller drops it.
    pub fn respond_play_again(&mut self, responder: PlayerId, accepted: bool) -> Result<PlayerId, SessionError> {
        let requester = match self.pending {
            Some(PendingRequest::PlayAgain { from }) => from,
            _ => return Err(SessionError::NoPendingRequest),
        };
        self.ensure_responder(responder, requester)?;
        if accepted {
            self.board.reset();
            self.is_over = false;
            self.turn = requester;
            self.last_move = None;
            self.disconnected_player = None;
        }
        self.pending = None;
        self.touch();
        Ok(requester)
    }

    fn ensure_responder(&self, responder: PlayerId, requester: PlayerId) -> Result<(), SessionError> {
        if !self.has_player(responder) {
            return Err(SessionError::NotAPlayer);
        }
        if responder == requester {
            return Err(SessionError::OwnRequest);
        }
        Ok(())
    }

    /// Marks a player as gone from an unfinished game. Returns the opponent.
    pub fn mark_disconnected(&mut self, player: PlayerId) -> Result<PlayerId, SessionError> {
        let opponent = self.opponent_or_reject(player)?;
        if self.is_over {
            return Err(SessionError::GameOver);
        }
        self.disconnected_player = Some(player);
        self.touch();
        Ok(opponent)
    }

    /// Rebinds a player to an unfinished game. Returns the opponent and
    /// whether the player had been marked disconnected.
    pub fn mark_reconnected(&mut self, player: PlayerId) -> Result<(PlayerId, bool), SessionError> {
        let opponent = self.opponent_or_reject(player)?;
        if self.is_over {
            return Err(SessionError::GameOver);
        }
        let was_marked = self.disconnected_player == Some(player);
        if was_marked {
            self.disconnected_player = None;
        }
        self.touch();
        Ok((opponent, was_marked))
    }
}
