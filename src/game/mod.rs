//! Pure game model: board, win rules and the per-match state machine.

pub mod board;
pub mod rules;
pub mod session;

pub use board::{Board, Seat, BOARD_CELLS, BOARD_SIZE};
pub use rules::{detect_winner, evaluate, Verdict};
pub use session::{
    GameOutcome, GameSession, LastMove, MoveOutcome, PendingRequest, SessionError,
};
