//! Five-in-a-row detection with the optional double-blocked-ends restriction.

use super::board::{in_bounds, Board, Seat, BOARD_SIZE};

const RUN_TO_WIN: isize = 5;

/// East, south, south-east, south-west.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Result of looking at a board after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    InProgress,
    Won(Seat),
    Draw,
}

pub fn evaluate(board: &Board, block_win_if_two_ends: bool) -> Verdict {
    match detect_winner(board, block_win_if_two_ends) {
        Some(seat) => Verdict::Won(seat),
        None if board.is_full() => Verdict::Draw,
        None => Verdict::InProgress,
    }
}

/// Returns the owner of the first qualifying five found in row-major scan
/// order.
///
/// Every occupied cell is tried as the start of a run in each direction. A
/// run is blocked at an end only by an in-bounds opposing mark; the board
/// edge never blocks. With `block_win_if_two_ends` set, a five blocked at
/// both ends does not count and the scan moves on.
pub fn detect_winner(board: &Board, block_win_if_two_ends: bool) -> Option<Seat> {
    let size = BOARD_SIZE as isize;
    for row in 0..size {
        for col in 0..size {
            let Some(mark) = board.at(row, col) else { continue };
            for (dr, dc) in DIRECTIONS {
                if !is_five_from(board, mark, row, col, dr, dc) {
                    continue;
                }
                let opposing = Some(mark.other());
                let far_blocked = blocked(board, opposing, row + RUN_TO_WIN * dr, col + RUN_TO_WIN * dc);
                let near_blocked = blocked(board, opposing, row - dr, col - dc);
                if block_win_if_two_ends && far_blocked && near_blocked {
                    continue;
                }
                return Some(mark);
            }
        }
    }
    None
}

fn is_five_from(board: &Board, mark: Seat, row: isize, col: isize, dr: isize, dc: isize) -> bool {
    (1..RUN_TO_WIN).all(|step| board.at(row + step * dr, col + step * dc) == Some(mark))
}

fn blocked(board: &Board, opposing: Option<Seat>, row: isize, col: isize) -> bool {
    in_bounds(row, col) && board.at(row, col) == opposing
}
