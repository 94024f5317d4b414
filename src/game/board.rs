//! The 25x25 grid and its wire form.

use serde::{Serialize, Serializer};

pub const BOARD_SIZE: usize = 25;
pub const BOARD_CELLS: usize = BOARD_SIZE * BOARD_SIZE;

/// Index of a player within a session's `players` pair.
///
/// Serialized as the bare number `0` or `1`, which is also the mark a board
/// cell carries when that player owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    First,
    Second,
}

impl Seat {
    pub fn index(self) -> usize {
        match self {
            Seat::First => 0,
            Seat::Second => 1,
        }
    }

    pub fn other(self) -> Seat {
        match self {
            Seat::First => Seat::Second,
            Seat::Second => Seat::First,
        }
    }
}

impl Serialize for Seat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index() as u8)
    }
}

/// Flat row-major board; `None` is an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Board {
    cells: Vec<Option<Seat>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl Board {
    pub fn empty() -> Self {
        Self { cells: vec![None; BOARD_CELLS] }
    }

    /// Mark at `index`, `None` when empty or out of range.
    pub fn get(&self, index: usize) -> Option<Seat> {
        self.cells.get(index).copied().flatten()
    }

    /// Mark at `(row, col)`; signed so callers can probe one step off the edge.
    pub fn at(&self, row: isize, col: isize) -> Option<Seat> {
        if !in_bounds(row, col) {
            return None;
        }
        self.get(row as usize * BOARD_SIZE + col as usize)
    }

    pub fn is_vacant(&self, index: usize) -> bool {
        index < BOARD_CELLS && self.cells[index].is_none()
    }

    pub fn place(&mut self, index: usize, seat: Seat) {
        self.cells[index] = Some(seat);
    }

    pub fn clear(&mut self, index: usize) {
        if let Some(cell) = self.cells.get_mut(index) {
            *cell = None;
        }
    }

    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn cells(&self) -> &[Option<Seat>] {
        &self.cells
    }
}

pub fn in_bounds(row: isize, col: isize) -> bool {
    (0..BOARD_SIZE as isize).contains(&row) && (0..BOARD_SIZE as isize).contains(&col)
}
