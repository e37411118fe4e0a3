//! Core types for the cellular traffic model
//!
//! Identifiers, headings, grid coordinates and the per-tick statistics tuple.

use std::fmt;

/// Grid cell value meaning "no vehicle here"
pub const EMPTY: u32 = 0;

/// A vehicle identity
///
/// Identities start at 1 so that any non-zero grid cell can hold one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CarId(pub u32);

impl CarId {
    /// The value written into an occupancy grid for this vehicle
    pub fn cell_value(self) -> u32 {
        self.0
    }

    /// Reads a grid cell back into an identity, `None` for an empty cell
    pub fn from_cell(value: u32) -> Option<Self> {
        if value == EMPTY {
            None
        } else {
            Some(Self(value))
        }
    }
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "car#{}", self.0)
    }
}

/// Index of a segment inside a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub usize);

/// One of the five discrete velocity vectors a vehicle can carry
///
/// The numeric codes (0..=4) follow the order stay, up, left, down, right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Heading {
    #[default]
    Stay,
    Up,
    Left,
    Down,
    Right,
}

impl Heading {
    /// (row, col) delta for one step
    pub fn delta(self) -> (i32, i32) {
        match self {
            Heading::Stay => (0, 0),
            Heading::Up => (-1, 0),
            Heading::Left => (0, -1),
            Heading::Down => (1, 0),
            Heading::Right => (0, 1),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Heading::Stay => 0,
            Heading::Up => 1,
            Heading::Left => 2,
            Heading::Down => 3,
            Heading::Right => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Heading::Stay),
            1 => Some(Heading::Up),
            2 => Some(Heading::Left),
            3 => Some(Heading::Down),
            4 => Some(Heading::Right),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Heading::Left | Heading::Right)
    }

    pub fn is_vertical(self) -> bool {
        matches!(self, Heading::Up | Heading::Down)
    }
}

/// A cell coordinate inside a segment's grid
///
/// Signed so that a step off the edge is representable and can be rejected
/// by the bounds check instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GridPos {
    pub row: i32,
    pub col: i32,
}

impl GridPos {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// The cell one step further along `heading`
    pub fn offset(self, heading: Heading) -> GridPos {
        let (dr, dc) = heading.delta();
        GridPos {
            row: self.row + dr,
            col: self.col + dc,
        }
    }
}

/// Statistics recorded by a segment at every commit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepStats {
    /// Number of drivable cells
    pub cells: usize,
    /// Vehicles owned by the segment after the commit
    pub cars: usize,
    /// Cells that changed since the previous commit, halved (one move touches two cells)
    pub moved: f32,
}

impl StepStats {
    /// Average fraction of vehicles that moved this tick
    ///
    /// A hand-out or drain counts half a move on the segment it left, so a
    /// segment that just emptied can report movement with no vehicles.
    pub fn speed(&self) -> f32 {
        if self.cars > 0 {
            self.moved / self.cars as f32
        } else {
            0.0
        }
    }
}

impl std::ops::AddAssign for StepStats {
    fn add_assign(&mut self, other: Self) {
        self.cells += other.cells;
        self.cars += other.cars;
        self.moved += other.moved;
    }
}

/// Number of port groups on a crossroad and number of lines leaving a unit
pub const DIRECTIONS: usize = 4;

/// Default number of random port choices given to a random-walk vehicle
pub const DEFAULT_ROUTE_LEN: usize = 20;
