//! Double-buffered occupancy grid
//!
//! Every write during a tick, moves and hand-offs alike, is staged into the
//! next-state buffer while the current-state buffer stays frozen; `commit`
//! promotes one into the other. A cell counts as empty only when it is free
//! in both buffers, so a cell vacated or claimed this tick cannot be reused
//! before the next commit.

use std::collections::VecDeque;

use super::types::{GridPos, EMPTY};

#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    rows: usize,
    cols: usize,
    current: Vec<u32>,
    next: Vec<u32>,
    /// Cells that can never be occupied
    blocked: Vec<bool>,
    history: VecDeque<Vec<u32>>,
    history_limit: usize,
}

impl OccupancyGrid {
    pub fn new(rows: usize, cols: usize, history_limit: usize) -> Self {
        let size = rows * cols;
        Self {
            rows,
            cols,
            current: vec![EMPTY; size],
            next: vec![EMPTY; size],
            blocked: vec![false; size],
            history: VecDeque::with_capacity(history_limit),
            history_limit,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Cells that are not permanently blocked
    pub fn drivable_cells(&self) -> usize {
        self.blocked.iter().filter(|b| !**b).count()
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        if pos.row < 0 || pos.col < 0 {
            return None;
        }
        let (row, col) = (pos.row as usize, pos.col as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(row * self.cols + col)
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.index(pos).is_some()
    }

    /// Marks a cell as permanently impassable
    pub fn block(&mut self, pos: GridPos) {
        if let Some(i) = self.index(pos) {
            self.blocked[i] = true;
        }
    }

    pub fn is_blocked(&self, pos: GridPos) -> bool {
        self.index(pos).is_some_and(|i| self.blocked[i])
    }

    /// A cell is empty when it is inside the grid, not blocked, and free in both buffers
    pub fn is_empty(&self, pos: GridPos) -> bool {
        match self.index(pos) {
            Some(i) => !self.blocked[i] && self.current[i] == EMPTY && self.next[i] == EMPTY,
            None => false,
        }
    }

    /// Staged (next-state) value of a cell
    pub fn staged(&self, pos: GridPos) -> Option<u32> {
        self.index(pos).map(|i| self.next[i])
    }

    /// Committed (current-state) value of a cell
    pub fn value(&self, pos: GridPos) -> Option<u32> {
        self.index(pos).map(|i| self.current[i])
    }

    /// Writes into the next-state buffer only
    pub fn stage(&mut self, pos: GridPos, value: u32) {
        if let Some(i) = self.index(pos) {
            self.next[i] = value;
        }
    }

    /// Promotes next-state to current-state
    ///
    /// Returns the number of cells that changed since the previous commit,
    /// hand-ins and hand-outs included.
    pub fn commit(&mut self) -> usize {
        if self.history_limit > 0 {
            if self.history.len() == self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(self.current.clone());
        }

        let changed = self
            .next
            .iter()
            .zip(&self.current)
            .filter(|(now, before)| now != before)
            .count();

        self.current.copy_from_slice(&self.next);
        changed
    }

    /// Number of cells holding a vehicle in the committed buffer
    pub fn occupied(&self) -> usize {
        self.current.iter().filter(|v| **v != EMPTY).count()
    }

    /// Whether both buffers agree, true right after a commit
    pub fn is_settled(&self) -> bool {
        self.current == self.next
    }

    /// Row-major committed cells
    pub fn cells(&self) -> &[u32] {
        &self.current
    }

    /// Up to `depth` past grids followed by the current one, oldest first
    pub fn history(&self, depth: usize) -> Vec<Vec<u32>> {
        let skip = self.history.len().saturating_sub(depth);
        self.history
            .iter()
            .skip(skip)
            .cloned()
            .chain(std::iter::once(self.current.clone()))
            .collect()
    }
}
