//! Vehicle state and the single-cell movement rule

use std::collections::VecDeque;

use super::grid::OccupancyGrid;
use super::types::{CarId, GridPos, Heading};

/// Outcome of one movement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveResult {
    Moved,
    Blocked,
}

/// A vehicle in the simulation
#[derive(Debug, Clone)]
pub struct SimCar {
    pub id: CarId,
    /// Pending port choices, one per crossroad still to pass
    pub route: VecDeque<usize>,
    pub position: GridPos,
    pub heading: Heading,
    /// Optional destination tag carried for analysis
    pub destination: Option<usize>,
    /// Consecutive blocked move attempts
    pub stuck: u32,
    /// Successful moves over the vehicle's lifetime
    pub moves: u64,
    /// Accepted hand-offs between segments
    pub handoffs: u32,
    /// Set once the vehicle has left the network
    pub retired: bool,
}

impl SimCar {
    pub fn new(id: CarId, route: Vec<usize>, destination: Option<usize>) -> Self {
        Self {
            id,
            route: route.into(),
            position: GridPos::default(),
            heading: Heading::Stay,
            destination,
            stuck: 0,
            moves: 0,
            handoffs: 0,
            retired: false,
        }
    }

    /// Peek at the next port choice
    pub fn next_destination(&self) -> Option<usize> {
        self.route.front().copied()
    }

    /// Pop the next port choice
    pub fn next_point_on_route(&mut self) -> Option<usize> {
        self.route.pop_front()
    }

    /// Put a popped choice back at the head of the route
    pub fn requeue(&mut self, point: usize) {
        self.route.push_front(point);
    }

    pub fn set_route(&mut self, route: Vec<usize>) {
        self.route = route.into();
    }

    /// Places the vehicle on an entry cell with a new heading
    pub fn enter(&mut self, position: GridPos, heading: Heading) {
        self.position = position;
        self.heading = heading;
        self.handoffs += 1;
    }

    /// Try to advance one cell along the current heading
    ///
    /// The destination must be empty in both buffers of `grid`; an
    /// out-of-bounds destination counts as blocked.
    pub fn try_move(&mut self, grid: &mut OccupancyGrid) -> MoveResult {
        let target = self.position.offset(self.heading);
        if target == self.position || !grid.is_empty(target) {
            self.stuck += 1;
            return MoveResult::Blocked;
        }

        grid.stage(self.position, 0);
        grid.stage(target, self.id.cell_value());
        self.position = target;
        self.stuck = 0;
        self.moves += 1;
        MoveResult::Moved
    }
}
