//! Crossroad segment
//!
//! A rectangular grid with four port groups. Rows `1..=left+right` carry the
//! horizontal lanes (left-group rows drive left, right-group rows drive
//! right); columns `1..=bottom+top` carry the vertical lanes (bottom-group
//! columns drive down, top-group columns drive up). Port indices run
//! contiguously over the groups in the order left, right, bottom, top.
//!
//! An input port enters on the wall opposite its group's name (a left-group
//! vehicle enters on the right wall and drives left); an output port leaves
//! through the wall its group is named after. The four corner cells belong
//! to no lane and are permanently blocked.

use log::{debug, warn};

use super::car::{MoveResult, SimCar};
use super::car_manager::SimContext;
use super::config::PortLayout;
use super::error::{SimError, SimResult};
use super::grid::OccupancyGrid;
use super::segment::SegmentCore;
use super::types::{CarId, GridPos, Heading};

#[derive(Debug, Clone)]
pub struct Intersection {
    pub layout: PortLayout,
    /// Randomised priority swap at the interior cells of a one-lane crossroad
    pub alternate_yield: bool,
}

impl Intersection {
    pub fn new(layout: PortLayout, alternate_yield: bool) -> Self {
        Self {
            layout,
            alternate_yield,
        }
    }

    pub fn rows(&self) -> usize {
        2 + self.layout.horizontal()
    }

    pub fn cols(&self) -> usize {
        2 + self.layout.vertical()
    }

    pub fn port_count(&self) -> usize {
        self.layout.port_count()
    }

    pub fn corners(&self) -> [GridPos; 4] {
        let (last_row, last_col) = (self.rows() as i32 - 1, self.cols() as i32 - 1);
        [
            GridPos::new(0, 0),
            GridPos::new(0, last_col),
            GridPos::new(last_row, 0),
            GridPos::new(last_row, last_col),
        ]
    }

    /// Empty grid with the corners blocked
    pub(crate) fn grid(&self, history_limit: usize) -> OccupancyGrid {
        let mut grid = OccupancyGrid::new(self.rows(), self.cols(), history_limit);
        for corner in self.corners() {
            grid.block(corner);
        }
        grid
    }

    /// Entry cell and initial heading for input `port`
    pub fn entry(&self, port: usize) -> Option<(GridPos, Heading)> {
        let l = &self.layout;
        let (last_row, last_col) = (self.rows() as i32 - 1, self.cols() as i32 - 1);
        let lane = |group: usize| (port - l.group_start(group)) as i32 + 1;
        match l.group_of(port)? {
            0 => Some((GridPos::new(port as i32 + 1, last_col), Heading::Left)),
            1 => Some((GridPos::new(port as i32 + 1, 0), Heading::Right)),
            2 => Some((GridPos::new(0, lane(2)), Heading::Down)),
            _ => Some((GridPos::new(last_row, lane(2)), Heading::Up)),
        }
    }

    /// Cell a vehicle must reach to leave through output `port`
    pub fn exit(&self, port: usize) -> Option<GridPos> {
        let l = &self.layout;
        let (last_row, last_col) = (self.rows() as i32 - 1, self.cols() as i32 - 1);
        let lane = |group: usize| (port - l.group_start(group)) as i32 + 1;
        match l.group_of(port)? {
            0 => Some(GridPos::new(port as i32 + 1, 0)),
            1 => Some(GridPos::new(port as i32 + 1, last_col)),
            2 => Some(GridPos::new(last_row, lane(2))),
            _ => Some(GridPos::new(0, lane(2))),
        }
    }

    pub(crate) fn add_car(
        &self,
        core: &mut SegmentCore,
        ctx: &mut SimContext,
        car_id: CarId,
        port: usize,
    ) -> SimResult<bool> {
        let (cell, heading) = self
            .entry(port)
            .ok_or_else(|| SimError::InvalidPort {
                segment: core.name.clone(),
                port,
                count: self.port_count(),
            })?;

        if !core.grid.is_empty(cell) {
            return Ok(false);
        }

        let car = ctx
            .cars
            .get_mut(car_id)
            .ok_or(SimError::UnknownCar(car_id))?;
        car.enter(cell, heading);
        core.admit(car_id, cell);
        Ok(true)
    }

    /// Whether `heading` would carry a vehicle at `pos` straight off the grid
    fn at_wall(&self, pos: GridPos, heading: Heading) -> bool {
        let (last_row, last_col) = (self.rows() as i32 - 1, self.cols() as i32 - 1);
        match heading {
            Heading::Left => pos.col == 0,
            Heading::Right => pos.col == last_col,
            Heading::Up => pos.row == 0,
            Heading::Down => pos.row == last_row,
            Heading::Stay => false,
        }
    }

    /// Switch heading once the vehicle is aligned with its next port's lane
    ///
    /// Returns whether the heading changed.
    fn turn_toward_route(&self, car: &mut SimCar) -> bool {
        let Some(dest) = car.next_destination() else {
            return false;
        };
        let l = &self.layout;
        let horizontal = l.horizontal();
        let vertical = l.vertical();

        let new_heading = if car.heading.is_horizontal()
            && (horizontal..horizontal + vertical).contains(&dest)
        {
            if car.position.col != (1 + dest - horizontal) as i32 {
                return false;
            }
            if dest < horizontal + l.bottom {
                Heading::Down
            } else {
                Heading::Up
            }
        } else if car.heading.is_vertical() && dest < horizontal {
            if car.position.row != (1 + dest) as i32 {
                return false;
            }
            if dest < l.left {
                Heading::Left
            } else {
                Heading::Right
            }
        } else {
            return false;
        };

        let changed = car.heading != new_heading;
        car.heading = new_heading;
        changed
    }

    /// Direction of the crossing lane at an interior cell of the one-lane shape
    ///
    /// Row 1 is the left-bound lane, row 2 the right-bound lane; column 1 is
    /// the down-bound lane, column 2 the up-bound lane.
    fn crossing_heading(pos: GridPos, current: Heading) -> Option<Heading> {
        if !(1..=2).contains(&pos.row) || !(1..=2).contains(&pos.col) {
            return None;
        }
        if current.is_horizontal() {
            Some(if pos.col == 1 { Heading::Down } else { Heading::Up })
        } else if current.is_vertical() {
            Some(if pos.row == 1 { Heading::Left } else { Heading::Right })
        } else {
            None
        }
    }

    pub(crate) fn move_cars(&self, core: &mut SegmentCore, ctx: &mut SimContext) {
        let yield_rule = self.alternate_yield && self.layout.is_single_lane();

        for car_id in core.moving_order(ctx) {
            let Some(car) = ctx.cars.get(car_id) else {
                warn!("{} in registry of '{}' has no record", car_id, core.name);
                continue;
            };
            let (position, heading, stuck) = (car.position, car.heading, car.stuck);
            if self.at_wall(position, heading) {
                continue;
            }

            let limit = ctx.reroute_after;
            let reroute = match limit {
                Some(limit) if stuck >= limit && self.port_count() > 0 => {
                    Some(ctx.random_index(self.port_count()))
                }
                _ => None,
            };
            let coin = yield_rule && ctx.random_bool(0.5);

            let Some(car) = ctx.cars.get_mut(car_id) else {
                continue;
            };

            if let Some(port) = reroute {
                car.next_point_on_route();
                car.requeue(port);
                car.stuck = 0;
                debug!("{} rerouted to port {} in '{}'", car_id, port, core.name);
            }

            let result = car.try_move(&mut core.grid);
            let turned = self.turn_toward_route(car);

            if coin && !turned && result == MoveResult::Moved {
                if let Some(heading) = Self::crossing_heading(car.position, car.heading) {
                    car.heading = heading;
                }
            }
        }
    }
}
