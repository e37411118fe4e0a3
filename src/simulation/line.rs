//! One-dimensional road segments
//!
//! A line is a single row of cells driven left to right: vehicles enter at
//! the beginning cell and leave from the end cell. A signaled line adds a
//! traffic light that holds vehicles on the light cell while it is red.

use log::warn;

use super::car_manager::SimContext;
use super::config::LightSchedule;
use super::error::{SimError, SimResult};
use super::segment::SegmentCore;
use super::types::{CarId, GridPos, Heading};

#[derive(Debug, Clone)]
pub struct Line {
    pub length: usize,
}

impl Line {
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    pub fn beginning(&self) -> GridPos {
        GridPos::new(0, 0)
    }

    pub fn end(&self) -> GridPos {
        GridPos::new(0, self.length as i32 - 1)
    }

    pub(crate) fn add_car(
        &self,
        core: &mut SegmentCore,
        ctx: &mut SimContext,
        car_id: CarId,
        port: usize,
    ) -> SimResult<bool> {
        core.check_input(port)?;

        let entry = self.beginning();
        if !core.grid.is_empty(entry) {
            return Ok(false);
        }

        let car = ctx
            .cars
            .get_mut(car_id)
            .ok_or(SimError::UnknownCar(car_id))?;
        car.enter(entry, Heading::Right);
        core.admit(car_id, entry);
        Ok(true)
    }

    /// Advance every vehicle one cell, except those on the end cell or on `hold`
    pub(crate) fn move_cars(
        &self,
        core: &mut SegmentCore,
        ctx: &mut SimContext,
        hold: Option<GridPos>,
    ) {
        let end = self.end();
        for car_id in core.moving_order(ctx) {
            let Some(car) = ctx.cars.get_mut(car_id) else {
                warn!("{} in registry of '{}' has no record", car_id, core.name);
                continue;
            };

            if car.position == end || Some(car.position) == hold {
                continue;
            }
            car.try_move(&mut core.grid);
        }
    }
}

/// A red/green light at a fixed cell of a line
#[derive(Debug, Clone)]
pub struct TrafficLight {
    /// Column of the cell vehicles stop on
    pub position: usize,
    pub schedule: LightSchedule,
    red: bool,
}

impl TrafficLight {
    pub fn new(position: usize, schedule: LightSchedule) -> Self {
        Self {
            position,
            red: schedule.is_red(0),
            schedule,
        }
    }

    pub fn update(&mut self, tick: u64) {
        self.red = self.schedule.is_red(tick);
    }

    pub fn is_red(&self) -> bool {
        self.red
    }

    pub fn cell(&self) -> GridPos {
        GridPos::new(0, self.position as i32)
    }
}

#[derive(Debug, Clone)]
pub struct SignaledLine {
    pub line: Line,
    pub light: TrafficLight,
}

impl SignaledLine {
    pub fn new(length: usize, light_position: usize, schedule: LightSchedule) -> SimResult<Self> {
        if light_position >= length {
            return Err(SimError::InvalidConfig(format!(
                "light at cell {} is past the end of a {}-cell line",
                light_position, length
            )));
        }
        Ok(Self {
            line: Line::new(length),
            light: TrafficLight::new(light_position, schedule),
        })
    }

    pub(crate) fn move_cars(&mut self, core: &mut SegmentCore, tick: u64, ctx: &mut SimContext) {
        self.light.update(tick);
        let hold = self.light.is_red().then(|| self.light.cell());
        self.line.move_cars(core, ctx, hold);
    }
}
