//! Shared segment lifecycle
//!
//! Every road element owns an occupancy grid, a vehicle registry and its
//! port wiring. The concrete behaviour comes from a closed set of kinds;
//! `Segment` dispatches the per-tick operations to them:
//!
//! 1. `move_cars` stages moves into the next-state buffer,
//! 2. `step` commits the tick and merges newly arrived vehicles,
//! 3. hand-offs through the output ports (driven by the network).

use super::car_manager::SimContext;
use super::error::{SimError, SimResult};
use super::grid::OccupancyGrid;
use super::intersection::Intersection;
use super::line::{Line, SignaledLine};
use super::source::Source;
use super::types::{CarId, GridPos, SegmentId, StepStats, EMPTY};

/// Which upstream segment and output port feed a local input port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPort {
    pub from: SegmentId,
    pub output: usize,
}

/// Which downstream segment and input port a local output port feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPort {
    pub to: SegmentId,
    pub input: usize,
}

/// State common to every segment kind
#[derive(Debug)]
pub struct SegmentCore {
    pub id: SegmentId,
    pub name: String,
    pub(crate) grid: OccupancyGrid,
    /// Live registry
    pub(crate) cars: Vec<CarId>,
    /// Vehicles handed over since the last commit; merged by `step`
    pub(crate) arrivals: Vec<CarId>,
    pub(crate) inputs: Vec<Option<InputPort>>,
    pub(crate) outputs: Vec<Option<OutputPort>>,
    stats: Vec<StepStats>,
}

impl SegmentCore {
    pub(crate) fn new(
        id: SegmentId,
        name: String,
        grid: OccupancyGrid,
        input_count: usize,
        output_count: usize,
    ) -> Self {
        Self {
            id,
            name,
            grid,
            cars: Vec::new(),
            arrivals: Vec::new(),
            inputs: vec![None; input_count],
            outputs: vec![None; output_count],
            stats: Vec::new(),
        }
    }

    pub(crate) fn check_input(&self, port: usize) -> SimResult<()> {
        if port < self.inputs.len() {
            Ok(())
        } else {
            Err(SimError::InvalidPort {
                segment: self.name.clone(),
                port,
                count: self.inputs.len(),
            })
        }
    }

    pub(crate) fn check_output(&self, port: usize) -> SimResult<()> {
        if port < self.outputs.len() {
            Ok(())
        } else {
            Err(SimError::InvalidPort {
                segment: self.name.clone(),
                port,
                count: self.outputs.len(),
            })
        }
    }

    /// Vehicles of the live registry in the order they should be moved this tick
    pub(crate) fn moving_order(&self, ctx: &mut SimContext) -> Vec<CarId> {
        let mut order = self.cars.clone();
        if ctx.shuffle {
            ctx.shuffle(&mut order);
        }
        order
    }

    /// Stage an accepted vehicle onto its entry cell and into the arrivals
    pub(crate) fn admit(&mut self, car: CarId, pos: GridPos) {
        self.grid.stage(pos, car.cell_value());
        self.arrivals.push(car);
    }

    /// Stage a handed-off vehicle's exit cell as empty and drop it from the registry
    pub(crate) fn release(&mut self, car: CarId, pos: GridPos) {
        self.grid.stage(pos, EMPTY);
        self.cars.retain(|c| *c != car);
    }

    pub(crate) fn commit(&mut self) -> StepStats {
        let changed = self.grid.commit();
        self.cars.append(&mut self.arrivals);

        let stats = StepStats {
            cells: self.grid.drivable_cells(),
            cars: self.cars.len(),
            moved: changed as f32 / 2.0,
        };
        self.stats.push(stats);
        stats
    }

    pub(crate) fn record(&mut self, stats: StepStats) {
        self.stats.push(stats);
    }

    /// Live-registry vehicle on a committed cell
    pub fn occupant(&self, pos: GridPos) -> Option<CarId> {
        self.grid.value(pos).and_then(CarId::from_cell)
    }

    pub fn owns(&self, car: CarId) -> bool {
        self.cars.contains(&car)
    }
}

/// The closed set of road elements
#[derive(Debug)]
pub enum SegmentKind {
    Source(Source),
    Line(Line),
    SignaledLine(SignaledLine),
    Intersection(Intersection),
}

/// A road element with its grid, registry and wiring
#[derive(Debug)]
pub struct Segment {
    pub(crate) core: SegmentCore,
    pub(crate) kind: SegmentKind,
}

impl Segment {
    pub fn id(&self) -> SegmentId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn kind(&self) -> &SegmentKind {
        &self.kind
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.core.grid
    }

    /// Live registry
    pub fn cars(&self) -> &[CarId] {
        &self.core.cars
    }

    /// Vehicles accepted since the last commit
    pub fn arrivals(&self) -> &[CarId] {
        &self.core.arrivals
    }

    pub fn inputs(&self) -> &[Option<InputPort>] {
        &self.core.inputs
    }

    pub fn outputs(&self) -> &[Option<OutputPort>] {
        &self.core.outputs
    }

    pub fn stats(&self) -> &[StepStats] {
        &self.core.stats
    }

    pub fn history(&self, depth: usize) -> Vec<Vec<u32>> {
        self.core.grid.history(depth)
    }

    pub fn occupant(&self, pos: GridPos) -> Option<CarId> {
        self.core.occupant(pos)
    }

    /// Light state of a signaled line, `None` for every other kind
    pub fn is_red(&self) -> Option<bool> {
        match &self.kind {
            SegmentKind::SignaledLine(line) => Some(line.light.is_red()),
            _ => None,
        }
    }

    /// Stage this tick's moves
    pub fn move_cars(&mut self, tick: u64, ctx: &mut SimContext) {
        match &mut self.kind {
            SegmentKind::Source(_) => {}
            SegmentKind::Line(line) => line.move_cars(&mut self.core, ctx, None),
            SegmentKind::SignaledLine(line) => line.move_cars(&mut self.core, tick, ctx),
            SegmentKind::Intersection(crossroad) => crossroad.move_cars(&mut self.core, ctx),
        }
    }

    /// Commit the tick and record statistics
    pub fn step(&mut self, _tick: u64) -> StepStats {
        match &self.kind {
            SegmentKind::Source(_) => {
                let stats = StepStats::default();
                self.core.record(stats);
                stats
            }
            _ => self.core.commit(),
        }
    }

    /// Offer a vehicle to input port `port`
    ///
    /// `Ok(true)` when the vehicle was staged onto the entry cell, `Ok(false)`
    /// when that cell is occupied. Nothing is mutated on rejection.
    pub fn add_car(&mut self, ctx: &mut SimContext, car: CarId, port: usize) -> SimResult<bool> {
        match &self.kind {
            SegmentKind::Source(_) => {
                self.core.check_input(port)?;
                Ok(false)
            }
            SegmentKind::Line(line) => line.add_car(&mut self.core, ctx, car, port),
            SegmentKind::SignaledLine(line) => line.line.add_car(&mut self.core, ctx, car, port),
            SegmentKind::Intersection(crossroad) => {
                crossroad.add_car(&mut self.core, ctx, car, port)
            }
        }
    }

    /// Cell a vehicle must reach to leave through output `port`
    ///
    /// `None` for generators, which have no drivable cells.
    pub fn exit_cell(&self, port: usize) -> SimResult<Option<GridPos>> {
        self.core.check_output(port)?;
        Ok(match &self.kind {
            SegmentKind::Source(_) => None,
            SegmentKind::Line(line) => Some(line.end()),
            SegmentKind::SignaledLine(line) => Some(line.line.end()),
            SegmentKind::Intersection(crossroad) => crossroad.exit(port),
        })
    }

    /// Whether leaving through an output consumes the head of the vehicle's route
    pub fn consumes_route(&self) -> bool {
        matches!(self.kind, SegmentKind::Intersection(_))
    }

    pub fn input_count(&self) -> usize {
        self.core.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.core.outputs.len()
    }
}
