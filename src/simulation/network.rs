//! Segment arena, wiring graph and the tick driver
//!
//! A network is assembled once through `NetworkBuilder` and never re-wired
//! afterwards. Every tick runs three system-wide phases in construction
//! order: all `move_cars`, then all `step`s, then all hand-offs, so no
//! segment ever sees a neighbour's half-committed state.

use log::{debug, info};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

use super::car_manager::{CarManager, SimContext};
use super::config::{LightSchedule, PortLayout, SimConfig, SpawnConfig};
use super::error::{SimError, SimResult};
use super::grid::OccupancyGrid;
use super::intersection::Intersection;
use super::line::{Line, SignaledLine};
use super::segment::{InputPort, OutputPort, Segment, SegmentCore, SegmentKind};
use super::source::Source;
use super::types::{CarId, SegmentId, StepStats};

/// Edge data of the wiring graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wire {
    pub output: usize,
    pub input: usize,
}

/// One directed connection, as listed by `Network::wires`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub from: SegmentId,
    pub output: usize,
    pub to: SegmentId,
    pub input: usize,
}

/// Collects segments and connections, then freezes them into a `Network`
pub struct NetworkBuilder {
    config: SimConfig,
    segments: Vec<Segment>,
    names: HashMap<String, SegmentId>,
    graph: DiGraph<SegmentId, Wire>,
    nodes: Vec<NodeIndex>,
}

impl NetworkBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            segments: Vec::new(),
            names: HashMap::new(),
            graph: DiGraph::new(),
            nodes: Vec::new(),
        }
    }

    fn insert(
        &mut self,
        name: &str,
        grid: OccupancyGrid,
        inputs: usize,
        outputs: usize,
        kind: SegmentKind,
    ) -> SimResult<SegmentId> {
        if self.names.contains_key(name) {
            return Err(SimError::DuplicateName(name.to_string()));
        }

        let id = SegmentId(self.segments.len());
        let core = SegmentCore::new(id, name.to_string(), grid, inputs, outputs);
        self.segments.push(Segment { core, kind });
        self.names.insert(name.to_string(), id);
        self.nodes.push(self.graph.add_node(id));
        Ok(id)
    }

    fn check_length(length: usize) -> SimResult<()> {
        if length == 0 {
            return Err(SimError::InvalidConfig("a line needs at least one cell".to_string()));
        }
        Ok(())
    }

    pub fn add_line(&mut self, name: &str, length: usize) -> SimResult<SegmentId> {
        Self::check_length(length)?;
        let grid = OccupancyGrid::new(1, length, self.config.history_limit);
        self.insert(name, grid, 1, 1, SegmentKind::Line(Line::new(length)))
    }

    pub fn add_signaled_line(
        &mut self,
        name: &str,
        length: usize,
        light_position: usize,
        schedule: LightSchedule,
    ) -> SimResult<SegmentId> {
        Self::check_length(length)?;
        let line = SignaledLine::new(length, light_position, schedule)?;
        let grid = OccupancyGrid::new(1, length, self.config.history_limit);
        self.insert(name, grid, 1, 1, SegmentKind::SignaledLine(line))
    }

    pub fn add_intersection(
        &mut self,
        name: &str,
        layout: PortLayout,
        alternate_yield: bool,
    ) -> SimResult<SegmentId> {
        let crossroad = Intersection::new(layout, alternate_yield);
        let ports = crossroad.port_count();
        let grid = crossroad.grid(self.config.history_limit);
        self.insert(name, grid, ports, ports, SegmentKind::Intersection(crossroad))
    }

    pub fn add_source(
        &mut self,
        name: &str,
        spawn: SpawnConfig,
        outputs: usize,
    ) -> SimResult<SegmentId> {
        let source = Source::new(spawn)?;
        let grid = OccupancyGrid::new(1, 1, 0);
        self.insert(name, grid, 0, outputs, SegmentKind::Source(source))
    }

    fn segment(&self, id: SegmentId) -> SimResult<&Segment> {
        self.segments.get(id.0).ok_or(SimError::UnknownSegment(id))
    }

    /// Wire output `output` of `from` to input `input` of `to`
    pub fn connect(
        &mut self,
        from: SegmentId,
        output: usize,
        to: SegmentId,
        input: usize,
    ) -> SimResult<()> {
        let source = self.segment(from)?;
        let target = self.segment(to)?;
        if from == to {
            return Err(SimError::SelfLoop(source.core.name.clone()));
        }
        source.core.check_output(output)?;
        target.core.check_input(input)?;
        if source.core.outputs[output].is_some() {
            return Err(SimError::OutputAlreadyWired {
                segment: source.core.name.clone(),
                port: output,
            });
        }
        if target.core.inputs[input].is_some() {
            return Err(SimError::InputAlreadyFed {
                segment: target.core.name.clone(),
                port: input,
            });
        }

        self.segments[from.0].core.outputs[output] = Some(OutputPort { to, input });
        self.segments[to.0].core.inputs[input] = Some(InputPort { from, output });
        self.graph
            .add_edge(self.nodes[from.0], self.nodes[to.0], Wire { output, input });
        Ok(())
    }

    pub fn segment_id(&self, name: &str) -> Option<SegmentId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, id: SegmentId) -> Option<&str> {
        self.segments.get(id.0).map(|s| s.name())
    }

    /// Whether input `input` of `id` already has a feeder
    pub fn is_fed(&self, id: SegmentId, input: usize) -> bool {
        self.segments
            .get(id.0)
            .and_then(|s| s.core.inputs.get(input))
            .is_some_and(|p| p.is_some())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn build(self) -> Network {
        info!(
            "Built network with {} segments and {} connections",
            self.segments.len(),
            self.graph.edge_count()
        );
        Network {
            ctx: SimContext::new(&self.config),
            segments: self.segments,
            names: self.names,
            graph: self.graph,
            nodes: self.nodes,
            tick: 0,
            stats: Vec::new(),
        }
    }
}

/// A fully wired road network and its vehicles
pub struct Network {
    segments: Vec<Segment>,
    names: HashMap<String, SegmentId>,
    graph: DiGraph<SegmentId, Wire>,
    nodes: Vec<NodeIndex>,
    ctx: SimContext,
    tick: u64,
    /// Per-tick statistics summed over all segments
    stats: Vec<StepStats>,
}

impl Network {
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0)
    }

    pub fn segment_id(&self, name: &str) -> Option<SegmentId> {
        self.names.get(name).copied()
    }

    pub fn segment_by_name(&self, name: &str) -> Option<&Segment> {
        self.segment_id(name).and_then(|id| self.segment(id))
    }

    /// Segments in the order they are driven each tick
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// Segment ids in drive order
    pub fn order(&self) -> Vec<SegmentId> {
        self.segments.iter().map(|s| s.id()).collect()
    }

    pub fn cars(&self) -> &CarManager {
        &self.ctx.cars
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn spawned(&self) -> u64 {
        self.ctx.spawned
    }

    pub fn completed(&self) -> u64 {
        self.ctx.completed
    }

    /// Vehicles currently held by a segment, staged arrivals included
    pub fn live_cars(&self) -> usize {
        self.segments
            .iter()
            .map(|s| s.cars().len() + s.arrivals().len())
            .sum()
    }

    pub fn stats(&self) -> &[StepStats] {
        &self.stats
    }

    /// Every connection in the network
    pub fn wires(&self) -> Vec<Connection> {
        self.graph
            .edge_references()
            .map(|edge| Connection {
                from: self.graph[edge.source()],
                output: edge.weight().output,
                to: self.graph[edge.target()],
                input: edge.weight().input,
            })
            .collect()
    }

    /// Whether a vehicle in `from` could ever reach `to`
    pub fn reachable(&self, from: SegmentId, to: SegmentId) -> bool {
        match (self.nodes.get(from.0), self.nodes.get(to.0)) {
            (Some(a), Some(b)) => has_path_connecting(&self.graph, *a, *b, None),
            _ => false,
        }
    }

    /// Create a vehicle that is not yet on any segment
    pub fn create_car(&mut self, route: Vec<usize>) -> CarId {
        self.ctx.cars.new_car(route, None)
    }

    /// Offer a vehicle directly to a segment's input port
    pub fn add_car(&mut self, id: SegmentId, car: CarId, input: usize) -> SimResult<bool> {
        let segment = self
            .segments
            .get_mut(id.0)
            .ok_or(SimError::UnknownSegment(id))?;
        segment.add_car(&mut self.ctx, car, input)
    }

    /// Run one full tick: move, commit, hand off
    pub fn tick(&mut self) -> SimResult<StepStats> {
        self.move_phase();
        let total = self.commit_phase();
        self.transfer_phase()?;
        Ok(total)
    }

    /// Stage moves in every segment
    pub fn move_phase(&mut self) {
        let tick = self.tick;
        for segment in &mut self.segments {
            segment.move_cars(tick, &mut self.ctx);
        }
    }

    /// Commit every segment and record the summed statistics
    pub fn commit_phase(&mut self) -> StepStats {
        let tick = self.tick;
        let mut total = StepStats::default();
        for segment in &mut self.segments {
            total += segment.step(tick);
        }
        self.stats.push(total);
        total
    }

    /// Hand off across every segment's outputs and close the tick
    pub fn transfer_phase(&mut self) -> SimResult<()> {
        for i in 0..self.segments.len() {
            self.process_outputs(SegmentId(i))?;
        }
        self.tick += 1;
        Ok(())
    }

    pub fn run(&mut self, ticks: u64) -> SimResult<()> {
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// Hand off whatever sits on the exit cells of `id`
    ///
    /// Calling this twice without a commit in between is a no-op the second
    /// time: a handed-off vehicle is no longer in the registry, even though
    /// its exit cell only clears at the next commit.
    pub fn process_outputs(&mut self, id: SegmentId) -> SimResult<()> {
        let segment = self.segments.get(id.0).ok_or(SimError::UnknownSegment(id))?;
        let is_source = matches!(segment.kind, SegmentKind::Source(_));

        for port in 0..segment.output_count() {
            if is_source {
                self.spawn_into(id, port)?;
            } else {
                self.hand_off(id, port)?;
            }
        }
        Ok(())
    }

    /// Offer the vehicle on exit `port` of `id` downstream
    ///
    /// An unwired output is an open boundary: the vehicle leaves the network.
    fn hand_off(&mut self, id: SegmentId, port: usize) -> SimResult<bool> {
        let segment = &self.segments[id.0];
        let Some(exit) = segment.exit_cell(port)? else {
            return Ok(false);
        };
        let Some(car_id) = segment.occupant(exit) else {
            return Ok(false);
        };
        // arrived this tick, it moves on no earlier than the next one
        if !segment.core.owns(car_id) {
            return Ok(false);
        }
        let target = segment.core.outputs[port];
        let consumes = segment.consumes_route();

        let point = if consumes {
            self.ctx
                .cars
                .get_mut(car_id)
                .and_then(|car| car.next_point_on_route())
        } else {
            None
        };

        let accepted = match target {
            Some(out) => {
                let downstream = self
                    .segments
                    .get_mut(out.to.0)
                    .ok_or(SimError::UnknownSegment(out.to))?;
                downstream.add_car(&mut self.ctx, car_id, out.input)?
            }
            None => {
                self.ctx.retire(car_id);
                true
            }
        };

        if accepted {
            self.segments[id.0].core.release(car_id, exit);
            if let Some(out) = target {
                debug!(
                    "{} handed from '{}' to '{}'",
                    car_id, self.segments[id.0].core.name, self.segments[out.to.0].core.name
                );
            }
        } else if let Some(point) = point {
            if let Some(car) = self.ctx.cars.get_mut(car_id) {
                car.requeue(point);
            }
        }
        Ok(accepted)
    }

    fn spawn_into(&mut self, id: SegmentId, port: usize) -> SimResult<bool> {
        let Some(out) = self.segments[id.0].core.outputs[port] else {
            return Ok(false);
        };
        let SegmentKind::Source(source) = &mut self.segments[id.0].kind else {
            return Ok(false);
        };
        let Some(car_id) = source.next_vehicle(&mut self.ctx) else {
            return Ok(false);
        };

        let downstream = self
            .segments
            .get_mut(out.to.0)
            .ok_or(SimError::UnknownSegment(out.to))?;
        let accepted = downstream.add_car(&mut self.ctx, car_id, out.input)?;

        if accepted {
            self.ctx.spawned += 1;
            debug!("{} spawned into '{}'", car_id, downstream.core.name);
        } else if let SegmentKind::Source(source) = &mut self.segments[id.0].kind {
            source.hold(car_id);
        }
        Ok(accepted)
    }
}
