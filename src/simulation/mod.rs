//! Cellular traffic model
//!
//! This module contains the whole simulation engine: occupancy grids,
//! vehicles, the segment kinds, the network tick driver and the composer
//! that wires crossroads into larger meshes. It has no I/O of its own and
//! can be driven from tests or the headless binary.

mod car;
mod car_manager;
mod compose;
mod config;
mod error;
mod grid;
mod intersection;
mod line;
mod network;
mod segment;
mod source;
mod types;

// Re-export public types for external use
pub use car::{MoveResult, SimCar};
pub use car_manager::{CarManager, SimContext};
pub use compose::{
    attach_sources, build_block, build_unit, compose, link, Block, Composition, Layout, Unit,
    MESH_LINKS,
};
pub use config::{LightSchedule, PortLayout, SimConfig, SpawnConfig, UnitConfig};
pub use error::{SimError, SimResult};
pub use grid::OccupancyGrid;
pub use intersection::Intersection;
pub use line::{Line, SignaledLine, TrafficLight};
pub use network::{Connection, Network, NetworkBuilder, Wire};
pub use segment::{InputPort, OutputPort, Segment, SegmentKind};
pub use source::Source;
pub use types::{
    CarId, GridPos, Heading, SegmentId, StepStats, DEFAULT_ROUTE_LEN, DIRECTIONS, EMPTY,
};
