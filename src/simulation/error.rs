//! Error types for network construction and segment access
//!
//! A full cell is never an error: capacity rejection is reported through
//! `Ok(false)` from `add_car`. These variants cover malformed topology and
//! configuration, which are caller bugs.

use super::types::{CarId, SegmentId};

/// Errors raised while building or driving a network
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Two segments were registered under the same name
    #[error("duplicate segment name: {0}")]
    DuplicateName(String),

    /// A segment id that does not belong to this network
    #[error("segment not found: {0:?}")]
    UnknownSegment(SegmentId),

    /// A vehicle id that the arena never issued
    #[error("vehicle not found: {0}")]
    UnknownCar(CarId),

    /// A port index outside the segment's enumerated range
    #[error("invalid port {port} on segment '{segment}' (valid range 0..{count})")]
    InvalidPort {
        segment: String,
        port: usize,
        count: usize,
    },

    /// An output port was connected twice
    #[error("output port {port} of segment '{segment}' is already wired")]
    OutputAlreadyWired { segment: String, port: usize },

    /// An input port already has a feeder
    #[error("input port {port} of segment '{segment}' is already fed")]
    InputAlreadyFed { segment: String, port: usize },

    /// A segment was wired to itself
    #[error("segment '{0}' cannot feed itself")]
    SelfLoop(String),

    /// Two blocks being cross-linked expose different numbers of lanes on the shared side
    #[error("cannot link {outputs} exit lines to {inputs} entry lines")]
    LaneMismatch { outputs: usize, inputs: usize },

    /// A configuration value that cannot produce a working model
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type SimResult<T> = Result<T, SimError>;
