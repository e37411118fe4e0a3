//! Network composition
//!
//! A unit is one crossroad with a signaled approach line on every input port
//! and a plain exit line on every output port. Four units cross-wired by
//! `MESH_LINKS` form a 2×2 mesh; four 2×2 meshes wired by the same table
//! form a 4×4 mesh. Children are numbered row-major:
//!
//! ```text
//! 0 1
//! 2 3
//! ```
//!
//! Directions follow the crossroad port groups: 0 west, 1 east, 2 south,
//! 3 north. A unit's exit line `d` leaves through side `d`; its entry line
//! `d` carries traffic heading `d`, so it comes in through the opposite side.

use log::{info, warn};

use super::config::{SimConfig, SpawnConfig, UnitConfig};
use super::error::{SimError, SimResult};
use super::network::{Network, NetworkBuilder};
use super::types::{SegmentId, DIRECTIONS};

/// Cross-links between the four children of a mesh: (from child, direction, to child)
///
/// Every boundary exit line of `from` facing `direction` feeds the matching
/// entry line of `to`.
pub const MESH_LINKS: [(usize, usize, usize); 8] = [
    (0, 1, 1),
    (0, 2, 2),
    (1, 0, 0),
    (1, 2, 3),
    (2, 1, 3),
    (2, 3, 0),
    (3, 0, 2),
    (3, 3, 1),
];

/// Children lying on each side of a mesh (west, east, south, north), in row/column order
const SIDES: [[usize; 2]; DIRECTIONS] = [[0, 2], [1, 3], [2, 3], [0, 1]];

fn opposite(direction: usize) -> usize {
    direction ^ 1
}

/// Segment ids of one crossroad-and-lines unit
#[derive(Debug, Clone)]
pub struct Unit {
    pub crossroad: SegmentId,
    /// Signaled approach lines, grouped by the direction their traffic heads
    pub entries: [Vec<SegmentId>; DIRECTIONS],
    /// Exit lines, grouped by the side they leave through
    pub exits: [Vec<SegmentId>; DIRECTIONS],
}

/// A unit or a 2×2 arrangement of smaller blocks
#[derive(Debug, Clone)]
pub enum Block {
    Unit(Unit),
    Mesh(Box<[Block; 4]>),
}

impl Block {
    /// Exit lines leaving the block through side `direction`
    pub fn exits(&self, direction: usize) -> Vec<SegmentId> {
        match self {
            Block::Unit(unit) => unit.exits[direction].clone(),
            Block::Mesh(children) => SIDES[direction]
                .iter()
                .flat_map(|&c| children[c].exits(direction))
                .collect(),
        }
    }

    /// Entry lines carrying traffic heading `direction` into the block
    pub fn entries(&self, direction: usize) -> Vec<SegmentId> {
        match self {
            Block::Unit(unit) => unit.entries[direction].clone(),
            Block::Mesh(children) => SIDES[opposite(direction)]
                .iter()
                .flat_map(|&c| children[c].entries(direction))
                .collect(),
        }
    }

    /// All units in construction order
    pub fn units(&self) -> Vec<&Unit> {
        match self {
            Block::Unit(unit) => vec![unit],
            Block::Mesh(children) => children.iter().flat_map(|c| c.units()).collect(),
        }
    }
}

/// Network topologies the composer knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Single,
    Grid2x2,
    Grid4x4,
}

impl Layout {
    /// Nesting depth: 0 for a lone unit, one more per 2×2 level
    pub fn depth(self) -> usize {
        match self {
            Layout::Single => 0,
            Layout::Grid2x2 => 1,
            Layout::Grid4x4 => 2,
        }
    }

    pub fn unit_count(self) -> usize {
        4usize.pow(self.depth() as u32)
    }
}

/// A built network together with its composition tree
pub struct Composition {
    pub network: Network,
    pub root: Block,
}

/// Build a unit and its lines
///
/// Horizontal approaches use `offset`, vertical ones run half a cycle later
/// so crossing approaches alternate. With a green phase longer than the red
/// one the two greens overlap for `green - red` ticks per cycle.
pub fn build_unit(
    builder: &mut NetworkBuilder,
    prefix: &str,
    config: &UnitConfig,
    offset: u32,
) -> SimResult<Unit> {
    config.validate()?;
    let layout = config.layout;
    let ports = layout.port_count();
    let horizontal = config.schedule(offset)?;
    let vertical = horizontal.opposed();
    if config.green > config.red {
        warn!(
            "'{}': green {} exceeds red {}, crossing approaches overlap on green",
            prefix, config.green, config.red
        );
    }

    let mut exits: [Vec<SegmentId>; DIRECTIONS] = Default::default();
    let mut entries: [Vec<SegmentId>; DIRECTIONS] = Default::default();
    let mut exit_ids = Vec::with_capacity(ports);
    let mut entry_ids = Vec::with_capacity(ports);

    // exit lines first so they drain before their feeders hand off
    for port in 0..ports {
        let id = builder.add_line(&format!("{}/line{}", prefix, port + 1), config.length)?;
        exit_ids.push(id);
    }
    for port in 0..ports {
        let schedule = if port < layout.horizontal() {
            horizontal
        } else {
            vertical
        };
        let id = builder.add_signaled_line(
            &format!("{}/signaled{}", prefix, port + 1),
            config.length,
            config.light_position(),
            schedule,
        )?;
        entry_ids.push(id);
    }
    let crossroad = builder.add_intersection(
        &format!("{}/crossroad", prefix),
        layout,
        config.alternate_yield,
    )?;

    for port in 0..ports {
        builder.connect(entry_ids[port], 0, crossroad, port)?;
        builder.connect(crossroad, port, exit_ids[port], 0)?;

        let group = layout.group_of(port).unwrap_or(DIRECTIONS - 1);
        entries[group].push(entry_ids[port]);
        exits[group].push(exit_ids[port]);
    }

    Ok(Unit {
        crossroad,
        entries,
        exits,
    })
}

/// Wire every exit of `from` facing `direction` to the matching entry of `to`
pub fn link(
    builder: &mut NetworkBuilder,
    from: &Block,
    to: &Block,
    direction: usize,
) -> SimResult<()> {
    let outputs = from.exits(direction);
    let inputs = to.entries(direction);
    if outputs.len() != inputs.len() {
        return Err(SimError::LaneMismatch {
            outputs: outputs.len(),
            inputs: inputs.len(),
        });
    }
    for (out, inp) in outputs.into_iter().zip(inputs) {
        builder.connect(out, 0, inp, 0)?;
    }
    Ok(())
}

/// Build a block `depth` levels deep, numbering units in construction order
pub fn build_block(
    builder: &mut NetworkBuilder,
    prefix: &str,
    config: &UnitConfig,
    depth: usize,
    offsets: &[u32],
    next_unit: &mut usize,
) -> SimResult<Block> {
    if depth == 0 {
        let offset = offsets.get(*next_unit).copied().unwrap_or(0);
        *next_unit += 1;
        return build_unit(builder, prefix, config, offset).map(Block::Unit);
    }

    let child = |i: usize, builder: &mut NetworkBuilder, next_unit: &mut usize| {
        build_block(
            builder,
            &format!("{}/{}", prefix, i + 1),
            config,
            depth - 1,
            offsets,
            next_unit,
        )
    };
    let children = [
        child(0, builder, next_unit)?,
        child(1, builder, next_unit)?,
        child(2, builder, next_unit)?,
        child(3, builder, next_unit)?,
    ];

    for (from, direction, to) in MESH_LINKS {
        link(builder, &children[from], &children[to], direction)?;
    }
    Ok(Block::Mesh(Box::new(children)))
}

/// Give every entry line nothing else feeds its own generator
pub fn attach_sources(
    builder: &mut NetworkBuilder,
    root: &Block,
    spawn: &SpawnConfig,
) -> SimResult<usize> {
    let mut attached = 0;
    for unit in root.units() {
        for entry in unit.entries.iter().flatten() {
            if builder.is_fed(*entry, 0) {
                continue;
            }
            let name = builder
                .name_of(*entry)
                .map(|n| format!("{}/source", n))
                .ok_or(SimError::UnknownSegment(*entry))?;
            let source = builder.add_source(&name, spawn.clone(), 1)?;
            builder.connect(source, 0, *entry, 0)?;
            attached += 1;
        }
    }
    Ok(attached)
}

/// Build a complete network for `layout`
///
/// `offsets` gives each unit's light phase offset in construction order;
/// missing entries default to 0.
pub fn compose(
    layout: Layout,
    sim: SimConfig,
    config: &UnitConfig,
    offsets: &[u32],
) -> SimResult<Composition> {
    let mut builder = NetworkBuilder::new(sim);
    let prefix = match layout {
        Layout::Single => "unit",
        Layout::Grid2x2 | Layout::Grid4x4 => "grid",
    };

    let mut next_unit = 0;
    let root = build_block(&mut builder, prefix, config, layout.depth(), offsets, &mut next_unit)?;

    if let Some(spawn) = &config.spawn {
        let sources = attach_sources(&mut builder, &root, spawn)?;
        info!("Attached {} generators to boundary lines", sources);
    }

    info!("Composed {:?} from {} units", layout, next_unit);
    Ok(Composition {
        network: builder.build(),
        root,
    })
}
