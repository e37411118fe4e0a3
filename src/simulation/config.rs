//! Construction parameters for segments, units and whole runs

use super::error::{SimError, SimResult};
use super::types::{DEFAULT_ROUTE_LEN, DIRECTIONS};

/// Run-wide settings
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Seed for reproducible runs; `None` uses the thread RNG
    pub seed: Option<u64>,
    /// Visit each segment's vehicles in random order during `move_cars`
    pub shuffle: bool,
    /// Reroute a vehicle blocked this many consecutive times inside an intersection
    pub reroute_after: Option<u32>,
    /// Number of committed grids each segment keeps
    pub history_limit: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: None,
            shuffle: true,
            reroute_after: None,
            history_limit: 16,
        }
    }
}

/// Red/green timing of a traffic light
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSchedule {
    pub red: u32,
    pub green: u32,
    pub offset: u32,
}

impl LightSchedule {
    /// Validated schedule; the cycle must be non-empty and fit in a `u32`
    pub fn new(red: u32, green: u32, offset: u32) -> SimResult<Self> {
        match red.checked_add(green) {
            Some(0) => Err(SimError::InvalidConfig(
                "light cycle must be longer than zero ticks".to_string(),
            )),
            None => Err(SimError::InvalidConfig(format!(
                "light cycle of {} red and {} green ticks is too long",
                red, green
            ))),
            Some(_) => Ok(Self { red, green, offset }),
        }
    }

    pub fn cycle(&self) -> u64 {
        self.red as u64 + self.green as u64
    }

    /// The same schedule shifted by half a cycle
    ///
    /// Crossing approaches paired this way are never green together as long
    /// as `red >= green`.
    pub fn opposed(&self) -> Self {
        let cycle = self.cycle();
        if cycle == 0 {
            return *self;
        }
        let offset = (self.offset as u64 % cycle + cycle / 2) % cycle;
        Self {
            // below the cycle, which `new` keeps within u32
            offset: offset as u32,
            ..*self
        }
    }

    pub fn is_red(&self, tick: u64) -> bool {
        let cycle = self.cycle();
        if cycle == 0 {
            return false;
        }
        let phase = (tick % cycle + self.offset as u64 % cycle) % cycle;
        phase < self.red as u64
    }
}

/// Lane counts of the four port groups of a crossroad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayout {
    pub left: usize,
    pub right: usize,
    pub bottom: usize,
    pub top: usize,
}

impl Default for PortLayout {
    fn default() -> Self {
        Self::uniform(1)
    }
}

impl PortLayout {
    pub fn uniform(lanes: usize) -> Self {
        Self {
            left: lanes,
            right: lanes,
            bottom: lanes,
            top: lanes,
        }
    }

    pub fn horizontal(&self) -> usize {
        self.left + self.right
    }

    pub fn vertical(&self) -> usize {
        self.bottom + self.top
    }

    pub fn port_count(&self) -> usize {
        self.horizontal() + self.vertical()
    }

    /// Lanes in group `direction` (0 left, 1 right, 2 bottom, 3 top)
    pub fn lanes(&self, direction: usize) -> usize {
        match direction {
            0 => self.left,
            1 => self.right,
            2 => self.bottom,
            _ => self.top,
        }
    }

    /// First port index of group `direction`
    pub fn group_start(&self, direction: usize) -> usize {
        (0..direction).map(|d| self.lanes(d)).sum()
    }

    /// Group a port index belongs to, `None` past the last port
    pub fn group_of(&self, port: usize) -> Option<usize> {
        (0..DIRECTIONS).find(|&d| {
            let start = self.group_start(d);
            port >= start && port < start + self.lanes(d)
        })
    }

    /// The smallest crossroad shape (one lane per side, 4×4 cells)
    pub fn is_single_lane(&self) -> bool {
        *self == Self::uniform(1)
    }
}

/// Parameters of a vehicle generator
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Probability of attempting a spawn per output per tick
    pub probability: f64,
    /// Give every vehicle a freshly drawn random route
    pub random_walk: bool,
    /// Fixed route used when `random_walk` is off
    pub route: Vec<usize>,
    /// Uniformly drawn port choices appended to a random-walk route
    pub route_len: usize,
    /// Weighted port choices placed at the head of a random-walk route
    pub first_n: usize,
    /// Weights for the first `first_n` choices, one per direction
    pub first_weights: [f64; DIRECTIONS],
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            probability: 1.0,
            random_walk: true,
            route: Vec::new(),
            route_len: DEFAULT_ROUTE_LEN,
            first_n: 0,
            first_weights: [0.25; DIRECTIONS],
        }
    }
}

impl SpawnConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(SimError::InvalidConfig(format!(
                "spawn probability {} is outside 0..=1",
                self.probability
            )));
        }
        if self.first_weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(SimError::InvalidConfig(
                "route weights must be finite and non-negative".to_string(),
            ));
        }
        if self.first_n > 0 && self.first_weights.iter().sum::<f64>() <= 0.0 {
            return Err(SimError::InvalidConfig(
                "route weights must not all be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of one crossroad-and-lines unit
#[derive(Debug, Clone)]
pub struct UnitConfig {
    /// Cells per approach and exit line
    pub length: usize,
    pub red: u32,
    pub green: u32,
    pub layout: PortLayout,
    pub alternate_yield: bool,
    /// Attach generators to boundary entry lines
    pub spawn: Option<SpawnConfig>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            length: 10,
            red: 5,
            green: 5,
            layout: PortLayout::default(),
            alternate_yield: false,
            spawn: None,
        }
    }
}

impl UnitConfig {
    pub fn validate(&self) -> SimResult<()> {
        if self.length < 2 {
            return Err(SimError::InvalidConfig(format!(
                "line length {} leaves no room for a light",
                self.length
            )));
        }
        if self.layout.port_count() == 0 {
            return Err(SimError::InvalidConfig(
                "a crossroad needs at least one lane".to_string(),
            ));
        }
        if let Some(spawn) = &self.spawn {
            spawn.validate()?;
        }
        LightSchedule::new(self.red, self.green, 0).map(|_| ())
    }

    /// Light timing of the unit's horizontal approaches
    pub fn schedule(&self, offset: u32) -> SimResult<LightSchedule> {
        LightSchedule::new(self.red, self.green, offset)
    }

    /// Cell index of the light on every approach line
    pub fn light_position(&self) -> usize {
        self.length - 2
    }
}
