//! Vehicle arena and the simulation context passed to every segment
//!
//! Vehicles live in one arena addressed by `CarId`; segments only hold ids.
//! Ids are handed out sequentially starting at 1 and never reused, retired
//! vehicles stay in the arena so their bookkeeping can still be inspected.

use log::debug;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;

use super::car::SimCar;
use super::config::SimConfig;
use super::types::CarId;

/// Owns every vehicle ever created in a run
#[derive(Debug, Default)]
pub struct CarManager {
    cars: Vec<SimCar>,
}

impl CarManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vehicle and return its fresh id
    pub fn new_car(&mut self, route: Vec<usize>, destination: Option<usize>) -> CarId {
        let id = CarId(self.cars.len() as u32 + 1);
        self.cars.push(SimCar::new(id, route, destination));
        id
    }

    fn slot(id: CarId) -> Option<usize> {
        (id.0 as usize).checked_sub(1)
    }

    pub fn get(&self, id: CarId) -> Option<&SimCar> {
        Self::slot(id).and_then(|i| self.cars.get(i))
    }

    pub fn get_mut(&mut self, id: CarId) -> Option<&mut SimCar> {
        Self::slot(id).and_then(move |i| self.cars.get_mut(i))
    }

    /// Number of vehicles ever created
    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimCar> {
        self.cars.iter()
    }

    /// Vehicles that have not left the network
    pub fn active(&self) -> impl Iterator<Item = &SimCar> {
        self.cars.iter().filter(|c| !c.retired)
    }
}

/// Shared mutable state threaded through every segment operation
pub struct SimContext {
    pub cars: CarManager,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,

    /// Vehicles accepted onto the network by a generator
    pub spawned: u64,

    /// Vehicles that left through an open boundary
    pub completed: u64,

    pub shuffle: bool,
    pub reroute_after: Option<u32>,
}

impl SimContext {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            cars: CarManager::new(),
            rng: config.seed.map(StdRng::seed_from_u64),
            spawned: 0,
            completed: 0,
            shuffle: config.shuffle,
            reroute_after: config.reroute_after,
        }
    }

    /// Coin flip with probability `p`, using seeded RNG if available
    pub fn random_bool(&mut self, p: f64) -> bool {
        let p = p.clamp(0.0, 1.0);
        match &mut self.rng {
            Some(rng) => rng.random_bool(p),
            None => rand::rng().random_bool(p),
        }
    }

    /// Uniform index in `0..n`
    pub fn random_index(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        match &mut self.rng {
            Some(rng) => rng.random_range(0..n),
            None => rand::rng().random_range(0..n),
        }
    }

    /// Draw from a distribution, using seeded RNG if available
    pub fn sample<D: Distribution<usize>>(&mut self, dist: &D) -> usize {
        match &mut self.rng {
            Some(rng) => dist.sample(rng),
            None => dist.sample(&mut rand::rng()),
        }
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        match &mut self.rng {
            Some(rng) => items.shuffle(rng),
            None => items.shuffle(&mut rand::rng()),
        }
    }

    /// Mark a vehicle as having left the network
    pub fn retire(&mut self, id: CarId) {
        if let Some(car) = self.cars.get_mut(id) {
            car.retired = true;
            car.heading = Default::default();
        }
        self.completed += 1;
        debug!("{} left the network", id);
    }
}
