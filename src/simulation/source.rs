//! Vehicle generator feeding the network from outside

use log::debug;
use rand::distr::weighted::WeightedIndex;

use super::car_manager::SimContext;
use super::config::SpawnConfig;
use super::error::{SimError, SimResult};
use super::types::{CarId, DIRECTIONS};

/// Creates vehicles and offers them to whatever its outputs are wired to
#[derive(Debug, Clone)]
pub struct Source {
    pub spawn: SpawnConfig,
    first_weights: Option<WeightedIndex<f64>>,
    /// Vehicle whose last offer was rejected, retried before creating another
    pending: Option<CarId>,
}

impl Source {
    pub fn new(spawn: SpawnConfig) -> SimResult<Self> {
        spawn.validate()?;
        let first_weights = if spawn.first_n > 0 {
            Some(
                WeightedIndex::new(spawn.first_weights)
                    .map_err(|e| SimError::InvalidConfig(format!("route weights: {}", e)))?,
            )
        } else {
            None
        };
        Ok(Self {
            spawn,
            first_weights,
            pending: None,
        })
    }

    pub fn pending(&self) -> Option<CarId> {
        self.pending
    }

    fn draw_route(&self, ctx: &mut SimContext) -> Vec<usize> {
        let mut route = Vec::with_capacity(self.spawn.first_n + self.spawn.route_len);
        if let Some(weights) = &self.first_weights {
            for _ in 0..self.spawn.first_n {
                route.push(ctx.sample(weights));
            }
        }
        for _ in 0..self.spawn.route_len {
            route.push(ctx.random_index(DIRECTIONS));
        }
        route
    }

    /// Vehicle to offer this tick, `None` when the coin flip says no spawn
    pub(crate) fn next_vehicle(&mut self, ctx: &mut SimContext) -> Option<CarId> {
        if !ctx.random_bool(self.spawn.probability) {
            return None;
        }

        let route = if self.spawn.random_walk {
            self.draw_route(ctx)
        } else {
            self.spawn.route.clone()
        };

        let car_id = match self.pending.take() {
            Some(car_id) => {
                if self.spawn.random_walk {
                    if let Some(car) = ctx.cars.get_mut(car_id) {
                        car.set_route(route);
                    }
                }
                car_id
            }
            None => {
                let car_id = ctx.cars.new_car(route, None);
                debug!("created {}", car_id);
                car_id
            }
        };
        Some(car_id)
    }

    /// Keep a rejected vehicle for the next attempt
    pub(crate) fn hold(&mut self, car_id: CarId) {
        self.pending = Some(car_id);
    }
}
