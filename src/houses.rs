//! The spatial house registry.
//!
//! Houses are placed uniformly at random in a `gridSize` square and each one
//! independently gets an insecticide-treated net with probability
//! `itnCoverage`. Houses never move and never disappear; a `HouseId` is the
//! index of the house in the registry.
use std::fmt;

use log::{debug, trace};
use serde::Serialize;

use crate::context::Context;
use crate::define_data_plugin;
use crate::define_rng;
use crate::error::SimulationError;
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;

define_rng!(HouseRng);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HouseId(pub usize);

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct House {
    pub id: HouseId,
    pub x: f64,
    pub y: f64,
    pub has_itn: bool,
}

impl House {
    #[must_use]
    pub fn distance_to(&self, other: &House) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

struct HousesData {
    houses: Vec<House>,
}

define_data_plugin!(HousesPlugin, HousesData, HousesData { houses: Vec::new() });

pub trait ContextHousesExt {
    /// Add a house at a fixed position. `init` places houses randomly; this
    /// is for building hand-made layouts.
    fn add_house(&mut self, x: f64, y: f64, has_itn: bool) -> HouseId;

    fn get_house_count(&self) -> usize;

    /// All houses in id order
    fn get_houses(&self) -> &[House];

    /// # Errors
    ///
    /// Returns a `ComputationError` if no house has this id.
    fn get_house(&self, house_id: HouseId) -> Result<&House, SimulationError>;

    /// # Errors
    ///
    /// Returns a `ComputationError` if no house has this id.
    fn house_has_itn(&self, house_id: HouseId) -> Result<bool, SimulationError> {
        Ok(self.get_house(house_id)?.has_itn)
    }

    /// Euclidean distance between two houses
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if either house does not exist.
    fn house_distance(&self, a: HouseId, b: HouseId) -> Result<f64, SimulationError> {
        Ok(self.get_house(a)?.distance_to(self.get_house(b)?))
    }
}

impl ContextHousesExt for Context {
    fn add_house(&mut self, x: f64, y: f64, has_itn: bool) -> HouseId {
        let houses = &mut self.get_data_container_mut(HousesPlugin).houses;
        let id = HouseId(houses.len());
        houses.push(House { id, x, y, has_itn });
        id
    }

    fn get_house_count(&self) -> usize {
        self.get_data_container(HousesPlugin)
            .map_or(0, |data| data.houses.len())
    }

    fn get_houses(&self) -> &[House] {
        self.get_data_container(HousesPlugin)
            .map(|data| data.houses.as_slice())
            .unwrap_or_default()
    }

    fn get_house(&self, house_id: HouseId) -> Result<&House, SimulationError> {
        self.get_houses().get(house_id.0).ok_or_else(|| {
            SimulationError::computation(format!("house {house_id} does not exist"))
        })
    }
}

/// Place `numHouses` houses and assign nets.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the parameters were not set.
pub fn init(context: &mut Context) -> Result<(), SimulationError> {
    trace!("initializing houses");
    let parameters = context.get_parameters()?;
    let (num_houses, grid_size, itn_coverage) = (
        parameters.num_houses,
        parameters.grid_size,
        parameters.itn_coverage,
    );

    let mut protected = 0;
    for _ in 0..num_houses {
        let x = context.sample_range(HouseRng, 0.0..grid_size);
        let y = context.sample_range(HouseRng, 0.0..grid_size);
        let has_itn = context.sample_bool(HouseRng, itn_coverage);
        protected += usize::from(has_itn);
        context.add_house(x, y, has_itn);
    }
    debug!("placed {num_houses} houses, {protected} with nets");
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::parameters::ScenarioInput;

    fn setup(num_houses: i64, itn_coverage: f64, seed: u64) -> Context {
        let mut context = Context::new();
        context.init_random(seed);
        context
            .init_parameters(&ScenarioInput {
                num_houses,
                itn_coverage,
                ..ScenarioInput::default()
            })
            .unwrap();
        init(&mut context).unwrap();
        context
    }

    #[test]
    fn houses_are_placed_in_the_grid() {
        let context = setup(200, 0.0, 42);
        assert_eq!(context.get_house_count(), 200);
        for (index, house) in context.get_houses().iter().enumerate() {
            assert_eq!(house.id, HouseId(index));
            assert!((0.0..100.0).contains(&house.x));
            assert!((0.0..100.0).contains(&house.y));
            assert!(!house.has_itn);
        }
    }

    #[test]
    fn full_coverage_protects_every_house() {
        let context = setup(50, 1.0, 7);
        assert!(context.get_houses().iter().all(|house| house.has_itn));
    }

    #[test]
    fn partial_coverage_is_bernoulli() {
        let context = setup(2000, 0.3, 7);
        let protected = context
            .get_houses()
            .iter()
            .filter(|house| house.has_itn)
            .count();
        // The expected value is 600.
        assert!((500..700).contains(&protected), "{protected}");
    }

    #[test]
    fn placement_is_reproducible() {
        let first = setup(20, 0.5, 11);
        let second = setup(20, 0.5, 11);
        assert_eq!(first.get_houses(), second.get_houses());
    }

    #[test]
    fn distance_and_lookup() {
        let mut context = Context::new();
        let a = context.add_house(0.0, 0.0, false);
        let b = context.add_house(3.0, 4.0, true);
        assert_approx_eq!(context.house_distance(a, b).unwrap(), 5.0);
        assert!(context.house_has_itn(b).unwrap());
        assert!(matches!(
            context.get_house(HouseId(2)),
            Err(SimulationError::ComputationError(_))
        ));
    }

    #[test]
    fn missing_parameters_is_an_error() {
        let mut context = Context::new();
        context.init_random(1);
        assert!(init(&mut context).is_err());
    }
}
