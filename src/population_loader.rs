//! Creates the human and mosquito populations and seeds the initial
//! infections.
//!
//! Every human and every mosquito is assigned to a house drawn uniformly at
//! random. Then `round(initialHumanInfectionFraction * humans)` distinct
//! humans start Infected, each drawing treatment like any new infection, and
//! `round(initialInfectiousMosquitoFraction * mosquitoes)` distinct
//! mosquitoes start Infectious. Seeding happens on day 0.
use log::{debug, trace};
use rand::seq::index;

use crate::context::Context;
use crate::define_rng;
use crate::error::SimulationError;
use crate::houses::HouseId;
use crate::humans::{ContextHumansExt, HumanId};
use crate::infection_manager::draw_treatment;
use crate::mosquitoes::{ContextMosquitoesExt, MosquitoSlot};
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;

define_rng!(PopulationRng);
define_rng!(SeedingRng);

/// Number of agents seeded for a fraction of a population
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#[must_use]
pub fn seed_count(fraction: f64, population: usize) -> usize {
    ((fraction * population as f64).round() as usize).min(population)
}

/// Pick `amount` distinct indices below `length`, in increasing order.
fn sample_distinct(context: &Context, length: usize, amount: usize) -> Vec<usize> {
    let mut picked = context
        .sample(SeedingRng, |rng| index::sample(rng, length, amount))
        .into_vec();
    picked.sort_unstable();
    picked
}

/// # Errors
///
/// Returns a `ConfigurationError` if the parameters were not set, or a
/// `ComputationError` if the houses were not created first.
pub fn init(context: &mut Context) -> Result<(), SimulationError> {
    trace!("initializing population");
    let parameters = context.get_parameters()?;
    let num_humans = parameters.num_humans;
    let num_mosquitoes = parameters.num_mosquitoes;
    let num_houses = parameters.num_houses;
    let human_seeds = seed_count(parameters.initial_human_infection_fraction, num_humans);
    let mosquito_seeds = seed_count(
        parameters.initial_infectious_mosquito_fraction,
        num_mosquitoes,
    );

    for _ in 0..num_humans {
        let house_id = HouseId(context.sample_range(PopulationRng, 0..num_houses));
        context.add_human(house_id)?;
    }
    for _ in 0..num_mosquitoes {
        let house_id = HouseId(context.sample_range(PopulationRng, 0..num_houses));
        context.add_mosquito(house_id)?;
    }

    for position in sample_distinct(context, num_humans, human_seeds) {
        let under_treatment = draw_treatment(context)?;
        context.infect_human(HumanId(position), 0, under_treatment)?;
    }
    for slot in sample_distinct(context, num_mosquitoes, mosquito_seeds) {
        context.seed_infectious_mosquito(MosquitoSlot(slot), 0)?;
    }

    debug!(
        "created {num_humans} humans and {num_mosquitoes} mosquitoes; \
         seeded {human_seeds} infected humans and {mosquito_seeds} infectious mosquitoes"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::houses;
    use crate::humans::HumanState;
    use crate::mosquitoes::MosquitoState;
    use crate::parameters::ScenarioInput;

    fn setup(input: &ScenarioInput, seed: u64) -> Context {
        let mut context = Context::new();
        context.init_random(seed);
        context.init_parameters(input).unwrap();
        houses::init(&mut context).unwrap();
        init(&mut context).unwrap();
        context
    }

    fn scenario() -> ScenarioInput {
        ScenarioInput {
            human_population: 1000,
            mosquito_population: 2000,
            num_houses: 50,
            num_days: 10,
            ..ScenarioInput::default()
        }
    }

    #[test]
    fn seed_count_rounds_and_caps() {
        assert_eq!(seed_count(0.01, 1000), 10);
        assert_eq!(seed_count(0.01, 149), 1);
        assert_eq!(seed_count(0.01, 49), 0);
        assert_eq!(seed_count(0.0, 1000), 0);
        assert_eq!(seed_count(1.0, 7), 7);
    }

    #[test]
    fn populations_are_created_and_seeded() {
        let context = setup(&scenario(), 42);
        assert_eq!(context.get_human_count(), 1000);
        assert_eq!(context.get_mosquito_count(), 2000);

        let humans = context.count_human_states();
        assert_eq!(humans.infected, 10);
        assert_eq!(humans.susceptible, 990);
        assert_eq!(humans.recovered, 0);

        let mosquitoes = context.count_mosquito_states();
        assert_eq!(mosquitoes.infectious, 20);
        assert_eq!(mosquitoes.exposed, 0);

        for human in context.get_humans() {
            assert!(human.house_id.0 < 50);
            if human.state == HumanState::Infected {
                assert_eq!(human.infection_day, 0);
                assert!(!human.under_treatment);
            }
        }
        for mosquito in context.get_mosquitoes() {
            assert!(mosquito.house_id.0 < 50);
        }
    }

    #[test]
    fn full_treatment_treats_seeded_humans() {
        let context = setup(
            &ScenarioInput {
                treatment_rate: 1.0,
                ..scenario()
            },
            3,
        );
        assert!(context
            .get_humans()
            .iter()
            .filter(|human| human.state == HumanState::Infected)
            .all(|human| human.under_treatment));
    }

    #[test]
    fn every_house_is_reachable_through_the_resident_index() {
        let context = setup(&scenario(), 8);
        let indexed: usize = (0..50)
            .map(|house| context.get_residents(HouseId(house)).len())
            .sum();
        assert_eq!(indexed, 1000);
    }

    #[test]
    fn seeding_is_reproducible() {
        let infected = |context: &Context| -> Vec<HumanId> {
            context
                .get_humans()
                .iter()
                .filter(|human| human.state == HumanState::Infected)
                .map(|human| human.id)
                .collect()
        };
        let first = setup(&scenario(), 99);
        let second = setup(&scenario(), 99);
        assert_eq!(infected(&first), infected(&second));
        let infectious_slots = |context: &Context| -> Vec<usize> {
            context
                .get_mosquitoes()
                .iter()
                .enumerate()
                .filter(|(_, mosquito)| mosquito.state == MosquitoState::Infectious)
                .map(|(slot, _)| slot)
                .collect()
        };
        assert_eq!(infectious_slots(&first), infectious_slots(&second));
    }

    #[test]
    fn requires_houses() {
        let mut context = Context::new();
        context.init_random(1);
        context.init_parameters(&scenario()).unwrap();
        assert!(matches!(
            init(&mut context),
            Err(SimulationError::ComputationError(_))
        ));
    }
}
