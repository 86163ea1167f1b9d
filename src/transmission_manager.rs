//! Mosquito biting and transmission, the first sub-step of a day.
//!
//! Each mosquito, in slot order, may bite one resident of the house it
//! forages at. Houses with a net and houses without residents are skipped,
//! so a net blocks transmission in both directions. All outcomes are decided
//! against the states at the start of the day and applied after every
//! mosquito has had its turn: a human infected today cannot infect a mosquito
//! today, and a mosquito exposed today cannot infect anyone.
use log::debug;

use crate::context::Context;
use crate::define_rng;
use crate::error::SimulationError;
use crate::hashing::HashSet;
use crate::houses::ContextHousesExt;
use crate::humans::{ContextHumansExt, HumanId, HumanState};
use crate::infection_manager::draw_treatment;
use crate::mosquitoes::{ContextMosquitoesExt, MosquitoSlot, MosquitoState};
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;

define_rng!(BitingRng);
define_rng!(TransmissionRng);

/// What happened during one biting pass
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TransmissionSummary {
    pub bites: usize,
    pub human_infections: usize,
    pub mosquito_infections: usize,
}

/// Run the biting pass of `day`.
///
/// # Errors
///
/// Returns a `ComputationError` if a mosquito references a missing house or a
/// state change is invalid.
pub fn bite_and_transmit(
    context: &mut Context,
    day: usize,
) -> Result<TransmissionSummary, SimulationError> {
    let parameters = context.get_parameters()?.clone();
    let mut summary = TransmissionSummary::default();
    let mut infected_humans: Vec<HumanId> = Vec::new();
    let mut already_infected: HashSet<HumanId> = HashSet::default();
    let mut exposed_mosquitoes: Vec<MosquitoSlot> = Vec::new();

    for (slot, mosquito) in context.get_mosquitoes().iter().enumerate() {
        if context.get_house(mosquito.house_id)?.has_itn {
            continue;
        }
        let residents = context.get_residents(mosquito.house_id);
        if residents.is_empty() || !context.sample_bool(BitingRng, parameters.biting_prob) {
            continue;
        }
        let human_id = residents[context.sample_range(BitingRng, 0..residents.len())];
        let human = context.get_human(human_id)?;
        summary.bites += 1;

        match (mosquito.state, human.state) {
            (MosquitoState::Infectious, HumanState::Susceptible) => {
                if context.sample_bool(TransmissionRng, parameters.mosquito_to_human_prob)
                    && already_infected.insert(human_id)
                {
                    infected_humans.push(human_id);
                }
            }
            (MosquitoState::Susceptible, HumanState::Infected) => {
                let probability = parameters.human_to_mosquito_prob_for(human.under_treatment);
                if context.sample_bool(TransmissionRng, probability) {
                    exposed_mosquitoes.push(MosquitoSlot(slot));
                }
            }
            _ => {}
        }
    }

    for &human_id in &infected_humans {
        let under_treatment = draw_treatment(context)?;
        context.infect_human(human_id, day, under_treatment)?;
    }
    for &slot in &exposed_mosquitoes {
        context.set_mosquito_state(slot, MosquitoState::Exposed, day)?;
    }

    summary.human_infections = infected_humans.len();
    summary.mosquito_infections = exposed_mosquitoes.len();
    debug!("day {day}: {summary:?}");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::houses::HouseId;
    use crate::parameters::{ModelConstants, ScenarioInput};

    // At 72 degrees the daily biting probability is above 1 and clamped to 1.
    fn certain_bites(model: ModelConstants, treatment_rate: f64) -> Context {
        let mut context = Context::new();
        context.init_random(42);
        context
            .init_parameters(&ScenarioInput {
                temperature: 72.0,
                treatment_rate,
                model,
                ..ScenarioInput::default()
            })
            .unwrap();
        context
    }

    fn certain_transmission() -> ModelConstants {
        ModelConstants {
            mosquito_to_human_prob: 1.0,
            human_to_mosquito_prob: 1.0,
            treatment_transmission_reduction: 0.0,
            ..ModelConstants::default()
        }
    }

    #[test]
    fn infectious_mosquito_infects_resident() {
        let mut context = certain_bites(certain_transmission(), 1.0);
        context.add_house(0.0, 0.0, false);
        let human = context.add_human(HouseId(0)).unwrap();
        let slot = context.add_mosquito(HouseId(0)).unwrap();
        context.seed_infectious_mosquito(slot, 0).unwrap();

        let summary = bite_and_transmit(&mut context, 3).unwrap();
        assert_eq!(
            summary,
            TransmissionSummary {
                bites: 1,
                human_infections: 1,
                mosquito_infections: 0,
            }
        );
        let human = context.get_human(human).unwrap();
        assert_eq!(human.state, HumanState::Infected);
        assert_eq!(human.infection_day, 3);
        assert!(human.under_treatment);
    }

    #[test]
    fn susceptible_mosquito_acquires_from_infected_human() {
        let mut context = certain_bites(certain_transmission(), 0.0);
        context.add_house(0.0, 0.0, false);
        let human = context.add_human(HouseId(0)).unwrap();
        context.infect_human(human, 0, false).unwrap();
        let slot = context.add_mosquito(HouseId(0)).unwrap();

        let summary = bite_and_transmit(&mut context, 1).unwrap();
        assert_eq!(summary.mosquito_infections, 1);
        let mosquito = context.get_mosquito(slot).unwrap();
        assert_eq!(mosquito.state, MosquitoState::Exposed);
        assert_eq!(mosquito.state_entry_day, 1);
    }

    #[test]
    fn nets_block_every_bite() {
        let mut context = certain_bites(certain_transmission(), 0.0);
        context.add_house(0.0, 0.0, true);
        let human = context.add_human(HouseId(0)).unwrap();
        for _ in 0..10 {
            let slot = context.add_mosquito(HouseId(0)).unwrap();
            context.seed_infectious_mosquito(slot, 0).unwrap();
        }
        let summary = bite_and_transmit(&mut context, 1).unwrap();
        assert_eq!(summary, TransmissionSummary::default());
        assert_eq!(
            context.get_human(human).unwrap().state,
            HumanState::Susceptible
        );
    }

    #[test]
    fn empty_houses_are_skipped() {
        let mut context = certain_bites(certain_transmission(), 0.0);
        context.add_house(0.0, 0.0, false);
        context.add_house(5.0, 5.0, false);
        context.add_human(HouseId(1)).unwrap();
        let slot = context.add_mosquito(HouseId(0)).unwrap();
        context.seed_infectious_mosquito(slot, 0).unwrap();
        assert_eq!(bite_and_transmit(&mut context, 1).unwrap().bites, 0);
    }

    #[test]
    fn outcomes_use_start_of_day_states() {
        let mut context = certain_bites(certain_transmission(), 0.0);
        context.add_house(0.0, 0.0, false);
        let human = context.add_human(HouseId(0)).unwrap();
        // The infectious mosquito bites first; the susceptible one bites the
        // same human later in the pass but sees them as Susceptible.
        let infectious = context.add_mosquito(HouseId(0)).unwrap();
        context.seed_infectious_mosquito(infectious, 0).unwrap();
        let susceptible = context.add_mosquito(HouseId(0)).unwrap();

        let summary = bite_and_transmit(&mut context, 2).unwrap();
        assert_eq!(summary.human_infections, 1);
        assert_eq!(summary.mosquito_infections, 0);
        assert_eq!(
            context.get_human(human).unwrap().state,
            HumanState::Infected
        );
        assert_eq!(
            context.get_mosquito(susceptible).unwrap().state,
            MosquitoState::Susceptible
        );
    }

    #[test]
    fn a_human_is_infected_once_per_day() {
        let mut context = certain_bites(certain_transmission(), 0.0);
        context.add_house(0.0, 0.0, false);
        context.add_human(HouseId(0)).unwrap();
        for _ in 0..5 {
            let slot = context.add_mosquito(HouseId(0)).unwrap();
            context.seed_infectious_mosquito(slot, 0).unwrap();
        }
        let summary = bite_and_transmit(&mut context, 1).unwrap();
        assert_eq!(summary.bites, 5);
        assert_eq!(summary.human_infections, 1);
    }

    #[test]
    fn treatment_blocks_acquisition_when_fully_effective() {
        let mut context = certain_bites(
            ModelConstants {
                treatment_transmission_reduction: 1.0,
                ..certain_transmission()
            },
            0.0,
        );
        context.add_house(0.0, 0.0, false);
        let human = context.add_human(HouseId(0)).unwrap();
        context.infect_human(human, 0, true).unwrap();
        context.add_mosquito(HouseId(0)).unwrap();
        assert_eq!(
            bite_and_transmit(&mut context, 1)
                .unwrap()
                .mosquito_infections,
            0
        );
    }
}
