//! Human disease progression and treatment.
//!
//! An Infected human recovers once `infectiousPeriod` days have passed since
//! infection. Treatment is decided once, when the human is infected; a
//! treated human may also recover earlier, with probability
//! `treatedRecoveryProb` on each day after the infection day. Recovered is
//! final, there is no reinfection.
use log::debug;

use crate::context::Context;
use crate::define_rng;
use crate::error::SimulationError;
use crate::humans::{ContextHumansExt, HumanId, HumanState};
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;

define_rng!(TreatmentRng);
define_rng!(RecoveryRng);

/// Decide whether a newly infected human is put under treatment.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the parameters were not set.
pub fn draw_treatment(context: &Context) -> Result<bool, SimulationError> {
    let treatment_rate = context.get_parameters()?.treatment_rate;
    Ok(context.sample_bool(TreatmentRng, treatment_rate))
}

/// Recover the Infected humans whose infection ends on `day`, in id order.
/// Returns how many recovered.
///
/// # Errors
///
/// Returns a `ComputationError` if a human state change is invalid.
pub fn progress_infections(context: &mut Context, day: usize) -> Result<usize, SimulationError> {
    let parameters = context.get_parameters()?;
    let infectious_period = parameters.infectious_period;
    let treated_recovery_prob = parameters.treated_recovery_prob;

    let mut recovering: Vec<HumanId> = Vec::new();
    for human in context.get_humans() {
        if human.state != HumanState::Infected {
            continue;
        }
        let days_infected = day.checked_sub(human.infection_day).ok_or_else(|| {
            SimulationError::computation(format!(
                "human {} was infected on day {}, after the current day {day}",
                human.id, human.infection_day
            ))
        })?;
        let recovers = days_infected >= infectious_period
            || (human.under_treatment
                && days_infected > 0
                && context.sample_bool(RecoveryRng, treated_recovery_prob));
        if recovers {
            recovering.push(human.id);
        }
    }

    for &human_id in &recovering {
        context.recover_human(human_id, day)?;
    }
    debug!("day {day}: {} humans recovered", recovering.len());
    Ok(recovering.len())
}
