//! The epidemic step engine.
//!
//! `init` builds the houses and populations and schedules the daily plans:
//! the step runs in the `Normal` phase of every day `0..numDays`, aggregation
//! in the `Last` phase of the same day, and a `First` phase shutdown at day
//! `numDays` ends the run before any work of that day. A step within a day
//! always runs these sub-steps in order:
//!
//! 1. biting and transmission
//! 2. mosquito incubation
//! 3. mosquito mortality with replacement, then dispersal of the survivors
//! 4. human recovery
//!
//! An error inside a plan stops the run; `finish` then returns it instead of
//! the tables.
use log::{error, info, trace};

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimulationError;
use crate::houses;
use crate::infection_manager;
use crate::mosquito_manager;
use crate::parameters::{ContextParametersExt, ScenarioInput};
use crate::plan::ExecutionPhase;
use crate::population_loader;
use crate::random::ContextRandomExt;
use crate::stats_report::{self, ContextStatsExt, StatsTables};
use crate::transmission_manager;

struct EngineState {
    failure: Option<SimulationError>,
}

define_data_plugin!(EnginePlugin, EngineState, EngineState { failure: None });

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn current_day(context: &Context) -> usize {
    context.get_current_time() as usize
}

// Keeps the first failure and stops the run.
fn fail(context: &mut Context, failure: SimulationError) {
    error!("day {}: {failure}", current_day(context));
    let state = context.get_data_container_mut(EnginePlugin);
    if state.failure.is_none() {
        state.failure = Some(failure);
    }
    context.shutdown();
}

/// Advance every agent by one day.
///
/// # Errors
///
/// Returns the first error of any sub-step; the day is then incomplete.
pub fn step_day(context: &mut Context, day: usize) -> Result<(), SimulationError> {
    transmission_manager::bite_and_transmit(context, day)?;
    mosquito_manager::advance_incubation(context, day)?;
    let replaced = mosquito_manager::apply_mortality(context, day)?;
    mosquito_manager::disperse(context, &replaced)?;
    infection_manager::progress_infections(context, day)?;
    Ok(())
}

/// Build the world and schedule the run. Parameters and the random seed must
/// be set first.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the parameters are missing, or any error
/// from building the houses and populations.
pub fn init(context: &mut Context) -> Result<(), SimulationError> {
    trace!("initializing simulation");
    let num_days = context.get_parameters()?.num_days;
    houses::init(context)?;
    population_loader::init(context)?;
    mosquito_manager::init(context)?;

    context.add_periodic_plan_with_phase(
        1.0,
        |context| {
            let day = current_day(context);
            if let Err(failure) = step_day(context, day) {
                fail(context, failure);
            }
        },
        ExecutionPhase::Normal,
    );
    context.add_periodic_plan_with_phase(
        1.0,
        |context| {
            let day = current_day(context);
            if let Err(failure) = stats_report::record_day(context, day) {
                fail(context, failure);
            }
        },
        ExecutionPhase::Last,
    );
    #[allow(clippy::cast_precision_loss)]
    let end = num_days as f64;
    context.add_plan_with_phase(end, Context::shutdown, ExecutionPhase::First);
    Ok(())
}

/// Collect the tables of an executed run.
///
/// # Errors
///
/// Returns the error that stopped the run, or a `ComputationError` if the run
/// ended early without one.
pub fn finish(context: &mut Context) -> Result<StatsTables, SimulationError> {
    if let Some(failure) = context.get_data_container_mut(EnginePlugin).failure.take() {
        return Err(failure);
    }
    let num_days = context.get_parameters()?.num_days;
    let num_houses = context.get_parameters()?.num_houses;
    let tables = context.take_stats_tables();
    if tables.days.len() != num_days || tables.houses.len() != num_days * num_houses {
        return Err(SimulationError::computation(format!(
            "the run recorded {} of {num_days} days",
            tables.days.len()
        )));
    }
    Ok(tables)
}

/// Run a whole scenario in memory and return its tables. The same input and
/// seed always give the same tables.
///
/// # Errors
///
/// Returns a `ConfigurationError` for an out-of-domain scenario, before any
/// agent is created, or a `ComputationError` if the run broke an invariant.
pub fn run_scenario(input: &ScenarioInput, seed: u64) -> Result<StatsTables, SimulationError> {
    let mut context = Context::new();
    context.init_random(seed);
    context.init_parameters(input)?;
    init(&mut context)?;
    info!("running scenario with seed {seed}");
    context.execute();
    let tables = finish(&mut context)?;
    info!("scenario finished after {} days", tables.days.len());
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humans::ContextHumansExt;

    fn scenario(num_days: i64) -> ScenarioInput {
        ScenarioInput {
            human_population: 200,
            mosquito_population: 400,
            num_houses: 10,
            num_days,
            ..ScenarioInput::default()
        }
    }

    #[test]
    fn run_records_every_day() {
        let tables = run_scenario(&scenario(7), 1).unwrap();
        assert_eq!(tables.days.len(), 7);
        assert_eq!(tables.houses.len(), 70);
        for (day, record) in tables.days.iter().enumerate() {
            assert_eq!(record.day, day);
        }
    }

    #[test]
    fn single_day_run() {
        let tables = run_scenario(&scenario(1), 5).unwrap();
        assert_eq!(tables.days.len(), 1);
        assert_eq!(tables.days[0].day, 0);
        assert_eq!(tables.houses.len(), 10);
    }

    #[test]
    fn same_seed_same_tables() {
        assert_eq!(
            run_scenario(&scenario(20), 17).unwrap(),
            run_scenario(&scenario(20), 17).unwrap()
        );
    }

    #[test]
    fn configuration_error_before_running() {
        let result = run_scenario(
            &ScenarioInput {
                num_houses: 0,
                ..scenario(5)
            },
            1,
        );
        assert!(matches!(result, Err(SimulationError::ConfigurationError(_))));
    }

    #[test]
    fn failure_in_a_plan_stops_the_run() {
        let mut context = Context::new();
        context.init_random(3);
        context.init_parameters(&scenario(10)).unwrap();
        init(&mut context).unwrap();
        // A human added behind the engine's back breaks S + I + R on day 2.
        context.add_plan(2.0, |context| {
            let house = crate::houses::HouseId(0);
            context.add_human(house).unwrap();
        });
        context.execute();

        assert!(context.is_shutdown_requested());
        assert!(matches!(
            finish(&mut context),
            Err(SimulationError::ComputationError(message)) if message.contains("day 2")
        ));
    }

    #[test]
    fn finish_rejects_a_truncated_run() {
        let mut context = Context::new();
        context.init_random(3);
        context.init_parameters(&scenario(10)).unwrap();
        init(&mut context).unwrap();
        context.add_plan_with_phase(4.0, Context::shutdown, ExecutionPhase::First);
        context.execute();
        assert!(matches!(
            finish(&mut context),
            Err(SimulationError::ComputationError(_))
        ));
    }
}
