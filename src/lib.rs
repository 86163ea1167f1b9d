//! A spatially explicit agent-based model of malaria transmission
//!
//! Humans live in houses scattered over a square grid and move through
//! Susceptible, Infected and Recovered. Mosquitoes forage at one house at a
//! time, move through Susceptible, Exposed and Infectious, die and are
//! replaced, and drift between nearby houses. Insecticide-treated nets block
//! biting at a house and raise mosquito mortality there; treatment shortens
//! human infections and lowers their infectiousness.
//!
//! The simulation is driven by a `Context` that is responsible for:
//! * Maintaining a notion of time, in days
//! * Scheduling plans to run at some point in the future and executing them
//!   at that time
//! * Holding module-specific data so that the module and other modules can
//!   access it
//! * Providing independent, seeded random number generators
//!
//! The model itself is a set of modules built on top of the `Context`:
//! * `houses`, `humans` and `mosquitoes` hold the agents.
//! * `population_loader` creates the populations and seeds the infection.
//! * `transmission_manager` runs the daily biting pass.
//! * `mosquito_manager` handles incubation, mortality and dispersal.
//! * `infection_manager` handles human recovery and treatment.
//! * `stats_report` aggregates each day into the two output tables.
//! * `simulation` ties the daily step together and `runner` provides the
//!   command line.
pub mod context;
pub mod error;
pub mod global_properties;
pub mod hashing;
pub mod log;
pub mod plan;
#[cfg(feature = "progress_bar")]
pub mod progress;
pub mod random;
pub mod report;
pub mod runner;

pub mod houses;
pub mod humans;
pub mod infection_manager;
pub mod mosquito_manager;
pub mod mosquitoes;
pub mod parameters;
pub mod population_loader;
pub mod simulation;
pub mod stats_report;
pub mod transmission_manager;

// Re-exports for use in macros
pub use paste;
pub use rand;

pub use crate::context::Context;
pub use crate::error::SimulationError;
pub use crate::global_properties::ContextGlobalPropertiesExt;
pub use crate::houses::{ContextHousesExt, HouseId};
pub use crate::humans::{ContextHumansExt, HumanId, HumanState};
pub use crate::mosquitoes::{ContextMosquitoesExt, MosquitoSlot, MosquitoState};
pub use crate::parameters::{
    load_scenario, ContextParametersExt, ModelConstants, ScenarioInput, ScenarioPreset,
};
pub use crate::plan::ExecutionPhase;
pub use crate::random::ContextRandomExt;
pub use crate::report::ContextReportExt;
pub use crate::runner::{run_malaria, run_malaria_from, BaseArgs, RunOutput, ScenarioArgs};
pub use crate::simulation::run_scenario;
pub use crate::stats_report::{DayRecord, HouseDayRecord, StatsTables};

pub mod prelude {
    pub use crate::context::Context;
    pub use crate::error::SimulationError;
    pub use crate::global_properties::ContextGlobalPropertiesExt;
    pub use crate::houses::ContextHousesExt;
    pub use crate::humans::ContextHumansExt;
    pub use crate::log::{debug, error, info, trace, warn};
    pub use crate::mosquitoes::ContextMosquitoesExt;
    pub use crate::parameters::ContextParametersExt;
    pub use crate::random::ContextRandomExt;
    pub use crate::report::ContextReportExt;
    pub use crate::stats_report::ContextStatsExt;
    pub use crate::{define_data_plugin, define_global_property, define_report, define_rng};
}
