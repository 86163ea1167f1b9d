//! Daily aggregation and the two output tables.
//!
//! At the end of each day `record_day` appends one global row and one row per
//! house. Rows are kept in memory and only written, by `write_reports`, once
//! the whole run succeeded. The column layout of both files is fixed:
//!
//! * `global_stats.csv`: `day,S,I,R,E_m,I_m`
//! * `house_infected.csv`: `day,houseID,infected,x,y,hasITN`, with `x` and
//!   `y` printed with two decimals and `hasITN` as 0 or 1
use std::fs;
use std::path::PathBuf;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize, Serializer};

use crate::context::Context;
use crate::define_data_plugin;
use crate::define_report;
use crate::error::SimulationError;
use crate::houses::ContextHousesExt;
use crate::humans::ContextHumansExt;
use crate::mosquitoes::ContextMosquitoesExt;
use crate::parameters::ContextParametersExt;
use crate::report::ContextReportExt;

pub const GLOBAL_STATS_REPORT: &str = "global_stats";
pub const HOUSE_INFECTED_REPORT: &str = "house_infected";

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
pub struct DayRecord {
    pub day: usize,
    #[serde(rename = "S")]
    pub susceptible: usize,
    #[serde(rename = "I")]
    pub infected: usize,
    #[serde(rename = "R")]
    pub recovered: usize,
    #[serde(rename = "E_m")]
    pub exposed_mosquitoes: usize,
    #[serde(rename = "I_m")]
    pub infectious_mosquitoes: usize,
}

define_report!(DayRecord);

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct HouseDayRecord {
    pub day: usize,
    #[serde(rename = "houseID")]
    pub house_id: usize,
    pub infected: usize,
    #[serde(serialize_with = "two_decimals")]
    pub x: f64,
    #[serde(serialize_with = "two_decimals")]
    pub y: f64,
    #[serde(rename = "hasITN", serialize_with = "as_flag")]
    pub has_itn: bool,
}

define_report!(HouseDayRecord);

fn two_decimals<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

/// Every row produced by a run, in output order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatsTables {
    pub days: Vec<DayRecord>,
    pub houses: Vec<HouseDayRecord>,
}

define_data_plugin!(StatsPlugin, StatsTables, StatsTables::default());

pub trait ContextStatsExt {
    /// The rows recorded so far
    fn get_stats_tables(&self) -> Option<&StatsTables>;

    /// Remove and return the rows recorded so far
    fn take_stats_tables(&mut self) -> StatsTables;
}

impl ContextStatsExt for Context {
    fn get_stats_tables(&self) -> Option<&StatsTables> {
        self.get_data_container(StatsPlugin)
    }

    fn take_stats_tables(&mut self) -> StatsTables {
        std::mem::take(self.get_data_container_mut(StatsPlugin))
    }
}

/// Tally the end-of-day state and append the rows of `day`.
///
/// # Errors
///
/// Returns a `ComputationError` if the population broke one of its
/// invariants. Humans must sum to the population size, the mosquito
/// population must keep its size (so `E_m + I_m` never exceeds it), and the
/// per-house infected counts must add up to `I`.
pub fn record_day(context: &mut Context, day: usize) -> Result<(), SimulationError> {
    let parameters = context.get_parameters()?;
    let (num_humans, num_mosquitoes, num_houses) = (
        parameters.num_humans,
        parameters.num_mosquitoes,
        parameters.num_houses,
    );

    let humans = context.count_human_states();
    if humans.total() != num_humans {
        return Err(SimulationError::computation(format!(
            "day {day}: S + I + R = {} but the population is {num_humans}",
            humans.total()
        )));
    }
    let mosquitoes = context.count_mosquito_states();
    if mosquitoes.total() != num_mosquitoes {
        return Err(SimulationError::computation(format!(
            "day {day}: {} mosquitoes alive but the population is {num_mosquitoes}",
            mosquitoes.total()
        )));
    }
    let infected_by_house = context.count_infected_by_house();
    if infected_by_house.len() != num_houses {
        return Err(SimulationError::computation(format!(
            "day {day}: {} houses exist but {num_houses} were configured",
            infected_by_house.len()
        )));
    }
    let house_total: usize = infected_by_house.iter().sum();
    if house_total != humans.infected {
        return Err(SimulationError::computation(format!(
            "day {day}: houses hold {house_total} infected humans, I = {}",
            humans.infected
        )));
    }

    let house_rows: Vec<HouseDayRecord> = context
        .get_houses()
        .iter()
        .zip(&infected_by_house)
        .map(|(house, &infected)| HouseDayRecord {
            day,
            house_id: house.id.0,
            infected,
            x: house.x,
            y: house.y,
            has_itn: house.has_itn,
        })
        .collect();
    let day_row = DayRecord {
        day,
        susceptible: humans.susceptible,
        infected: humans.infected,
        recovered: humans.recovered,
        exposed_mosquitoes: mosquitoes.exposed,
        infectious_mosquitoes: mosquitoes.infectious,
    };
    debug!("{day_row:?}");

    let tables = context.get_data_container_mut(StatsPlugin);
    tables.days.push(day_row);
    tables.houses.extend(house_rows);
    Ok(())
}

/// Register both output files with the report options of `context`. This
/// fails early if either file exists and overwriting is off.
///
/// # Errors
///
/// Returns a `ReportError` if an output file is not writable as configured.
pub fn init_reports(context: &mut Context) -> Result<(), SimulationError> {
    trace!("registering output tables");
    context.add_report::<DayRecord>(GLOBAL_STATS_REPORT)?;
    context.add_report::<HouseDayRecord>(HOUSE_INFECTED_REPORT)?;
    Ok(())
}

/// Write both tables. Both are fully written before either appears, and a
/// failure leaves neither behind. Returns the paths written.
///
/// # Errors
///
/// Returns an error if the reports were not registered or a file cannot be
/// written.
pub fn write_reports(
    context: &Context,
    tables: &StatsTables,
) -> Result<(PathBuf, PathBuf), SimulationError> {
    let global = context.stage_report(&tables.days)?;
    let houses = context.stage_report(&tables.houses)?;
    let global = global.commit()?;
    match houses.commit() {
        Ok(houses) => Ok((global, houses)),
        Err(failure) => {
            if let Err(error) = fs::remove_file(&global) {
                warn!("could not remove {}: {error}", global.display());
            }
            Err(failure)
        }
    }
}
