//! Human agents.
//!
//! The human population is fixed for the run: humans are created once, keep
//! their house, and only change disease state. State changes are monotonic
//! (Susceptible, then Infected, then Recovered) and any other transition is
//! rejected as a `ComputationError`.
use std::fmt;

use log::trace;
use serde::Serialize;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimulationError;
use crate::houses::{ContextHousesExt, HouseId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct HumanId(pub usize);

impl fmt::Display for HumanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum HumanState {
    Susceptible,
    Infected,
    Recovered,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Human {
    pub id: HumanId,
    pub house_id: HouseId,
    pub state: HumanState,
    /// Day of the most recent state change
    pub infection_day: usize,
    /// Only meaningful while Infected
    pub under_treatment: bool,
}

/// Number of humans in each state
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HumanCounts {
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
}

impl HumanCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.infected + self.recovered
    }
}

struct HumansData {
    humans: Vec<Human>,
    // Residents of each house, indexed by `HouseId`
    residents: Vec<Vec<HumanId>>,
}

define_data_plugin!(
    HumansPlugin,
    HumansData,
    HumansData {
        humans: Vec::new(),
        residents: Vec::new(),
    }
);

pub trait ContextHumansExt {
    /// Add a Susceptible human living at `house_id`.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the house does not exist.
    fn add_human(&mut self, house_id: HouseId) -> Result<HumanId, SimulationError>;

    /// # Errors
    ///
    /// Returns a `ComputationError` if no human has this id.
    fn get_human(&self, human_id: HumanId) -> Result<&Human, SimulationError>;

    fn get_human_count(&self) -> usize;

    /// All humans in id order
    fn get_humans(&self) -> &[Human];

    /// The humans living at a house; empty for a house nobody lives in.
    fn get_residents(&self, house_id: HouseId) -> &[HumanId];

    /// Move a Susceptible human to Infected on `day`.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the human is not Susceptible.
    fn infect_human(
        &mut self,
        human_id: HumanId,
        day: usize,
        under_treatment: bool,
    ) -> Result<(), SimulationError>;

    /// Move an Infected human to Recovered on `day`.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the human is not Infected.
    fn recover_human(&mut self, human_id: HumanId, day: usize) -> Result<(), SimulationError>;

    fn count_human_states(&self) -> HumanCounts;

    /// Infected humans per house, indexed by `HouseId`
    fn count_infected_by_house(&self) -> Vec<usize>;
}

impl ContextHumansExt for Context {
    fn add_human(&mut self, house_id: HouseId) -> Result<HumanId, SimulationError> {
        let house_count = self.get_house_count();
        if house_id.0 >= house_count {
            return Err(SimulationError::computation(format!(
                "cannot place a human in house {house_id}, there are {house_count} houses"
            )));
        }
        let data = self.get_data_container_mut(HumansPlugin);
        if data.residents.len() < house_count {
            data.residents.resize_with(house_count, Vec::new);
        }
        let id = HumanId(data.humans.len());
        data.humans.push(Human {
            id,
            house_id,
            state: HumanState::Susceptible,
            infection_day: 0,
            under_treatment: false,
        });
        data.residents[house_id.0].push(id);
        Ok(id)
    }

    fn get_human(&self, human_id: HumanId) -> Result<&Human, SimulationError> {
        self.get_humans()
            .get(human_id.0)
            .ok_or_else(|| SimulationError::computation(format!("human {human_id} does not exist")))
    }

    fn get_human_count(&self) -> usize {
        self.get_humans().len()
    }

    fn get_humans(&self) -> &[Human] {
        self.get_data_container(HumansPlugin)
            .map(|data| data.humans.as_slice())
            .unwrap_or_default()
    }

    fn get_residents(&self, house_id: HouseId) -> &[HumanId] {
        self.get_data_container(HumansPlugin)
            .and_then(|data| data.residents.get(house_id.0))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn infect_human(
        &mut self,
        human_id: HumanId,
        day: usize,
        under_treatment: bool,
    ) -> Result<(), SimulationError> {
        let human = human_mut(self, human_id)?;
        if human.state != HumanState::Susceptible {
            return Err(SimulationError::computation(format!(
                "human {human_id} cannot be infected from state {:?}",
                human.state
            )));
        }
        trace!("human {human_id} infected on day {day} (treated: {under_treatment})");
        human.state = HumanState::Infected;
        human.infection_day = day;
        human.under_treatment = under_treatment;
        Ok(())
    }

    fn recover_human(&mut self, human_id: HumanId, day: usize) -> Result<(), SimulationError> {
        let human = human_mut(self, human_id)?;
        if human.state != HumanState::Infected {
            return Err(SimulationError::computation(format!(
                "human {human_id} cannot recover from state {:?}",
                human.state
            )));
        }
        trace!("human {human_id} recovered on day {day}");
        human.state = HumanState::Recovered;
        human.infection_day = day;
        human.under_treatment = false;
        Ok(())
    }

    fn count_human_states(&self) -> HumanCounts {
        let mut counts = HumanCounts::default();
        for human in self.get_humans() {
            match human.state {
                HumanState::Susceptible => counts.susceptible += 1,
                HumanState::Infected => counts.infected += 1,
                HumanState::Recovered => counts.recovered += 1,
            }
        }
        counts
    }

    fn count_infected_by_house(&self) -> Vec<usize> {
        let mut infected = vec![0; self.get_house_count()];
        for human in self.get_humans() {
            if human.state == HumanState::Infected {
                if let Some(count) = infected.get_mut(human.house_id.0) {
                    *count += 1;
                }
            }
        }
        infected
    }
}

fn human_mut(context: &mut Context, human_id: HumanId) -> Result<&mut Human, SimulationError> {
    context
        .get_data_container_mut(HumansPlugin)
        .humans
        .get_mut(human_id.0)
        .ok_or_else(|| SimulationError::computation(format!("human {human_id} does not exist")))
}
