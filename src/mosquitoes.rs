//! Mosquito agents.
//!
//! The mosquito population has a fixed number of slots. A mosquito that dies
//! is replaced in its slot by a new Susceptible individual at the same house,
//! so the population size never changes while individuals turn over. Each
//! individual gets a fresh `MosquitoId`.
//!
//! Disease states only move forward, Susceptible to Exposed to Infectious.
use std::fmt;

use log::trace;
use serde::Serialize;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimulationError;
use crate::houses::{ContextHousesExt, HouseId};

/// Identifies one individual mosquito over its lifetime
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MosquitoId(pub u64);

impl fmt::Display for MosquitoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A position in the mosquito population; replacements reuse the slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MosquitoSlot(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MosquitoState {
    Susceptible,
    Exposed,
    Infectious,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mosquito {
    pub id: MosquitoId,
    /// The house the mosquito currently forages at
    pub house_id: HouseId,
    pub state: MosquitoState,
    pub state_entry_day: usize,
}

/// Number of mosquitoes in each state
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MosquitoCounts {
    pub susceptible: usize,
    pub exposed: usize,
    pub infectious: usize,
}

impl MosquitoCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.susceptible + self.exposed + self.infectious
    }
}

struct MosquitoesData {
    slots: Vec<Mosquito>,
    next_id: u64,
}

define_data_plugin!(
    MosquitoesPlugin,
    MosquitoesData,
    MosquitoesData {
        slots: Vec::new(),
        next_id: 0,
    }
);

impl MosquitoesData {
    fn new_mosquito(&mut self, house_id: HouseId, day: usize) -> Mosquito {
        let id = MosquitoId(self.next_id);
        self.next_id += 1;
        Mosquito {
            id,
            house_id,
            state: MosquitoState::Susceptible,
            state_entry_day: day,
        }
    }

    fn slot_mut(&mut self, slot: MosquitoSlot) -> Result<&mut Mosquito, SimulationError> {
        self.slots.get_mut(slot.0).ok_or_else(|| {
            SimulationError::computation(format!("mosquito slot {} does not exist", slot.0))
        })
    }
}

fn check_house(context: &Context, house_id: HouseId) -> Result<(), SimulationError> {
    let house_count = context.get_house_count();
    if house_id.0 < house_count {
        Ok(())
    } else {
        Err(SimulationError::computation(format!(
            "house {house_id} does not exist, there are {house_count} houses"
        )))
    }
}

pub trait ContextMosquitoesExt {
    /// Add a Susceptible mosquito foraging at `house_id` in a new slot.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the house does not exist.
    fn add_mosquito(&mut self, house_id: HouseId) -> Result<MosquitoSlot, SimulationError>;

    /// # Errors
    ///
    /// Returns a `ComputationError` if the slot does not exist.
    fn get_mosquito(&self, slot: MosquitoSlot) -> Result<&Mosquito, SimulationError>;

    fn get_mosquito_count(&self) -> usize;

    /// All mosquitoes in slot order
    fn get_mosquitoes(&self) -> &[Mosquito];

    /// Advance the disease state of the mosquito in `slot` on `day`.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the transition is not a single step
    /// forward (Susceptible to Exposed, or Exposed to Infectious). Seeding an
    /// Infectious mosquito is done with `seed_infectious_mosquito`.
    fn set_mosquito_state(
        &mut self,
        slot: MosquitoSlot,
        state: MosquitoState,
        day: usize,
    ) -> Result<(), SimulationError>;

    /// Make a Susceptible mosquito Infectious on `day`, skipping incubation.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the mosquito is not Susceptible.
    fn seed_infectious_mosquito(
        &mut self,
        slot: MosquitoSlot,
        day: usize,
    ) -> Result<(), SimulationError>;

    /// The mosquito in `slot` dies and a new Susceptible one takes its place at
    /// the same house. Returns the id of the newcomer.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the slot does not exist.
    fn replace_mosquito(
        &mut self,
        slot: MosquitoSlot,
        day: usize,
    ) -> Result<MosquitoId, SimulationError>;

    /// Move the mosquito in `slot` to forage at another house.
    ///
    /// # Errors
    ///
    /// Returns a `ComputationError` if the slot or the house does not exist.
    fn move_mosquito(&mut self, slot: MosquitoSlot, house_id: HouseId)
        -> Result<(), SimulationError>;

    fn count_mosquito_states(&self) -> MosquitoCounts;
}

impl ContextMosquitoesExt for Context {
    fn add_mosquito(&mut self, house_id: HouseId) -> Result<MosquitoSlot, SimulationError> {
        check_house(self, house_id)?;
        let data = self.get_data_container_mut(MosquitoesPlugin);
        let mosquito = data.new_mosquito(house_id, 0);
        data.slots.push(mosquito);
        Ok(MosquitoSlot(data.slots.len() - 1))
    }

    fn get_mosquito(&self, slot: MosquitoSlot) -> Result<&Mosquito, SimulationError> {
        self.get_mosquitoes().get(slot.0).ok_or_else(|| {
            SimulationError::computation(format!("mosquito slot {} does not exist", slot.0))
        })
    }

    fn get_mosquito_count(&self) -> usize {
        self.get_mosquitoes().len()
    }

    fn get_mosquitoes(&self) -> &[Mosquito] {
        self.get_data_container(MosquitoesPlugin)
            .map(|data| data.slots.as_slice())
            .unwrap_or_default()
    }

    fn set_mosquito_state(
        &mut self,
        slot: MosquitoSlot,
        state: MosquitoState,
        day: usize,
    ) -> Result<(), SimulationError> {
        let mosquito = self.get_data_container_mut(MosquitoesPlugin).slot_mut(slot)?;
        let allowed = matches!(
            (mosquito.state, state),
            (MosquitoState::Susceptible, MosquitoState::Exposed)
                | (MosquitoState::Exposed, MosquitoState::Infectious)
        );
        if !allowed {
            return Err(SimulationError::computation(format!(
                "mosquito {} cannot go from {:?} to {state:?}",
                mosquito.id, mosquito.state
            )));
        }
        trace!("mosquito {} is {state:?} on day {day}", mosquito.id);
        mosquito.state = state;
        mosquito.state_entry_day = day;
        Ok(())
    }

    fn seed_infectious_mosquito(
        &mut self,
        slot: MosquitoSlot,
        day: usize,
    ) -> Result<(), SimulationError> {
        let mosquito = self.get_data_container_mut(MosquitoesPlugin).slot_mut(slot)?;
        if mosquito.state != MosquitoState::Susceptible {
            return Err(SimulationError::computation(format!(
                "mosquito {} is already {:?}",
                mosquito.id, mosquito.state
            )));
        }
        mosquito.state = MosquitoState::Infectious;
        mosquito.state_entry_day = day;
        Ok(())
    }

    fn replace_mosquito(
        &mut self,
        slot: MosquitoSlot,
        day: usize,
    ) -> Result<MosquitoId, SimulationError> {
        let data = self.get_data_container_mut(MosquitoesPlugin);
        let house_id = data.slot_mut(slot)?.house_id;
        let newcomer = data.new_mosquito(house_id, day);
        let id = newcomer.id;
        *data.slot_mut(slot)? = newcomer;
        Ok(id)
    }

    fn move_mosquito(
        &mut self,
        slot: MosquitoSlot,
        house_id: HouseId,
    ) -> Result<(), SimulationError> {
        check_house(self, house_id)?;
        self.get_data_container_mut(MosquitoesPlugin)
            .slot_mut(slot)?
            .house_id = house_id;
        Ok(())
    }

    fn count_mosquito_states(&self) -> MosquitoCounts {
        let mut counts = MosquitoCounts::default();
        for mosquito in self.get_mosquitoes() {
            match mosquito.state {
                MosquitoState::Susceptible => counts.susceptible += 1,
                MosquitoState::Exposed => counts.exposed += 1,
                MosquitoState::Infectious => counts.infectious += 1,
            }
        }
        counts
    }
}
