//! Mosquito incubation, mortality with replacement, and dispersal.
//!
//! Dispersal moves a surviving mosquito to a house chosen with weight
//! `exp(-dispersalDistanceFactor * distance)`, the current house included.
//! Houses with a net have weight 0, so mosquitoes never move into them. A
//! house's weights are computed the first time a mosquito disperses from it
//! and cached for the rest of the run; with dispersal off none are built.
use log::{debug, trace};
use rand::distr::weighted::WeightedIndex;

use crate::context::Context;
use crate::define_data_plugin;
use crate::define_rng;
use crate::error::SimulationError;
use crate::hashing::HashMap;
use crate::houses::{ContextHousesExt, HouseId};
use crate::mosquitoes::{ContextMosquitoesExt, MosquitoSlot, MosquitoState};
use crate::parameters::ContextParametersExt;
use crate::random::ContextRandomExt;

define_rng!(MosquitoMortalityRng);
define_rng!(DispersalRng);

struct DispersalKernel {
    // Set by `init`; the house count the cached rows were built for.
    num_houses: Option<usize>,
    // Destination distribution per source house; `None` when every
    // destination has weight 0.
    rows: HashMap<HouseId, Option<WeightedIndex<f64>>>,
}

define_data_plugin!(
    DispersalPlugin,
    DispersalKernel,
    DispersalKernel {
        num_houses: None,
        rows: HashMap::default(),
    }
);

/// Prepare dispersal over the houses of the registry.
///
/// # Errors
///
/// Returns a `ConfigurationError` if the parameters were not set.
pub fn init(context: &mut Context) -> Result<(), SimulationError> {
    trace!("initializing mosquito dispersal");
    let dispersal_prob = context.get_parameters()?.mosquito_dispersal_prob;
    let num_houses = context.get_house_count();
    let kernel = context.get_data_container_mut(DispersalPlugin);
    kernel.num_houses = Some(num_houses);
    kernel.rows.clear();
    if dispersal_prob <= 0.0 {
        debug!("mosquito dispersal is off");
    }
    Ok(())
}

// Builds and caches the destination weights of `from` unless already cached.
fn cache_row(context: &mut Context, from: HouseId) -> Result<(), SimulationError> {
    if context
        .get_data_container(DispersalPlugin)
        .is_some_and(|kernel| kernel.rows.contains_key(&from))
    {
        return Ok(());
    }
    let distance_factor = context.get_parameters()?.dispersal_distance_factor;
    let origin = context.get_house(from)?;
    let weights = context.get_houses().iter().map(|to| {
        if to.has_itn {
            0.0
        } else {
            (-distance_factor * origin.distance_to(to)).exp()
        }
    });
    let row = WeightedIndex::new(weights).ok();
    if row.is_none() {
        debug!("dispersal is impossible from house {from}");
    }
    context
        .get_data_container_mut(DispersalPlugin)
        .rows
        .insert(from, row);
    Ok(())
}

/// Exposed mosquitoes that have incubated for `extrinsicIncubationPeriod`
/// days become Infectious. Returns how many did.
///
/// # Errors
///
/// Returns a `ComputationError` if a state change is invalid.
pub fn advance_incubation(context: &mut Context, day: usize) -> Result<usize, SimulationError> {
    let incubation_period = context.get_parameters()?.extrinsic_incubation_period;
    let ready: Vec<MosquitoSlot> = context
        .get_mosquitoes()
        .iter()
        .enumerate()
        .filter(|(_, mosquito)| {
            mosquito.state == MosquitoState::Exposed
                && day.saturating_sub(mosquito.state_entry_day) >= incubation_period
        })
        .map(|(slot, _)| MosquitoSlot(slot))
        .collect();
    for &slot in &ready {
        context.set_mosquito_state(slot, MosquitoState::Infectious, day)?;
    }
    Ok(ready.len())
}

/// Each mosquito dies with the daily mortality probability, raised by the
/// insecticide at a house with a net. Dead mosquitoes are replaced in place
/// by Susceptible newcomers. Returns the replaced slots in increasing order.
///
/// # Errors
///
/// Returns a `ComputationError` if a mosquito references a missing house.
pub fn apply_mortality(
    context: &mut Context,
    day: usize,
) -> Result<Vec<MosquitoSlot>, SimulationError> {
    let parameters = context.get_parameters()?;
    let base_mortality = parameters.mosquito_mortality;
    let itn_mortality = parameters.itn_mosquito_mortality();

    let mut deaths = Vec::new();
    for (slot, mosquito) in context.get_mosquitoes().iter().enumerate() {
        let mortality = if context.get_house(mosquito.house_id)?.has_itn {
            itn_mortality
        } else {
            base_mortality
        };
        if context.sample_bool(MosquitoMortalityRng, mortality) {
            deaths.push(MosquitoSlot(slot));
        }
    }
    for &slot in &deaths {
        context.replace_mosquito(slot, day)?;
    }
    debug!("day {day}: {} mosquitoes died and were replaced", deaths.len());
    Ok(deaths)
}

/// Move surviving mosquitoes between houses. `replaced` are the slots filled
/// by newcomers today (sorted), which stay where they are. Returns how many
/// mosquitoes changed house.
///
/// # Errors
///
/// Returns a `ComputationError` if `init` was not called for these houses.
pub fn disperse(context: &mut Context, replaced: &[MosquitoSlot]) -> Result<usize, SimulationError> {
    let dispersal_prob = context.get_parameters()?.mosquito_dispersal_prob;
    let num_houses = context
        .get_data_container(DispersalPlugin)
        .and_then(|kernel| kernel.num_houses);
    if num_houses != Some(context.get_house_count()) {
        return Err(SimulationError::computation(
            "the dispersal kernel does not match the houses",
        ));
    }
    if dispersal_prob <= 0.0 {
        return Ok(0);
    }

    let mut moves: Vec<(MosquitoSlot, HouseId)> = Vec::new();
    for slot in (0..context.get_mosquito_count()).map(MosquitoSlot) {
        if replaced.binary_search(&slot).is_ok()
            || !context.sample_bool(DispersalRng, dispersal_prob)
        {
            continue;
        }
        let from = context.get_mosquito(slot)?.house_id;
        cache_row(context, from)?;
        let Some(row) = context
            .get_data_container(DispersalPlugin)
            .and_then(|kernel| kernel.rows.get(&from))
            .and_then(Option::as_ref)
        else {
            continue;
        };
        let destination = HouseId(context.sample_distr(DispersalRng, row));
        if destination != from {
            moves.push((slot, destination));
        }
    }
    for &(slot, house_id) in &moves {
        context.move_mosquito(slot, house_id)?;
    }
    Ok(moves.len())
}
