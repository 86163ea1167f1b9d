//! Scenario configuration.
//!
//! A `ScenarioInput` is what a caller supplies, with the dashboard's camelCase
//! field names when read from JSON. `ScenarioInput::resolve` turns it into the
//! `ParametersValues` the model runs on: temperature is converted into daily
//! biting and mosquito mortality probabilities, and every value is checked
//! before any agent exists. The resolved values are stored in the `Parameters`
//! global property.
use std::fs;
use std::path::Path;

use log::{trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::define_global_property;
use crate::error::SimulationError;
use crate::global_properties::ContextGlobalPropertiesExt;

/// Temperature at which the biting and mortality rates take their base values.
pub const BASELINE_TEMPERATURE: f64 = 25.0;
const BASE_BITING_PROB: f64 = 0.3;
const BITING_SLOPE: f64 = 0.05;
const BASE_MOSQUITO_MORTALITY: f64 = 0.1;
const MORTALITY_SLOPE: f64 = 0.03;

/// Daily probability that a mosquito bites, before clamping to [0, 1]
#[must_use]
pub fn biting_probability(temperature: f64) -> f64 {
    BASE_BITING_PROB * (1.0 + (temperature - BASELINE_TEMPERATURE) * BITING_SLOPE)
}

/// Daily probability that a mosquito dies, before clamping to [0, 1]
#[must_use]
pub fn mosquito_mortality(temperature: f64) -> f64 {
    BASE_MOSQUITO_MORTALITY * (1.0 - (temperature - BASELINE_TEMPERATURE) * MORTALITY_SLOPE)
}

/// Disease and intervention constants that scenarios rarely change.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ModelConstants {
    /// P(infection) when an Infectious mosquito bites a Susceptible human
    pub mosquito_to_human_prob: f64,
    /// P(acquisition) when a Susceptible mosquito bites an Infected human
    pub human_to_mosquito_prob: f64,
    /// Days an untreated human stays Infected
    pub infectious_period: i64,
    /// Daily early-recovery probability while under treatment
    pub treated_recovery_prob: f64,
    /// Relative reduction of human to mosquito transmission while treated
    pub treatment_transmission_reduction: f64,
    /// Days a mosquito stays Exposed before it is Infectious
    pub extrinsic_incubation_period: i64,
    /// Insecticide kill probability scale at ITN houses
    pub itn_kill_prob: f64,
    /// Daily probability that a surviving mosquito changes foraging house
    pub mosquito_dispersal_prob: f64,
    /// Decay rate of the `exp(-factor * distance)` dispersal weight
    pub dispersal_distance_factor: f64,
    /// Side of the square that houses are placed in
    pub grid_size: f64,
    pub initial_human_infection_fraction: f64,
    pub initial_infectious_mosquito_fraction: f64,
}

impl Default for ModelConstants {
    fn default() -> Self {
        ModelConstants {
            mosquito_to_human_prob: 0.2,
            human_to_mosquito_prob: 0.1,
            infectious_period: 14,
            treated_recovery_prob: 3.0 / 14.0,
            treatment_transmission_reduction: 0.5,
            extrinsic_incubation_period: 10,
            itn_kill_prob: 0.3,
            mosquito_dispersal_prob: 0.1,
            dispersal_distance_factor: 0.1,
            grid_size: 100.0,
            initial_human_infection_fraction: 0.01,
            initial_infectious_mosquito_fraction: 0.01,
        }
    }
}

/// The externally supplied description of a scenario.
///
/// Integers are signed so that a negative population is reported as a
/// configuration error instead of failing to parse.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScenarioInput {
    pub human_population: i64,
    pub mosquito_population: i64,
    pub num_houses: i64,
    pub temperature: f64,
    pub num_days: i64,
    #[serde(default)]
    pub itn_coverage: f64,
    #[serde(default = "default_itn_efficacy")]
    pub itn_efficacy: f64,
    #[serde(default)]
    pub treatment_rate: f64,
    #[serde(default)]
    pub model: ModelConstants,
}

fn default_itn_efficacy() -> f64 {
    0.7
}

impl Default for ScenarioInput {
    fn default() -> Self {
        ScenarioInput {
            human_population: 10_000,
            mosquito_population: 10_000,
            num_houses: 100,
            temperature: BASELINE_TEMPERATURE,
            num_days: 500,
            itn_coverage: 0.0,
            itn_efficacy: default_itn_efficacy(),
            treatment_rate: 0.0,
            model: ModelConstants::default(),
        }
    }
}

/// The dashboard's preset settings. A preset sets populations, houses and
/// temperature, and switches interventions off; the horizon is kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioPreset {
    Urban,
    Rural,
    Epidemic,
}

impl ScenarioPreset {
    pub fn apply(self, input: &mut ScenarioInput) {
        let (humans, mosquitoes, houses, temperature) = match self {
            ScenarioPreset::Urban => (20_000, 15_000, 200, 28.0),
            ScenarioPreset::Rural => (5_000, 20_000, 50, 26.0),
            ScenarioPreset::Epidemic => (10_000, 30_000, 100, 30.0),
        };
        input.human_population = humans;
        input.mosquito_population = mosquitoes;
        input.num_houses = houses;
        input.temperature = temperature;
        input.itn_coverage = 0.0;
        input.treatment_rate = 0.0;
    }
}

/// The resolved, validated values a model run uses
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ParametersValues {
    pub num_humans: usize,
    pub num_mosquitoes: usize,
    pub num_houses: usize,
    pub num_days: usize,
    pub temperature: f64,
    /// Daily probability that a mosquito bites, clamped to [0, 1]
    pub biting_prob: f64,
    /// Daily probability that a mosquito dies, clamped to [0, 1]
    pub mosquito_mortality: f64,
    pub itn_coverage: f64,
    pub itn_efficacy: f64,
    pub treatment_rate: f64,
    pub mosquito_to_human_prob: f64,
    pub human_to_mosquito_prob: f64,
    pub infectious_period: usize,
    pub treated_recovery_prob: f64,
    pub treatment_transmission_reduction: f64,
    pub extrinsic_incubation_period: usize,
    pub itn_kill_prob: f64,
    pub mosquito_dispersal_prob: f64,
    pub dispersal_distance_factor: f64,
    pub grid_size: f64,
    pub initial_human_infection_fraction: f64,
    pub initial_infectious_mosquito_fraction: f64,
}

impl ParametersValues {
    /// Daily death probability of a mosquito foraging at an ITN house.
    ///
    /// The net blocks every bite; the insecticide adds to natural mortality.
    #[must_use]
    pub fn itn_mosquito_mortality(&self) -> f64 {
        self.mosquito_mortality
            + (1.0 - self.mosquito_mortality) * self.itn_efficacy * self.itn_kill_prob
    }

    /// P(a Susceptible mosquito acquires the parasite) when it bites an
    /// Infected human
    #[must_use]
    pub fn human_to_mosquito_prob_for(&self, under_treatment: bool) -> f64 {
        if under_treatment {
            self.human_to_mosquito_prob * (1.0 - self.treatment_transmission_reduction)
        } else {
            self.human_to_mosquito_prob
        }
    }
}

fn positive_count(name: &str, value: i64) -> Result<usize, SimulationError> {
    if value <= 0 {
        return Err(SimulationError::configuration(format!(
            "{name} must be > 0, got {value}"
        )));
    }
    usize::try_from(value)
        .map_err(|_| SimulationError::configuration(format!("{name} is too large: {value}")))
}

fn check_probability(name: &str, value: f64) -> Result<(), SimulationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimulationError::configuration(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

fn clamp_probability(name: &str, value: f64, temperature: f64) -> f64 {
    let clamped = value.clamp(0.0, 1.0);
    #[allow(clippy::float_cmp)]
    let changed = clamped != value;
    if changed {
        warn!("{name} {value} at {temperature} degrees is outside [0, 1]; using {clamped}");
    }
    clamped
}

/// Checks every range constraint of resolved values. Used as the validator
/// of the `Parameters` global property.
fn validate_parameters(values: &ParametersValues) -> Result<(), SimulationError> {
    let counts = [
        ("humanPopulation", values.num_humans),
        ("mosquitoPopulation", values.num_mosquitoes),
        ("numHouses", values.num_houses),
        ("numDays", values.num_days),
        ("infectiousPeriod", values.infectious_period),
        ("extrinsicIncubationPeriod", values.extrinsic_incubation_period),
    ];
    for (name, count) in counts {
        if count == 0 {
            return Err(SimulationError::configuration(format!("{name} must be > 0")));
        }
    }

    let probabilities = [
        ("bitingProb", values.biting_prob),
        ("mosquitoMortality", values.mosquito_mortality),
        ("itnCoverage", values.itn_coverage),
        ("itnEfficacy", values.itn_efficacy),
        ("treatmentRate", values.treatment_rate),
        ("mosquitoToHumanProb", values.mosquito_to_human_prob),
        ("humanToMosquitoProb", values.human_to_mosquito_prob),
        ("treatedRecoveryProb", values.treated_recovery_prob),
        (
            "treatmentTransmissionReduction",
            values.treatment_transmission_reduction,
        ),
        ("itnKillProb", values.itn_kill_prob),
        ("mosquitoDispersalProb", values.mosquito_dispersal_prob),
        (
            "initialHumanInfectionFraction",
            values.initial_human_infection_fraction,
        ),
        (
            "initialInfectiousMosquitoFraction",
            values.initial_infectious_mosquito_fraction,
        ),
    ];
    for (name, value) in probabilities {
        check_probability(name, value)?;
    }

    if !values.temperature.is_finite() {
        return Err(SimulationError::configuration(format!(
            "temperature must be finite, got {}",
            values.temperature
        )));
    }
    if !(values.grid_size.is_finite() && values.grid_size > 0.0) {
        return Err(SimulationError::configuration(format!(
            "gridSize must be finite and > 0, got {}",
            values.grid_size
        )));
    }
    if !(values.dispersal_distance_factor.is_finite() && values.dispersal_distance_factor >= 0.0)
    {
        return Err(SimulationError::configuration(format!(
            "dispersalDistanceFactor must be finite and >= 0, got {}",
            values.dispersal_distance_factor
        )));
    }
    Ok(())
}

define_global_property!(Parameters, ParametersValues, validate_parameters);

impl ScenarioInput {
    /// Convert to the values a run uses, clamping the temperature-derived
    /// probabilities to [0, 1].
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` naming the first out-of-domain field.
    pub fn resolve(&self) -> Result<ParametersValues, SimulationError> {
        if !self.temperature.is_finite() {
            return Err(SimulationError::configuration(format!(
                "temperature must be finite, got {}",
                self.temperature
            )));
        }
        let model = &self.model;
        let values = ParametersValues {
            num_humans: positive_count("humanPopulation", self.human_population)?,
            num_mosquitoes: positive_count("mosquitoPopulation", self.mosquito_population)?,
            num_houses: positive_count("numHouses", self.num_houses)?,
            num_days: positive_count("numDays", self.num_days)?,
            temperature: self.temperature,
            biting_prob: clamp_probability(
                "bitingProb",
                biting_probability(self.temperature),
                self.temperature,
            ),
            mosquito_mortality: clamp_probability(
                "mosquitoMortality",
                mosquito_mortality(self.temperature),
                self.temperature,
            ),
            itn_coverage: self.itn_coverage,
            itn_efficacy: self.itn_efficacy,
            treatment_rate: self.treatment_rate,
            mosquito_to_human_prob: model.mosquito_to_human_prob,
            human_to_mosquito_prob: model.human_to_mosquito_prob,
            infectious_period: positive_count("infectiousPeriod", model.infectious_period)?,
            treated_recovery_prob: model.treated_recovery_prob,
            treatment_transmission_reduction: model.treatment_transmission_reduction,
            extrinsic_incubation_period: positive_count(
                "extrinsicIncubationPeriod",
                model.extrinsic_incubation_period,
            )?,
            itn_kill_prob: model.itn_kill_prob,
            mosquito_dispersal_prob: model.mosquito_dispersal_prob,
            dispersal_distance_factor: model.dispersal_distance_factor,
            grid_size: model.grid_size,
            initial_human_infection_fraction: model.initial_human_infection_fraction,
            initial_infectious_mosquito_fraction: model.initial_infectious_mosquito_fraction,
        };
        validate_parameters(&values)?;
        Ok(values)
    }

    /// Layer a JSON document over this input. Fields missing from the document
    /// keep their current values; `model` is merged field by field.
    ///
    /// # Errors
    ///
    /// Returns a `JsonError` for malformed JSON, unknown fields or wrongly
    /// typed values.
    pub fn overlay_json(&self, json: &str) -> Result<ScenarioInput, SimulationError> {
        let overlay: Value = serde_json::from_str(json)?;
        let mut merged = serde_json::to_value(self)?;
        merge_json(&mut merged, overlay);
        Ok(serde_json::from_value(merged)?)
    }

    /// Layer a JSON scenario file over this input, see `overlay_json`.
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the file cannot be read, otherwise as
    /// `overlay_json`.
    pub fn overlay_file(&self, path: &Path) -> Result<ScenarioInput, SimulationError> {
        trace!("loading scenario from {}", path.display());
        self.overlay_json(&fs::read_to_string(path)?)
    }
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Read a scenario from a JSON file, defaulting every field it leaves out.
///
/// # Errors
///
/// Returns an `IoError` or `JsonError` if the file cannot be read or parsed.
pub fn load_scenario(path: &Path) -> Result<ScenarioInput, SimulationError> {
    ScenarioInput::default().overlay_file(path)
}

pub trait ContextParametersExt {
    /// Resolve `input` and store it as the `Parameters` of this run.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the scenario is out of domain.
    fn init_parameters(&mut self, input: &ScenarioInput) -> Result<(), SimulationError>;

    /// The resolved parameters of this run.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if `init_parameters` was never called.
    fn get_parameters(&self) -> Result<&ParametersValues, SimulationError>;
}

impl ContextParametersExt for Context {
    fn init_parameters(&mut self, input: &ScenarioInput) -> Result<(), SimulationError> {
        let values = input.resolve()?;
        trace!("resolved parameters {values:?}");
        self.set_global_property_value(Parameters, values)
    }

    fn get_parameters(&self) -> Result<&ParametersValues, SimulationError> {
        self.get_global_property_value(Parameters)
            .ok_or_else(|| SimulationError::configuration("scenario parameters were not set"))
    }
}
