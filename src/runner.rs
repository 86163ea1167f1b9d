use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Args, Command, FromArgMatches as _};
use log::info;

use crate::context::Context;
use crate::error::SimulationError;
use crate::log::LogSettings;
use crate::parameters::{ContextParametersExt, ScenarioInput, ScenarioPreset};
use crate::random::ContextRandomExt;
use crate::report::ContextReportExt;
use crate::simulation;
use crate::stats_report;

/// Default cli arguments for a model run
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Optional path to a JSON scenario file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Optional directory for the output tables
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Optional prefix for the output file names
    #[arg(long)]
    pub file_prefix: Option<String>,

    /// Overwrite existing output files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Log level: a level (e.g. `info`) or `module=level` pairs separated by commas
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Show a progress bar of the simulated days
    #[cfg(feature = "progress_bar")]
    #[arg(long)]
    pub progress: bool,
}

/// Scenario settings. Each one overrides the preset and the scenario file.
#[derive(Args, Debug, Default)]
pub struct ScenarioArgs {
    /// Start from one of the preset scenarios
    #[arg(long, value_enum)]
    pub preset: Option<ScenarioPreset>,

    /// Number of humans
    #[arg(long, allow_negative_numbers = true)]
    pub humans: Option<i64>,

    /// Number of mosquitoes
    #[arg(long, allow_negative_numbers = true)]
    pub mosquitoes: Option<i64>,

    /// Number of houses
    #[arg(long, allow_negative_numbers = true)]
    pub houses: Option<i64>,

    /// Number of simulated days
    #[arg(long, allow_negative_numbers = true)]
    pub days: Option<i64>,

    /// Temperature in degrees Celsius
    #[arg(long, allow_negative_numbers = true)]
    pub temperature: Option<f64>,

    /// Fraction of houses with an insecticide-treated net
    #[arg(long)]
    pub itn_coverage: Option<f64>,

    /// Efficacy of the insecticide on the nets
    #[arg(long)]
    pub itn_efficacy: Option<f64>,

    /// Fraction of new infections that are treated
    #[arg(long)]
    pub treatment_rate: Option<f64>,
}

impl ScenarioArgs {
    /// Build the scenario: defaults, then the preset, then the scenario
    /// file, then the flags given on the command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario file cannot be read or parsed.
    pub fn build_input(&self, config: Option<&Path>) -> Result<ScenarioInput, SimulationError> {
        let mut input = ScenarioInput::default();
        if let Some(preset) = self.preset {
            preset.apply(&mut input);
        }
        if let Some(path) = config {
            info!("loading scenario from {}", path.display());
            input = input.overlay_file(path)?;
        }

        let counts = [
            (self.humans, &mut input.human_population),
            (self.mosquitoes, &mut input.mosquito_population),
            (self.houses, &mut input.num_houses),
            (self.days, &mut input.num_days),
        ];
        for (flag, field) in counts {
            if let Some(value) = flag {
                *field = value;
            }
        }
        let values = [
            (self.temperature, &mut input.temperature),
            (self.itn_coverage, &mut input.itn_coverage),
            (self.itn_efficacy, &mut input.itn_efficacy),
            (self.treatment_rate, &mut input.treatment_rate),
        ];
        for (flag, field) in values {
            if let Some(value) = flag {
                *field = value;
            }
        }
        Ok(input)
    }
}

fn create_cli() -> Command {
    let cli = Command::new("malaria_sim")
        .about("Spatial agent-based model of malaria transmission between humans and mosquitoes");
    BaseArgs::augment_args(cli)
}

/// Runs a simulation with custom cli arguments.
///
/// The arguments are parsed from the process command line. The setup function
/// receives a `Context` whose seed, logging and report options are already
/// configured; the context is executed after it returns.
///
/// # Errors
///
/// Returns an `ArgumentError` if parsing fails, otherwise the error of the
/// setup function.
pub fn run_with_custom_args<A, F>(setup_fn: F) -> Result<Context, SimulationError>
where
    A: Args,
    F: FnOnce(&mut Context, &BaseArgs, Option<A>) -> Result<(), SimulationError>,
{
    run_with_custom_args_from(std::env::args_os(), setup_fn)
}

/// Like `run_with_custom_args`, with an explicit argument list (the first
/// item is the program name).
///
/// # Errors
///
/// Returns an `ArgumentError` if parsing fails, otherwise the error of the
/// setup function.
pub fn run_with_custom_args_from<I, T, A, F>(
    args: I,
    setup_fn: F,
) -> Result<Context, SimulationError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    A: Args,
    F: FnOnce(&mut Context, &BaseArgs, Option<A>) -> Result<(), SimulationError>,
{
    let matches = A::augment_args(create_cli()).try_get_matches_from(args)?;
    let base_args = BaseArgs::from_arg_matches(&matches)?;
    let custom_args = A::from_arg_matches(&matches)?;
    run_with_args_internal(&base_args, Some(custom_args), setup_fn)
}

fn run_with_args_internal<A, F>(
    args: &BaseArgs,
    custom_args: Option<A>,
    setup_fn: F,
) -> Result<Context, SimulationError>
where
    F: FnOnce(&mut Context, &BaseArgs, Option<A>) -> Result<(), SimulationError>,
{
    if let Some(log_level) = &args.log_level {
        LogSettings::parse(log_level)?.apply();
    }

    let mut context = Context::new();

    let report_config = context.report_options();
    if let Some(output_dir) = &args.output_dir {
        report_config.directory(output_dir.clone());
    }
    if let Some(file_prefix) = &args.file_prefix {
        report_config.file_prefix(file_prefix.clone());
    }
    report_config.overwrite(args.force_overwrite);

    context.init_random(args.random_seed);

    setup_fn(&mut context, args, custom_args)?;

    context.execute();
    Ok(context)
}

/// The paths of the two tables written by a run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub global_stats: PathBuf,
    pub house_infected: PathBuf,
}

/// Parse `args`, run the scenario they describe and write its tables.
///
/// Output files are checked before the run and only written after it
/// succeeded, so a failing run leaves no tables behind.
///
/// # Errors
///
/// Returns the first argument, configuration, computation or I/O error.
pub fn run_malaria_from<I, T>(args: I) -> Result<RunOutput, SimulationError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let mut context =
        run_with_custom_args_from(args, |context, base_args, scenario: Option<ScenarioArgs>| {
            let input = scenario
                .unwrap_or_default()
                .build_input(base_args.config.as_deref())?;
            context.init_parameters(&input)?;
            stats_report::init_reports(context)?;
            simulation::init(context)?;

            let parameters = context.get_parameters()?;
            info!(
                "simulating {} humans, {} mosquitoes and {} houses for {} days (seed {})",
                parameters.num_humans,
                parameters.num_mosquitoes,
                parameters.num_houses,
                parameters.num_days,
                base_args.random_seed
            );
            #[cfg(feature = "progress_bar")]
            if base_args.progress {
                #[allow(clippy::cast_precision_loss)]
                let max_time = parameters.num_days as f64;
                crate::progress::init_timeline_progress_bar(max_time);
            }
            Ok(())
        })?;

    let tables = simulation::finish(&mut context)?;
    let (global_stats, house_infected) = stats_report::write_reports(&context, &tables)?;
    info!(
        "wrote {} and {}",
        global_stats.display(),
        house_infected.display()
    );
    Ok(RunOutput {
        global_stats,
        house_infected,
    })
}

/// Run the model from the process command line.
///
/// # Errors
///
/// See `run_malaria_from`.
pub fn run_malaria() -> Result<RunOutput, SimulationError> {
    run_malaria_from(std::env::args_os())
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::define_rng;

    #[derive(Args, Debug)]
    struct CustomArgs {
        #[arg(long, default_value = "0")]
        field: u32,
    }

    #[test]
    fn custom_args_reach_setup() {
        let result = run_with_custom_args_from(
            ["malaria_sim", "--field", "42"],
            |_, _, custom: Option<CustomArgs>| {
                assert_eq!(custom.unwrap().field, 42);
                Ok(())
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn bad_arguments_are_argument_errors() {
        let result = run_with_custom_args_from(
            ["malaria_sim", "--no-such-flag"],
            |_, _, _: Option<CustomArgs>| Ok(()),
        );
        assert!(matches!(result, Err(SimulationError::ArgumentError(_))));
    }

    #[test]
    fn random_seed_is_applied() {
        define_rng!(RunnerTestRng);
        let mut compare = Context::new();
        compare.init_random(42);
        let args = BaseArgs {
            random_seed: 42,
            ..BaseArgs::default()
        };
        let result = run_with_args_internal(&args, None, |context, _, _: Option<()>| {
            assert_eq!(
                context.sample_range(RunnerTestRng, 0..1000),
                compare.sample_range(RunnerTestRng, 0..1000)
            );
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn report_options_are_applied() {
        let args = BaseArgs {
            output_dir: Some(PathBuf::from("data")),
            file_prefix: Some("baseline_".to_string()),
            force_overwrite: true,
            ..BaseArgs::default()
        };
        let result = run_with_args_internal(&args, None, |context, _, _: Option<()>| {
            let options = context.report_options();
            assert_eq!(options.directory, PathBuf::from("data"));
            assert_eq!(options.file_prefix, "baseline_");
            assert!(options.overwrite);
            Ok(())
        });
        assert!(result.is_ok());
    }

    #[test]
    fn setup_errors_are_returned() {
        let result = run_with_args_internal(&BaseArgs::default(), None, |_, _, _: Option<()>| {
            Err(SimulationError::configuration("no scenario"))
        });
        assert!(matches!(result, Err(SimulationError::ConfigurationError(_))));
    }

    #[test]
    fn flags_override_preset_and_file() {
        let temp_dir = tempdir().unwrap();
        let config = temp_dir.path().join("scenario.json");
        std::fs::write(&config, r#"{"numHouses": 75, "temperature": 27.0, "numDays": 30}"#)
            .unwrap();
        let scenario = ScenarioArgs {
            preset: Some(ScenarioPreset::Urban),
            days: Some(12),
            itn_coverage: Some(0.5),
            ..ScenarioArgs::default()
        };
        let input = scenario.build_input(Some(&config)).unwrap();
        // From the preset
        assert_eq!(input.human_population, 20_000);
        // From the file, over the preset
        assert_eq!(input.num_houses, 75);
        assert_approx_eq!(input.temperature, 27.0);
        // From the flags, over the file
        assert_eq!(input.num_days, 12);
        assert_approx_eq!(input.itn_coverage, 0.5);
    }

    #[test]
    fn run_writes_both_tables() {
        let temp_dir = tempdir().unwrap();
        let output = run_malaria_from([
            "malaria_sim",
            "--output-dir",
            temp_dir.path().to_str().unwrap(),
            "--humans",
            "100",
            "--mosquitoes",
            "200",
            "--houses",
            "5",
            "--days",
            "3",
        ])
        .unwrap();
        assert_eq!(output.global_stats, temp_dir.path().join("global_stats.csv"));
        let global = std::fs::read_to_string(output.global_stats).unwrap();
        assert_eq!(global.lines().count(), 4);
        let houses = std::fs::read_to_string(output.house_infected).unwrap();
        assert_eq!(houses.lines().count(), 16);
    }

    #[test]
    fn invalid_scenario_writes_nothing() {
        let temp_dir = tempdir().unwrap();
        let result = run_malaria_from([
            "malaria_sim",
            "--output-dir",
            temp_dir.path().to_str().unwrap(),
            "--humans",
            "-10",
        ]);
        assert!(matches!(result, Err(SimulationError::ConfigurationError(_))));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}
