use std::process::ExitCode;

use ixa_malaria::runner::run_malaria;
use ixa_malaria::SimulationError;

fn main() -> ExitCode {
    match run_malaria() {
        Ok(output) => {
            println!("{}", output.global_stats.display());
            println!("{}", output.house_infected.display());
            ExitCode::SUCCESS
        }
        // Help, version and usage errors are printed by clap
        Err(SimulationError::ArgumentError(error)) => error.exit(),
        Err(error) => {
            eprintln!("malaria_sim: {error}");
            ExitCode::FAILURE
        }
    }
}
