use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `SimulationError` and maps other errors to
/// convert to a `SimulationError`
///
/// `ConfigurationError` covers every out-of-domain scenario parameter and is
/// always raised before the first simulated day. `ComputationError` is an
/// internal invariant violation detected while stepping the model; it aborts
/// the run and no output tables are written.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SimulationError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    ArgumentError(clap::Error),
    ConfigurationError(String),
    ComputationError(String),
    ReportError(String),
    DuplicateGlobalProperty(String),
}

impl SimulationError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SimulationError::ConfigurationError(message.into())
    }

    pub fn computation(message: impl Into<String>) -> Self {
        SimulationError::ComputationError(message.into())
    }
}

impl From<io::Error> for SimulationError {
    fn from(error: io::Error) -> Self {
        SimulationError::IoError(error)
    }
}

impl From<serde_json::Error> for SimulationError {
    fn from(error: serde_json::Error) -> Self {
        SimulationError::JsonError(error)
    }
}

impl From<csv::Error> for SimulationError {
    fn from(error: csv::Error) -> Self {
        SimulationError::CsvError(error)
    }
}

impl From<clap::Error> for SimulationError {
    fn from(error: clap::Error) -> Self {
        SimulationError::ArgumentError(error)
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::IoError(error) => Some(error),
            SimulationError::JsonError(error) => Some(error),
            SimulationError::CsvError(error) => Some(error),
            SimulationError::ArgumentError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SimulationError::IoError(error) => write!(f, "I/O error: {error}"),
            SimulationError::JsonError(error) => write!(f, "invalid scenario JSON: {error}"),
            SimulationError::CsvError(error) => write!(f, "CSV error: {error}"),
            SimulationError::ArgumentError(error) => write!(f, "{error}"),
            SimulationError::ConfigurationError(message) => {
                write!(f, "configuration error: {message}")
            }
            SimulationError::ComputationError(message) => {
                write!(f, "computation error: {message}")
            }
            SimulationError::ReportError(message) => write!(f, "report error: {message}"),
            SimulationError::DuplicateGlobalProperty(name) => {
                write!(f, "global property {name} is already set")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_display() {
        let error = SimulationError::configuration("numHouses must be > 0, got 0");
        assert_eq!(
            error.to_string(),
            "configuration error: numHouses must be > 0, got 0"
        );
    }

    #[test]
    fn io_error_converts_and_keeps_source() {
        let error: SimulationError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(error, SimulationError::IoError(_)));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn json_error_converts() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let error: SimulationError = parse.into();
        assert!(error.to_string().starts_with("invalid scenario JSON"));
    }
}
