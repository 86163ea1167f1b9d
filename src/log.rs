//! Logging for model runs.
//!
//! This is diagnostic output about what the simulation is doing. It is not to
//! be confused with _reporting_: the output tables are written by
//! `stats_report` and never go through the logger.
//!
//! The five `log` macros are re-exported. Logging is _disabled_ by default and
//! is switched on by the runner's `--log-level` option or from code:
//!
//! ```rust
//! use ixa_malaria::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! // Per-day summaries from every module...
//! set_log_level(LevelFilter::Debug);
//! // ...but every bite from the transmission manager.
//! set_module_filter("ixa_malaria::transmission_manager", LevelFilter::Trace);
//! ```
//!
//! With the `logging` feature, messages go to the console through `log4rs`.
//! Without it, only the `log` max level is maintained.
use std::collections::hash_map::Entry;
use std::sync::{LazyLock, Mutex, MutexGuard};

pub use log::{debug, error, info, trace, warn, LevelFilter};

use crate::error::SimulationError;
use crate::hashing::HashMap;

const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// The level filter applied to one module path (e.g. `"ixa_malaria::houses"`)
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    module: String,
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// Global level plus module filters, and the handle of the installed logger.
///
/// Loggers are installed process-wide, so there is a single instance behind
/// `LOG_CONFIGURATION`; the public API is the free functions below.
#[derive(Debug)]
struct LogConfiguration {
    global_log_level: LevelFilter,
    module_configurations: HashMap<String, ModuleLogConfiguration>,

    #[cfg(feature = "logging")]
    root_handle: Option<log4rs::Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations: HashMap::default(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.apply();
    }

    /// Returns true if the configuration changed.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().level == level {
                    return false;
                }
                entry.get_mut().level = level;
            }
            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let mut changed = false;
        for (module, level) in module_filters {
            changed |= self.insert_module_filter(module, *level);
        }
        if changed {
            self.apply();
        }
    }

    fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.apply();
        }
    }

    #[cfg(not(feature = "logging"))]
    fn apply(&mut self) {
        log::set_max_level(self.global_log_level);
    }

    /// Installs (or reconfigures) the `log4rs` console logger.
    #[cfg(feature = "logging")]
    fn apply(&mut self) {
        use log4rs::append::console::ConsoleAppender;
        use log4rs::config::{Appender, Logger, Root};
        use log4rs::encode::pattern::PatternEncoder;
        use log4rs::Config;

        // ISO 8601 timestamp and color coded level tag
        const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

        let console = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();
        let mut builder =
            Config::builder().appender(Appender::builder().build("console", Box::new(console)));
        for module_config in self.module_configurations.values() {
            builder = builder
                .logger(Logger::builder().build(module_config.module.clone(), module_config.level));
        }
        let root = Root::builder()
            .appender("console")
            .build(self.global_log_level);

        // Module names are plain strings and there is exactly one appender,
        // so building cannot fail on a name collision.
        let config = match builder.build(root) {
            Ok(config) => config,
            Err(e) => panic!("failed to build logging config: {e}"),
        };

        match self.root_handle {
            Some(ref handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.root_handle = Some(handle),
                // Another logger owns the process (e.g. a test harness);
                // only the max level can still be honored.
                Err(_) => log::set_max_level(self.global_log_level),
            },
        }
    }
}

/// Enables every log message. Equivalent to `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. `LevelFilter::Off` disables logging.
pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    get_log_configuration().set_module_filters(&[(module_path, level_filter)]);
}

/// Sets several module filters at once, reconfiguring the logger only once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    get_log_configuration().set_module_filters(module_filters);
}

/// Removes the filter of a module path so that the global level applies to it again.
pub fn remove_module_filter(module_path: &str) {
    get_log_configuration().remove_module_filter(module_path);
}

/// A parsed `--log-level` argument
#[derive(Debug, PartialEq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub module_filters: Vec<(String, LevelFilter)>,
}

impl LogSettings {
    /// Parses either a bare level (`info`) or a comma separated list of
    /// `module=level` pairs, optionally mixed with one bare level that sets
    /// the global level (`warn,ixa_malaria::houses=trace`).
    ///
    /// When only module filters are given, the global level is `Off` and
    /// just the named modules log.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for an unknown level name or an empty
    /// module path.
    pub fn parse(directives: &str) -> Result<Self, SimulationError> {
        let mut settings = LogSettings {
            level: LevelFilter::Off,
            module_filters: Vec::new(),
        };
        for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((module, level)) => {
                    let module = module.trim();
                    if module.is_empty() {
                        return Err(SimulationError::configuration(format!(
                            "missing module path in log directive '{directive}'"
                        )));
                    }
                    settings
                        .module_filters
                        .push((module.to_string(), parse_level(level)?));
                }
                None => settings.level = parse_level(directive)?,
            }
        }
        Ok(settings)
    }

    /// Installs these settings as the process logging configuration.
    pub fn apply(&self) {
        let filters: Vec<(&str, LevelFilter)> = self
            .module_filters
            .iter()
            .map(|(module, level)| (module.as_str(), *level))
            .collect();
        let mut configuration = get_log_configuration();
        configuration.set_module_filters(&filters);
        configuration.set_log_level(self.level);
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, SimulationError> {
    level.trim().parse::<LevelFilter>().map_err(|_| {
        SimulationError::configuration(format!(
            "unknown log level '{}' (expected off, error, warn, info, debug or trace)",
            level.trim()
        ))
    })
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    // A panic while holding the lock leaves the configuration itself intact.
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::{LazyLock, Mutex};

    use super::*;

    // The logger is process-wide; run these tests one at a time.
    static TEST_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(Mutex::default);

    #[test]
    fn set_log_level_updates_configuration() {
        let _guard = TEST_MUTEX.lock().unwrap();
        set_log_level(LevelFilter::Error);
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Error);
        error!("set_log_level_updates_configuration: global set to error");

        enable_logging();
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Trace);
        disable_logging();
        assert_eq!(get_log_configuration().global_log_level, LevelFilter::Off);
    }

    #[test]
    fn set_and_remove_module_filters() {
        let _guard = TEST_MUTEX.lock().unwrap();
        set_module_filters(&[
            ("ixa_malaria::houses", LevelFilter::Error),
            ("ixa_malaria::plan", LevelFilter::Debug),
        ]);
        set_module_filter("ixa_malaria::houses", LevelFilter::Warn);
        {
            let config = get_log_configuration();
            assert_eq!(
                config.module_configurations.get("ixa_malaria::houses"),
                Some(&("ixa_malaria::houses", LevelFilter::Warn).into())
            );
            assert_eq!(
                config.module_configurations.get("ixa_malaria::plan"),
                Some(&("ixa_malaria::plan", LevelFilter::Debug).into())
            );
        }

        remove_module_filter("ixa_malaria::houses");
        remove_module_filter("ixa_malaria::plan");
        let config = get_log_configuration();
        assert!(!config
            .module_configurations
            .contains_key("ixa_malaria::houses"));
        assert!(!config.module_configurations.contains_key("ixa_malaria::plan"));
    }

    #[test]
    fn parse_bare_level() {
        let settings = LogSettings::parse("info").unwrap();
        assert_eq!(settings.level, LevelFilter::Info);
        assert!(settings.module_filters.is_empty());
    }

    #[test]
    fn parse_module_directives() {
        let settings =
            LogSettings::parse("warn, ixa_malaria::houses=trace,ixa_malaria::plan=OFF").unwrap();
        assert_eq!(settings.level, LevelFilter::Warn);
        assert_eq!(
            settings.module_filters,
            vec![
                ("ixa_malaria::houses".to_string(), LevelFilter::Trace),
                ("ixa_malaria::plan".to_string(), LevelFilter::Off),
            ]
        );
    }

    #[test]
    fn parse_only_modules_keeps_global_off() {
        let settings = LogSettings::parse("ixa_malaria::simulation=debug").unwrap();
        assert_eq!(settings.level, LevelFilter::Off);
        assert_eq!(settings.module_filters.len(), 1);
    }

    #[test]
    fn parse_rejects_bad_directives() {
        assert!(matches!(
            LogSettings::parse("loud"),
            Err(SimulationError::ConfigurationError(_))
        ));
        assert!(matches!(
            LogSettings::parse("=debug"),
            Err(SimulationError::ConfigurationError(_))
        ));
    }
}
