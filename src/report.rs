//! CSV output tables.
//!
//! A report is a `Serialize` row type registered with `define_report!`. The
//! output path of every report is resolved and checked when the report is
//! added, before the simulation starts, and rows are written in one pass
//! once the run has finished. `stage_report` writes the rows to a temporary
//! file next to the target and `StagedReport::commit` renames it into place,
//! so several tables can be written and then published together. A failed
//! run therefore never leaves a partially written table behind.
use std::any::TypeId;
use std::ffi::OsStr;
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

use csv::Writer;
use log::{debug, trace};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimulationError;
use crate::hashing::HashMap;

pub trait Report: Serialize + 'static {}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {}
    };
}
pub use define_report;

/// Where and how report files are written
#[derive(Debug, Clone)]
pub struct ConfigReportOptions {
    pub file_prefix: String,
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl ConfigReportOptions {
    #[must_use]
    pub fn new() -> Self {
        // Sets the defaults
        ConfigReportOptions {
            file_prefix: String::new(),
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }

    /// Sets the file prefix option (e.g., "baseline_")
    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ConfigReportOptions {
        self.file_prefix = file_prefix;
        self
    }

    /// Sets the directory where reports will be output
    pub fn directory(&mut self, directory: PathBuf) -> &mut ConfigReportOptions {
        self.directory = directory;
        self
    }

    /// Sets whether to overwrite existing reports of the same name if they exist
    pub fn overwrite(&mut self, overwrite: bool) -> &mut ConfigReportOptions {
        self.overwrite = overwrite;
        self
    }
}

impl Default for ConfigReportOptions {
    fn default() -> Self {
        Self::new()
    }
}

struct ReportData {
    file_paths: HashMap<TypeId, PathBuf>,
    config: ConfigReportOptions,
}

// Registers a data container that stores
// * file_paths: Maps report type to the resolved output file
// * config: Contains all the customizable filename options that the user supplies
define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_paths: HashMap::default(),
        config: ConfigReportOptions::new(),
    }
);

// Checks that the path names a CSV file and, unless `overwrite` is set, that
// it does not exist yet.
fn validate_filepath(path: &Path, overwrite: bool) -> Result<(), SimulationError> {
    if path.extension().and_then(OsStr::to_str) != Some("csv") {
        return Err(SimulationError::ReportError(format!(
            "report output files must be CSVs, got {}",
            path.display()
        )));
    }
    if !overwrite && path.exists() {
        return Err(SimulationError::ReportError(format!(
            "file already exists: {}. Please set `overwrite` to true in the file configuration and rerun.",
            path.display()
        )));
    }
    Ok(())
}

pub trait ContextReportExt {
    /// Returns the report options so they can be changed before reports are added
    fn report_options(&mut self) -> &mut ConfigReportOptions;

    /// Register a report type with the short name of its file. The file is
    /// `<directory>/<file_prefix><short_name>.csv`.
    ///
    /// # Errors
    ///
    /// Returns a `ReportError` if the file exists and `overwrite` is off.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), SimulationError>;

    /// The file a report type will be written to, if it was added
    fn get_report_path<T: Report>(&self) -> Option<&Path>;

    /// Write all rows of a report, header first, to a temporary file in the
    /// report's directory, creating the directory as needed. Nothing is
    /// visible at the report path until the returned report is committed.
    ///
    /// # Errors
    ///
    /// Returns an error if the report was never added or the file cannot be
    /// written.
    fn stage_report<T: Report>(&self, rows: &[T]) -> Result<StagedReport, SimulationError>;

    /// Stage and immediately commit a report. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns an error if the report was never added or the file cannot be
    /// written.
    fn write_report<T: Report>(&self, rows: &[T]) -> Result<PathBuf, SimulationError> {
        self.stage_report(rows)?.commit()
    }
}

/// A fully written report waiting to be moved to its path. Dropping it
/// without committing deletes the temporary file.
#[derive(Debug)]
pub struct StagedReport {
    file: NamedTempFile,
    path: PathBuf,
    overwrite: bool,
}

impl StagedReport {
    /// The path the report will be committed to
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move the report to its path. Without `overwrite` an existing file at
    /// the path is an error and stays untouched.
    ///
    /// # Errors
    ///
    /// Returns an `IoError` if the file cannot be moved.
    pub fn commit(self) -> Result<PathBuf, SimulationError> {
        let StagedReport {
            file,
            path,
            overwrite,
        } = self;
        if overwrite {
            file.persist(&path).map_err(|error| error.error)?;
        } else {
            file.persist_noclobber(&path).map_err(|error| error.error)?;
        }
        trace!("committed {}", path.display());
        Ok(path)
    }
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ConfigReportOptions {
        &mut self.get_data_container_mut(ReportPlugin).config
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), SimulationError> {
        trace!("adding report {short_name}");
        let data_container = self.get_data_container_mut(ReportPlugin);
        let config = &data_container.config;
        let path = config
            .directory
            .join(format!("{}{}.csv", config.file_prefix, short_name));
        validate_filepath(&path, config.overwrite)?;
        data_container.file_paths.insert(TypeId::of::<T>(), path);
        Ok(())
    }

    fn get_report_path<T: Report>(&self) -> Option<&Path> {
        self.get_data_container(ReportPlugin)?
            .file_paths
            .get(&TypeId::of::<T>())
            .map(PathBuf::as_path)
    }

    fn stage_report<T: Report>(&self, rows: &[T]) -> Result<StagedReport, SimulationError> {
        let data_container = self.get_data_container(ReportPlugin).ok_or_else(|| {
            SimulationError::ReportError("no file registered for the report type".to_string())
        })?;
        let path = data_container
            .file_paths
            .get(&TypeId::of::<T>())
            .ok_or_else(|| {
                SimulationError::ReportError("no file registered for the report type".to_string())
            })?
            .clone();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        create_dir_all(directory)?;

        let mut writer = Writer::from_writer(NamedTempFile::new_in(directory)?);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|error| SimulationError::IoError(error.into_error()))?;
        // Temporary files are created owner-only; tables are ordinary outputs.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }
        debug!("staged {} rows for {}", rows.len(), path.display());
        Ok(StagedReport {
            file,
            path,
            overwrite: data_container.config.overwrite,
        })
    }
}
