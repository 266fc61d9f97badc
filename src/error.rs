use crate::sysexits;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving options, retrieving control data or
/// planning compressions.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Cannot read config file {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path:?}, line {line_no}: {line}")]
    ConfigParse {
        path: PathBuf,
        line_no: usize,
        line: String,
    },

    #[error("Config files nested deeper than {limit} levels (at {path:?})")]
    ConfigRecursion { path: PathBuf, limit: usize },

    #[error("{0}")]
    InvalidArguments(String),

    #[error("Invalid option specification: {0}")]
    InvalidOptionSpec(String),

    #[error("Mandatory option --{option} was not given")]
    MissingMandatoryOption { option: String },

    #[error("Invalid log template '{template}'")]
    LogTemplate { template: String },

    #[error("Cannot open log file {path:?}: {source}")]
    LogOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("Running '{command}' failed: {reason}")]
    StatusCommandFailure { command: String, reason: String },

    #[error("Cannot parse status line '{line}' in output:\n{response}")]
    UnparseableStatusLine { line: String, response: String },

    #[error("Status output lacks mandatory field '{field}'")]
    MissingStatusField { field: String },

    #[error("No destinations configured, nothing to compress for")]
    NoDestinations,

    #[error("Invalid destination '{0}'")]
    InvalidDestination(String),

    #[error("Cannot load destinations from {path:?}: {reason}")]
    DestinationFile { path: PathBuf, reason: String },
}

impl Error {
    /// Exit status a program should terminate with when this error is fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidArguments(_) => sysexits::EX_USAGE_ERROR,
            Error::ConfigRead { .. }
            | Error::ConfigParse { .. }
            | Error::ConfigRecursion { .. }
            | Error::MissingMandatoryOption { .. }
            | Error::LogTemplate { .. }
            | Error::InvalidDestination(_)
            | Error::DestinationFile { .. } => sysexits::EX_CONFIG,
            Error::LogOpen { .. } | Error::TempDir(_) => sysexits::EX_IOERR,
            Error::StatusCommandFailure { .. }
            | Error::UnparseableStatusLine { .. }
            | Error::MissingStatusField { .. } => sysexits::EX_UNAVAILABLE,
            Error::InvalidOptionSpec(_) | Error::NoDestinations => sysexits::EX_SOFTWARE,
        }
    }
}

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
