//! Error taxonomy for the test host
//!
//! Argument errors live in the CLI (clap). Everything past argument parsing is
//! one of the types below. Only [`LoadError`] and [`HostError::NoTestsFound`]
//! abort a run; symbol and fault errors are absorbed per test.

use std::path::PathBuf;
use thiserror::Error;

/// The module could not be opened or its export table could not be read
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Module not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read module {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse export table of {path}: {reason}")]
    ExportTable { path: PathBuf, reason: String },

    #[error("Failed to load module {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },
}

/// A named entry point could not be turned into a callable address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("Symbol '{0}' is not in the module's symbol registry")]
    Unknown(String),

    #[error("Symbol '{symbol}' takes {actual} parameter(s), expected {expected}")]
    ArityMismatch {
        symbol: String,
        expected: usize,
        actual: usize,
    },

    #[error("Symbol '{symbol}' could not be resolved: {reason}")]
    Unresolved { symbol: String, reason: String },

    #[error("Symbol '{0}' resolved to a null address")]
    NullAddress(String),
}

/// The report document could not be produced or written
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to serialize report: {0}")]
    Xml(String),

    #[error("Failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Run-aborting failures surfaced to the caller of [`crate::TestHost::run`]
#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("No tests found in {module}{}", filter_suffix(.filter))]
    NoTestsFound {
        module: PathBuf,
        filter: Option<String>,
    },

    #[error(transparent)]
    Report(#[from] ReportError),
}

fn filter_suffix(filter: &Option<String>) -> String {
    match filter {
        Some(f) => format!(" matching '{}'", f),
        None => String::new(),
    }
}

/// Result type for host operations
pub type HostResult<T> = Result<T, HostError>;
