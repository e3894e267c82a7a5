//! CLI configuration via environment variables
//!
//! Flags on the command line always win over these.

use std::env;
use std::path::PathBuf;

/// CLI configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Default to JSON summary output (UNITHOST_JSON=1)
    pub default_json: bool,
    /// Disable colored output (UNITHOST_NO_COLOR=1 or NO_COLOR=1)
    pub no_color: bool,
    /// Default TRX report path (UNITHOST_TRX=/path/to/results.trx)
    pub default_trx: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            default_json: env::var("UNITHOST_JSON")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
            no_color: env::var("UNITHOST_NO_COLOR").is_ok() || env::var("NO_COLOR").is_ok(),
            default_trx: env::var("UNITHOST_TRX")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_truthy(value: &str) -> bool {
    let lower = value.to_lowercase();
    !(lower.is_empty() || lower == "0" || lower == "false" || lower == "off")
}
