//! Console presentation of a test run
//!
//! The runtime reports progress through `ProgressSink`; this module turns it
//! into the lines a developer watches in a terminal.

pub mod reporter;

pub use reporter::ConsoleReporter;

/// Serializes tests that toggle the process-wide color override
#[cfg(test)]
pub(crate) static COLOR_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
