//! Unithost runtime
//!
//! Discovers and executes unit tests exported from a dynamically loaded module
//! built against the test macro layer, then writes a TRX results document.
//!
//! # Pipeline
//!
//! 1. [`ModuleHandle`] opens the module and lists its exports
//! 2. [`SymbolCatalog`] decodes and filters descriptor exports into a sorted run order
//! 3. [`AttributeResolver`] fetches optional ignore flags and tags per test
//! 4. [`TestInvoker`] drives one test's lifecycle through the [`ffi`] boundary
//! 5. [`ResultsAggregator`] collects one [`ExecutionRecord`] per test
//! 6. [`TrxWriter`] serializes the [`RunReport`]
//!
//! # Example
//!
//! ```no_run
//! use unithost_runtime::{NullProgress, RunConfig, TestHost};
//!
//! let config = RunConfig::new("./libsuite.so").with_filter("Parser");
//! let summary = TestHost::new(config).run(&mut NullProgress).unwrap();
//! println!("{} passed", summary.counters.passed);
//! ```

pub mod attributes;
pub mod catalog;
pub mod error;
pub mod ffi;
pub mod host;
pub mod invoker;
pub mod module;
pub mod report;
pub mod results;

#[cfg(test)]
pub(crate) mod test_support;

pub use attributes::{AttributeInfo, AttributeLookup, AttributeResolver};
pub use catalog::{DecodedSymbol, SymbolCatalog, TestDescriptor};
pub use error::{HostError, HostResult, LoadError, ReportError, SymbolError};
pub use host::{NullProgress, ProgressSink, RunConfig, RunSummary, TestHost};
pub use invoker::{TestInvoker, UNEXPECTED_FAULT_MESSAGE};
pub use module::{ExportTable, ModuleHandle};
pub use report::{format_duration, format_timestamp, RunReport, TrxWriter};
pub use results::{ExecutionRecord, IgnoreReason, Outcome, ResultsAggregator, RunCounters};
