//! Top-level run loop
//!
//! [`TestHost`] owns the module binding and the aggregator for the duration of
//! one run. Tests run sequentially in catalog order. The module is released
//! after the last test and before the report is written.
//!
//! Every run that gets past configuration writes a report when an output path
//! is set: a load failure or an empty catalog still produces a document with no
//! records and all counters at zero.

use crate::attributes::AttributeResolver;
use crate::catalog::{SymbolCatalog, TestDescriptor};
use crate::error::{HostError, HostResult};
use crate::invoker::TestInvoker;
use crate::module::{ExportTable, ModuleHandle};
use crate::report::{RunReport, TrxWriter};
use crate::results::{ExecutionRecord, ResultsAggregator, RunCounters};
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tracing::{info, warn};

/// Everything one run needs to know
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub module_path: PathBuf,
    /// Case-sensitive substring of qualified names to keep
    pub filter: Option<String>,
    /// Where to write the TRX document, if anywhere
    pub output_path: Option<PathBuf>,
}

impl RunConfig {
    pub fn new(module_path: impl Into<PathBuf>) -> Self {
        Self {
            module_path: module_path.into(),
            filter: None,
            output_path: None,
        }
    }

    /// An empty filter keeps every test and is stored as no filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}

/// Receives progress while a run is underway
///
/// All methods default to doing nothing.
pub trait ProgressSink {
    /// A non-empty filter is about to be applied
    fn on_filter(&mut self, _filter: &str) {}

    /// The catalog is built and holds `count` tests
    fn on_discovered(&mut self, _count: usize) {}

    /// A test that is not ignored is about to run
    fn on_test_started(&mut self, _test: &TestDescriptor) {}

    /// A test produced its record (including ignored tests)
    fn on_test_finished(&mut self, _record: &ExecutionRecord) {}
}

/// A [`ProgressSink`] that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: RunReport,
    pub counters: RunCounters,
}

/// Drives one run from module path to report
pub struct TestHost {
    config: RunConfig,
    writer: TrxWriter,
}

impl TestHost {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            writer: TrxWriter::new(),
        }
    }

    pub fn with_writer(mut self, writer: TrxWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Load the configured module and run it
    pub fn run(&self, sink: &mut dyn ProgressSink) -> HostResult<RunSummary> {
        let run_start = Local::now();
        info!(module = %self.config.module_path.display(), "starting run");

        match ModuleHandle::open(&self.config.module_path) {
            Ok(module) => self.execute(module, sink, run_start),
            Err(err) => {
                self.write_empty_report(run_start);
                Err(err.into())
            }
        }
    }

    /// Run against an already-open export table
    ///
    /// The table is consumed so it can be released before the report is written.
    pub fn run_module<T: ExportTable>(
        &self,
        table: T,
        sink: &mut dyn ProgressSink,
    ) -> HostResult<RunSummary> {
        self.execute(table, sink, Local::now())
    }

    fn execute<T: ExportTable>(
        &self,
        table: T,
        sink: &mut dyn ProgressSink,
        run_start: DateTime<Local>,
    ) -> HostResult<RunSummary> {
        let filter = self.config.filter.as_deref().filter(|f| !f.is_empty());
        if let Some(filter) = filter {
            sink.on_filter(filter);
        }

        let catalog = SymbolCatalog::build(&table, filter);
        if catalog.is_empty() {
            drop(table);
            self.write_empty_report(run_start);
            return Err(HostError::NoTestsFound {
                module: self.config.module_path.clone(),
                filter: filter.map(str::to_string),
            });
        }
        sink.on_discovered(catalog.len());

        let mut aggregator = ResultsAggregator::new();
        {
            let resolver = AttributeResolver::new(&catalog, &table);
            let invoker = TestInvoker::new(&catalog, &table);

            for test in catalog.tests() {
                let attributes = resolver.resolve(test);
                if !attributes.info.is_ignored() {
                    sink.on_test_started(test);
                }

                let record = invoker.run(test, &attributes);
                sink.on_test_finished(&record);
                aggregator.record(record);
            }
        }
        drop(table);

        let (records, counters) = aggregator.into_parts();
        let report = RunReport {
            module_path: self.config.module_path.clone(),
            run_start,
            run_end: Local::now(),
            records,
        };

        self.writer
            .write(&report, self.config.output_path.as_deref())?;

        info!(
            total = counters.total,
            passed = counters.passed,
            failed = counters.failed,
            error = counters.error,
            not_executed = counters.not_executed,
            "run finished"
        );

        Ok(RunSummary { report, counters })
    }

    /// Best effort: the run is already failing, a write problem is only logged
    fn write_empty_report(&self, run_start: DateTime<Local>) {
        let report = RunReport::empty(self.config.module_path.clone(), run_start);
        if let Err(err) = self
            .writer
            .write(&report, self.config.output_path.as_deref())
        {
            warn!(error = %err, "could not write empty report");
        }
    }
}
