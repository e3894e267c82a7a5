//! Run command - execute the tests of one module

use crate::testing::ConsoleReporter;
use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;
use unithost_runtime::{format_duration, NullProgress, RunConfig, RunSummary, TestHost};

/// Arguments for a run, after merging flags with the environment
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Test module to load
    pub module: PathBuf,
    /// Substring filter on qualified test names
    pub filter: Option<String>,
    /// TRX output path
    pub trx: Option<PathBuf>,
    /// Verbose output (lifecycle lines and durations)
    pub verbose: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Output in JSON format
    pub json: bool,
}

impl RunArgs {
    fn to_config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.module);
        if let Some(filter) = &self.filter {
            config = config.with_filter(filter.as_str());
        }
        if let Some(trx) = &self.trx {
            config = config.with_output(trx);
        }
        config
    }
}

/// Run the tests; individual failures do not make this an error
pub fn run(args: RunArgs) -> Result<()> {
    let _plain = PlainOutput::enable(args.no_color);
    debug!(
        module = %args.module.display(),
        filter = ?args.filter,
        trx = ?args.trx,
        json = args.json,
        "starting run"
    );
    let host = TestHost::new(args.to_config());

    if args.json {
        let summary = host.run(&mut NullProgress)?;
        println!("{}", summary_json(&summary));
    } else {
        let mut reporter = ConsoleReporter::new(args.verbose);
        let summary = host.run(&mut reporter)?;
        reporter.report(&summary);
    }

    Ok(())
}

/// Forces uncolored output until dropped, on every exit path
struct PlainOutput;

impl PlainOutput {
    fn enable(no_color: bool) -> Option<Self> {
        no_color.then(|| {
            colored::control::set_override(false);
            PlainOutput
        })
    }
}

impl Drop for PlainOutput {
    fn drop(&mut self) {
        colored::control::unset_override();
    }
}

fn summary_json(summary: &RunSummary) -> serde_json::Value {
    let counters = &summary.counters;
    let results: Vec<_> = summary
        .report
        .records
        .iter()
        .map(|r| {
            json!({
                "name": r.qualified_name,
                "outcome": r.outcome.as_str(),
                "duration": format_duration(r.duration()),
                "message": r.failure_message,
            })
        })
        .collect();

    json!({
        "module": summary.report.module_path.display().to_string(),
        "total": counters.total,
        "executed": counters.executed,
        "passed": counters.passed,
        "failed": counters.failed,
        "error": counters.error,
        "not_executed": counters.not_executed,
        "ignored": counters.ignored,
        "ignored_on_platform": counters.ignored_on_platform,
        "results": results,
    })
}
