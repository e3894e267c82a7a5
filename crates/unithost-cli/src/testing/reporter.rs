//! Console reporter - progress lines while tests run, summary afterwards

use colored::*;
use unithost_runtime::{
    ExecutionRecord, IgnoreReason, Outcome, ProgressSink, RunCounters, RunSummary, TestDescriptor,
};

/// Prints one line per test and a summary at the end
pub struct ConsoleReporter {
    /// Show lifecycle start lines and per-test durations
    verbose: bool,
    failures: Vec<(String, String)>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            failures: Vec::new(),
        }
    }

    /// Summary and failure details after the run
    pub fn report(&self, summary: &RunSummary) {
        let counters = &summary.counters;

        println!();
        println!("{}", "─".repeat(50));
        println!("{}", headline(counters));
        println!(
            "Test result: {} | {} total, {} passed, {} failed, {} errors, {} not executed",
            status(counters),
            counters.total.to_string().bold(),
            counters.passed.to_string().green().bold(),
            if counters.failed > 0 {
                counters.failed.to_string().red().bold()
            } else {
                counters.failed.to_string().normal()
            },
            counters.error,
            counters.not_executed
        );

        self.print_failures();
    }

    /// Per-failure detail goes to stderr
    fn print_failures(&self) {
        if self.failures.is_empty() {
            return;
        }

        eprintln!();
        eprintln!("{}", "Failures:".red().bold());
        for (name, message) in &self.failures {
            eprintln!("  {} {}", "●".red(), name.bold());
            for line in message.lines() {
                eprintln!("      {}", line.dimmed());
            }
        }
    }
}

impl ProgressSink for ConsoleReporter {
    fn on_filter(&mut self, filter: &str) {
        println!("Applying filter {}", filter.bold());
    }

    fn on_discovered(&mut self, count: usize) {
        println!(
            "Found {} test{}",
            count.to_string().bold(),
            if count == 1 { "" } else { "s" }
        );
        println!();
    }

    fn on_test_started(&mut self, test: &TestDescriptor) {
        if self.verbose {
            println!("{} {}", "Calling Test".dimmed(), test.qualified_name);
        }
    }

    fn on_test_finished(&mut self, record: &ExecutionRecord) {
        println!("{}", progress_line(record, self.verbose));

        if record.is_failure() {
            self.failures.push((
                record.qualified_name.clone(),
                record.failure_message.clone().unwrap_or_default(),
            ));
        }
    }
}

fn progress_line(record: &ExecutionRecord, verbose: bool) -> String {
    let label = match record.outcome {
        Outcome::Passed => "PASS".green().bold(),
        Outcome::Failed => "FAIL".red().bold(),
        Outcome::Error => "ERROR".red().bold(),
        Outcome::NotExecuted => "IGNORED".yellow().bold(),
    };

    let mut line = format!("{} {}", label, record.qualified_name);
    if record.ignored == Some(IgnoreReason::ThisPlatform) {
        line.push_str(" (this platform)");
    }
    if verbose && record.outcome.is_executed() {
        let micros = record.duration().num_microseconds().unwrap_or(i64::MAX);
        line.push_str(&format!(" ({:.2}ms)", micros as f64 / 1000.0));
    }
    line
}

fn headline(counters: &RunCounters) -> String {
    let failed = counters.failed + counters.error;
    if failed > 0 {
        format!(
            "{} of {} tests failed",
            failed,
            counters.executed + counters.error
        )
    } else {
        let mut line = "All tests passed".to_string();
        if counters.ignored_on_platform > 0 {
            line.push_str(&format!(
                " ({} ignored on this platform)",
                counters.ignored_on_platform
            ));
        }
        line
    }
}

fn status(counters: &RunCounters) -> ColoredString {
    if counters.has_failures() {
        "FAILED".red().bold()
    } else {
        "PASSED".green().bold()
    }
}
