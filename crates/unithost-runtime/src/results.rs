//! Execution records and the results aggregator

use crate::catalog::TestDescriptor;
use chrono::{DateTime, Local, TimeDelta};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Final state of one test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Passed,
    Failed,
    Error,
    NotExecuted,
}

impl Outcome {
    /// Name used in reports
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Passed => "Passed",
            Outcome::Failed => "Failed",
            Outcome::Error => "Error",
            Outcome::NotExecuted => "NotExecuted",
        }
    }

    /// Whether the test body was entered
    pub fn is_executed(self) -> bool {
        matches!(self, Outcome::Passed | Outcome::Failed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a test was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Always,
    ThisPlatform,
}

/// The outcome, timing and identity of one test in one run
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub test_id: Uuid,
    pub execution_id: Uuid,
    pub qualified_name: String,
    pub class_name: String,
    pub method_name: String,
    pub tags: BTreeMap<String, String>,
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub outcome: Outcome,
    pub failure_message: Option<String>,
    pub ignored: Option<IgnoreReason>,
}

impl ExecutionRecord {
    /// Fresh record for a discovered test, not yet run
    pub fn new(test: &TestDescriptor) -> Self {
        let now = Local::now();
        Self {
            test_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            qualified_name: test.qualified_name.clone(),
            class_name: test.class_name().to_string(),
            method_name: test.method_name().to_string(),
            tags: BTreeMap::new(),
            start_time: now,
            end_time: now,
            outcome: Outcome::NotExecuted,
            failure_message: None,
            ignored: None,
        }
    }

    /// Time spent in the test body
    pub fn duration(&self) -> TimeDelta {
        (self.end_time - self.start_time).max(TimeDelta::zero())
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, Outcome::Failed | Outcome::Error)
    }

    pub(crate) fn fail(&mut self, outcome: Outcome, message: impl Into<String>) {
        self.outcome = outcome;
        self.failure_message = Some(message.into());
    }
}

/// Summary counts over a set of records
///
/// `executed == passed + failed` and `executed + not_executed + error == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub total: usize,
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
    pub error: usize,
    pub not_executed: usize,
    pub ignored: usize,
    pub ignored_on_platform: usize,
}

impl RunCounters {
    pub fn from_records(records: &[ExecutionRecord]) -> Self {
        let mut counters = RunCounters::default();
        for record in records {
            counters.add(record);
        }
        counters
    }

    fn add(&mut self, record: &ExecutionRecord) {
        self.total += 1;
        match record.outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Error => self.error += 1,
            Outcome::NotExecuted => self.not_executed += 1,
        }
        if record.outcome.is_executed() {
            self.executed += 1;
        }
        match record.ignored {
            Some(IgnoreReason::Always) => self.ignored += 1,
            Some(IgnoreReason::ThisPlatform) => self.ignored_on_platform += 1,
            None => {}
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.error > 0
    }
}

/// Owns the ordered records of a run and their running counts
#[derive(Debug, Default)]
pub struct ResultsAggregator {
    records: Vec<ExecutionRecord>,
    counters: RunCounters,
}

impl ResultsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished record; counted exactly once
    pub fn record(&mut self, record: ExecutionRecord) {
        self.counters.add(&record);
        self.records.push(record);
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn into_parts(self) -> (Vec<ExecutionRecord>, RunCounters) {
        (self.records, self.counters)
    }
}
