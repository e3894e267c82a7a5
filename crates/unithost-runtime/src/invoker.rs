//! Test invoker - one test's full lifecycle
//!
//! Every test gets a fresh instance, so class-level hooks run around each
//! test rather than once per class:
//!
//! ```text
//! create -> init_class -> init_method -> body -> cleanup_method -> cleanup_class -> destroy
//! ```
//!
//! Only the body is timed. Nothing that goes wrong inside one test escapes
//! [`TestInvoker::run`].

use crate::attributes::AttributeLookup;
use crate::catalog::{SymbolCatalog, TestDescriptor};
use crate::ffi::boundary::{BoundTest, CallStatus, Hook, TestInstance};
use crate::module::ExportTable;
use crate::results::{ExecutionRecord, IgnoreReason, Outcome};
use chrono::Local;
use tracing::{debug, warn};

/// Failure message recorded for any fault other than an assertion
pub const UNEXPECTED_FAULT_MESSAGE: &str = "Unexpected exception";

const INIT_HOOKS: [Hook; 2] = [Hook::InitClass, Hook::InitMethod];
const CLEANUP_HOOKS: [Hook; 2] = [Hook::CleanupMethod, Hook::CleanupClass];

/// Runs tests of one catalog against one module
pub struct TestInvoker<'a> {
    catalog: &'a SymbolCatalog,
    table: &'a dyn ExportTable,
}

impl<'a> TestInvoker<'a> {
    pub fn new(catalog: &'a SymbolCatalog, table: &'a dyn ExportTable) -> Self {
        Self { catalog, table }
    }

    /// Run (or skip) one test and produce its record
    pub fn run(&self, test: &TestDescriptor, attributes: &AttributeLookup) -> ExecutionRecord {
        let mut record = ExecutionRecord::new(test);
        record.tags = attributes.info.tags.clone();

        if attributes.info.ignore {
            record.ignored = Some(IgnoreReason::Always);
        } else if attributes.info.ignore_on_platform {
            record.ignored = Some(IgnoreReason::ThisPlatform);
        }
        if record.ignored.is_some() {
            debug!(test = %test.qualified_name, "test ignored");
            record.outcome = Outcome::NotExecuted;
            return record;
        }

        let bound = match self.bind(test) {
            Ok(bound) => bound,
            Err(reason) => {
                let message = match &attributes.fault {
                    Some(fault) => format!("{} (attribute provider: {})", reason, fault),
                    None => reason,
                };
                mark_error(&mut record, message);
                return record;
            }
        };

        let mut instance = match bound.instantiate() {
            Ok(instance) => instance,
            Err(err) => {
                mark_error(&mut record, err.to_string());
                return record;
            }
        };

        execute(&mut instance, &mut record);

        if let Err(err) = instance.destroy() {
            warn!(test = %test.qualified_name, error = %err, "destructor faulted");
            if record.outcome == Outcome::Passed {
                record.fail(Outcome::Failed, err.to_string());
            }
        }

        debug!(test = %test.qualified_name, outcome = %record.outcome, "test finished");
        record
    }

    /// Resolve the descriptor afresh and validate its triple
    fn bind(&self, test: &TestDescriptor) -> Result<BoundTest, String> {
        let address = self
            .catalog
            .resolve(self.table, &test.symbol, 0)
            .map_err(|e| e.to_string())?;

        // SAFETY: the registry verified a niladic descriptor under this name
        // and the module outlives every instance created in this run.
        unsafe { BoundTest::bind(address) }.map_err(|e| e.to_string())
    }
}

fn execute(instance: &mut TestInstance, record: &mut ExecutionRecord) {
    let init_failure = INIT_HOOKS.iter().find_map(|&hook| {
        let status = instance.run_hook(hook);
        debug!(test = %record.qualified_name, hook = hook.name(), ?status, "lifecycle hook");
        hook_failure(hook, status)
    });

    match init_failure {
        Some(message) => mark_error(record, message),
        None => {
            record.start_time = Local::now();
            let status = instance.invoke();
            record.end_time = Local::now();

            match status {
                CallStatus::Completed => record.outcome = Outcome::Passed,
                CallStatus::AssertionFailed(message) => record.fail(Outcome::Failed, message),
                CallStatus::Fault(detail) => {
                    warn!(test = %record.qualified_name, %detail, "test body faulted");
                    record.fail(Outcome::Failed, UNEXPECTED_FAULT_MESSAGE);
                }
            }
        }
    }

    for hook in CLEANUP_HOOKS {
        let status = instance.run_hook(hook);
        debug!(test = %record.qualified_name, hook = hook.name(), ?status, "lifecycle hook");
        if let Some(message) = hook_failure(hook, status) {
            if record.outcome == Outcome::Passed {
                record.fail(Outcome::Failed, message);
            } else {
                warn!(test = %record.qualified_name, %message, "cleanup failed after earlier failure");
            }
        }
    }
}

fn hook_failure(hook: Hook, status: CallStatus) -> Option<String> {
    match status {
        CallStatus::Completed => None,
        CallStatus::AssertionFailed(message) => Some(message),
        CallStatus::Fault(detail) => Some(format!("{} failed: {}", hook.name(), detail)),
    }
}

fn mark_error(record: &mut ExecutionRecord, message: String) {
    warn!(test = %record.qualified_name, %message, "test could not run");
    let now = Local::now();
    record.start_time = now;
    record.end_time = now;
    record.fail(Outcome::Error, message);
}
