//! Report writer - TRX results document
//!
//! The document follows the Visual Studio TeamTest 2010 schema closely enough
//! for CI dashboards that ingest `.trx` files. Counters are recomputed from the
//! records here rather than taken from the aggregator.

use crate::error::ReportError;
use crate::results::{ExecutionRecord, RunCounters};
use chrono::{DateTime, Local, TimeDelta};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const TRX_NAMESPACE: &str = "http://microsoft.com/schemas/VisualStudio/TeamTest/2010";
const TEST_SETTINGS_ID: &str = "1a61beb3-bd7a-4cb9-9d96-a9999be895f1";
const UNIT_TEST_TYPE: &str = "13cdc9d9-ddb5-4fa4-a97d-d965ccfc6d4b";
const RESULTS_NOT_IN_A_LIST: &str = "8c84fa94-04c1-424b-9868-57a2d4851a1d";
const ALL_LOADED_RESULTS: &str = "19431567-8539-422a-85d7-44ee4e166bda";
const HOST_NAME_FALLBACK: &str = "NoHostname";

/// Everything the report describes about one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub module_path: PathBuf,
    pub run_start: DateTime<Local>,
    pub run_end: DateTime<Local>,
    pub records: Vec<ExecutionRecord>,
}

impl RunReport {
    /// A report with no records, finishing now
    pub fn empty(module_path: impl Into<PathBuf>, run_start: DateTime<Local>) -> Self {
        Self {
            module_path: module_path.into(),
            run_start,
            run_end: Local::now(),
            records: Vec::new(),
        }
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters::from_records(&self.records)
    }
}

/// Serializes a [`RunReport`] as TRX
#[derive(Debug, Clone)]
pub struct TrxWriter {
    run_id: Uuid,
    host_name: String,
}

impl Default for TrxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TrxWriter {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            host_name: host_name(),
        }
    }

    /// Override the computer name written on every result
    pub fn with_host_name(mut self, host_name: impl Into<String>) -> Self {
        self.host_name = host_name.into();
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Write the document to `path`; `None` does nothing
    pub fn write(&self, report: &RunReport, path: Option<&Path>) -> Result<(), ReportError> {
        let Some(path) = path else {
            return Ok(());
        };

        let document = self.render(report)?;
        fs::write(path, document).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(path = %path.display(), records = report.records.len(), "report written");
        Ok(())
    }

    /// Render the whole document
    pub fn render(&self, report: &RunReport) -> Result<String, ReportError> {
        let mut xml = XmlOut::new();
        let storage = report.module_path.display().to_string();
        let run_name = format!("UnitHostRun{}", format_timestamp(&report.run_end));
        let run_id = self.run_id.to_string();
        let start = format_timestamp(&report.run_start);
        let finish = format_timestamp(&report.run_end);

        xml.declaration()?;
        xml.start(
            "TestRun",
            &[
                ("id", run_id.as_str()),
                ("name", run_name.as_str()),
                ("xmlns", TRX_NAMESPACE),
            ],
        )?;
        xml.empty(
            "Times",
            &[
                ("creation", start.as_str()),
                ("start", start.as_str()),
                ("finish", finish.as_str()),
            ],
        )?;
        xml.empty(
            "TestSettings",
            &[("name", "default"), ("id", TEST_SETTINGS_ID)],
        )?;

        xml.start("Results", &[])?;
        for record in &report.records {
            self.write_result(&mut xml, record)?;
        }
        xml.end("Results")?;

        xml.start("TestDefinitions", &[])?;
        for record in &report.records {
            write_definition(&mut xml, record, &storage)?;
        }
        xml.end("TestDefinitions")?;

        xml.start("TestEntries", &[])?;
        for record in &report.records {
            xml.empty(
                "TestEntry",
                &[
                    ("testId", record.test_id.to_string().as_str()),
                    ("executionId", record.execution_id.to_string().as_str()),
                    ("testListId", RESULTS_NOT_IN_A_LIST),
                ],
            )?;
        }
        xml.end("TestEntries")?;

        xml.start("TestLists", &[])?;
        xml.empty(
            "TestList",
            &[("name", "Results Not in a List"), ("id", RESULTS_NOT_IN_A_LIST)],
        )?;
        xml.empty(
            "TestList",
            &[("name", "All Loaded Results"), ("id", ALL_LOADED_RESULTS)],
        )?;
        xml.end("TestLists")?;

        write_summary(&mut xml, &report.counters())?;
        xml.end("TestRun")?;

        xml.finish()
    }

    fn write_result(&self, xml: &mut XmlOut, record: &ExecutionRecord) -> Result<(), ReportError> {
        let execution_id = record.execution_id.to_string();
        let test_id = record.test_id.to_string();
        let start = format_timestamp(&record.start_time);
        let end = format_timestamp(&record.end_time);
        let duration = format_duration(record.duration());

        let attributes = [
            ("outcome", record.outcome.as_str()),
            ("testName", record.qualified_name.as_str()),
            ("executionId", execution_id.as_str()),
            ("testId", test_id.as_str()),
            ("startTime", start.as_str()),
            ("endTime", end.as_str()),
            ("duration", duration.as_str()),
            ("computerName", self.host_name.as_str()),
            ("testType", UNIT_TEST_TYPE),
            ("testListId", RESULTS_NOT_IN_A_LIST),
        ];

        match record.failure_message.as_deref() {
            Some(message) if record.is_failure() => {
                xml.start("UnitTestResult", &attributes)?;
                xml.start("Output", &[])?;
                xml.start("ErrorInfo", &[])?;
                xml.text_element("Message", message)?;
                xml.end("ErrorInfo")?;
                xml.end("Output")?;
                xml.end("UnitTestResult")
            }
            _ => xml.empty("UnitTestResult", &attributes),
        }
    }
}

fn write_definition(
    xml: &mut XmlOut,
    record: &ExecutionRecord,
    storage: &str,
) -> Result<(), ReportError> {
    xml.start(
        "UnitTest",
        &[
            ("name", record.qualified_name.as_str()),
            ("storage", storage),
            ("id", record.test_id.to_string().as_str()),
        ],
    )?;
    xml.empty("Execution", &[("id", record.execution_id.to_string().as_str())])?;
    xml.empty(
        "TestMethod",
        &[
            ("codeBase", storage),
            ("className", record.class_name.as_str()),
            ("name", record.method_name.as_str()),
        ],
    )?;

    if !record.tags.is_empty() {
        xml.start("Properties", &[])?;
        for (key, value) in &record.tags {
            xml.start("Property", &[])?;
            xml.text_element("Key", key)?;
            xml.text_element("Value", value)?;
            xml.end("Property")?;
        }
        xml.end("Properties")?;
    }

    xml.end("UnitTest")
}

fn write_summary(xml: &mut XmlOut, counters: &RunCounters) -> Result<(), ReportError> {
    let counts = [
        ("total", counters.total),
        ("executed", counters.executed),
        ("passed", counters.passed),
        ("failed", counters.failed),
        ("error", counters.error),
        ("notExecuted", counters.not_executed),
        ("timeout", 0),
        ("aborted", 0),
        ("inconclusive", 0),
        ("passedButRunAborted", 0),
        ("notRunnable", 0),
    ];
    let values: Vec<(&str, String)> = counts
        .iter()
        .map(|(name, count)| (*name, count.to_string()))
        .collect();
    let attributes: Vec<(&str, &str)> = values
        .iter()
        .map(|(name, value)| (*name, value.as_str()))
        .collect();

    xml.start("ResultSummary", &[("outcome", "Completed")])?;
    xml.empty("Counters", &attributes)?;
    xml.end("ResultSummary")
}

/// Thin wrapper over the quick-xml writer; attribute and text values are escaped
struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), ReportError> {
        self.writer
            .write_event(event)
            .map_err(|e| ReportError::Xml(e.to_string()))
    }

    fn declaration(&mut self) -> Result<(), ReportError> {
        self.emit(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ReportError> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.emit(Event::Start(element))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), ReportError> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.emit(Event::Empty(element))
    }

    fn end(&mut self, name: &str) -> Result<(), ReportError> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), ReportError> {
        self.start(name, &[])?;
        self.emit(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    fn finish(self) -> Result<String, ReportError> {
        let mut bytes = self.writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| ReportError::Xml(e.to_string()))
    }
}

/// Local time, ISO-8601 with milliseconds: `2025-03-01T14:05:09.042`
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// `HH:MM:SS.fffffff`, fraction in 100 ns ticks
pub fn format_duration(duration: TimeDelta) -> String {
    const TICKS_PER_SECOND: i64 = 10_000_000;

    let ticks = duration
        .num_nanoseconds()
        .map(|ns| ns / 100)
        .unwrap_or(i64::MAX)
        .max(0);
    let seconds = ticks / TICKS_PER_SECOND;

    format!(
        "{:02}:{:02}:{:02}.{:07}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60,
        ticks % TICKS_PER_SECOND
    )
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| HOST_NAME_FALLBACK.to_string())
}
