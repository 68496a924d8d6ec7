//! JSONL session log.
//!
//! Every line is one [`LogEntry`]. The session writes case boundaries, each
//! outcome at both pipeline stages (and at the bypass stage for defects in
//! the case itself), expectation marks, stale budgets and a closing summary.
//! [`validate_log_line`] and [`validate_log_file`] check a log written by any
//! version of the runner; [`ArtifactIndex`] ties the log to the reports
//! written next to it.

use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use failgate_core::{Outcome, OutcomeKind};

use crate::sink::SharedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Fatal failures are errors, non-fatal ones warnings, the rest info.
    #[must_use]
    pub const fn for_outcome(kind: OutcomeKind) -> Self {
        match kind {
            OutcomeKind::FatalFailure => Self::Error,
            OutcomeKind::NonFatalFailure => Self::Warn,
            OutcomeKind::Success | OutcomeKind::Skipped => Self::Info,
        }
    }

    #[must_use]
    pub const fn for_verdict(failed: bool) -> Self {
        if failed { Self::Error } else { Self::Info }
    }
}

/// Where in the reporting pipeline an outcome was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Before the printer saw it.
    PreDisplay,
    /// After the printer, right before the tally.
    PostTally,
    /// Reported past the expectation tracker.
    Bypass,
}

const REQUIRED_FIELDS: [&str; 4] = ["timestamp", "trace_id", "level", "event"];

/// One log line.
///
/// `trace_id` and `run_id` are filled in by [`LogEmitter::emit`] when left
/// empty, so callers only describe the event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<OutcomeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Expected failures still pending after this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl LogEntry {
    /// An event stamped now, with no trace id yet.
    #[must_use]
    pub fn new(level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: String::new(),
            level,
            event: event.into(),
            run_id: None,
            suite: None,
            case: None,
            stage: None,
            outcome: None,
            message: None,
            remaining: None,
            duration_ms: None,
            details: None,
        }
    }

    /// An `outcome` event for `outcome` as seen at `stage`.
    #[must_use]
    pub fn observed(stage: Stage, outcome: &Outcome) -> Self {
        let mut entry = Self::new(LogLevel::for_outcome(outcome.kind), "outcome");
        entry.stage = Some(stage);
        entry.outcome = Some(outcome.kind);
        entry.message = Some(outcome.message.clone());
        entry
    }

    #[must_use]
    pub fn with_case(mut self, suite: impl Into<String>, case: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self.case = Some(case.into());
        self
    }

    #[must_use]
    pub fn with_remaining(mut self, remaining: u32) -> Self {
        self.remaining = Some(remaining);
        self
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Writes [`LogEntry`] lines, numbering them `<component>::<run_id>::<seq>`.
pub struct LogEmitter {
    out: Box<dyn Write>,
    trace_prefix: String,
    run_id: String,
    emitted: u64,
}

impl LogEmitter {
    /// Log to `path`, creating its parent directory if needed.
    pub fn to_file(path: &Path, component: &str, run_id: &str) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = io::BufWriter::new(std::fs::File::create(path)?);
        Ok(Self::over(Box::new(file), component, run_id))
    }

    /// Log to memory; the returned buffer sees every line written.
    #[must_use]
    pub fn to_buffer(component: &str, run_id: &str) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::new();
        (Self::over(Box::new(buffer.clone()), component, run_id), buffer)
    }

    fn over(out: Box<dyn Write>, component: &str, run_id: &str) -> Self {
        Self {
            out,
            trace_prefix: format!("{component}::{run_id}"),
            run_id: run_id.to_string(),
            emitted: 0,
        }
    }

    /// Write one line, filling in a missing trace id and run id.
    pub fn emit(&mut self, mut entry: LogEntry) -> io::Result<()> {
        self.emitted += 1;
        if entry.trace_id.is_empty() {
            entry.trace_id = format!("{}::{:03}", self.trace_prefix, self.emitted);
        }
        entry.run_id.get_or_insert_with(|| self.run_id.clone());
        serde_json::to_writer(&mut self.out, &entry).map_err(io::Error::other)?;
        self.out.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// A schema problem on one line of a log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: field '{field}': {message}")]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

struct LineCheck {
    line_number: usize,
    errors: Vec<LogValidationError>,
}

impl LineCheck {
    fn flag(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(LogValidationError {
            line_number: self.line_number,
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Flag `field` when present but not decodable as `T`.
    fn typed<T: DeserializeOwned>(&mut self, fields: &Map<String, Value>, field: &str, want: &str) {
        if let Some(value) = fields.get(field)
            && serde_json::from_value::<T>(value.clone()).is_err()
        {
            self.flag(field, format!("expected {want}, got {value}"));
        }
    }
}

/// Check one line; on success returns the decoded entry.
///
/// Every problem on the line is reported, not only the first.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut check = LineCheck {
        line_number,
        errors: Vec::new(),
    };

    let value = match serde_json::from_str::<Value>(line) {
        Ok(value) => value,
        Err(err) => {
            check.flag("<json>", format!("invalid JSON: {err}"));
            return Err(check.errors);
        }
    };
    let Some(fields) = value.as_object() else {
        check.flag("<root>", "expected a JSON object");
        return Err(check.errors);
    };

    for field in REQUIRED_FIELDS {
        if !fields.contains_key(field) {
            check.flag(field, "required field missing");
        }
    }
    check.typed::<LogLevel>(fields, "level", "one of debug/info/warn/error");
    check.typed::<Stage>(fields, "stage", "one of pre_display/post_tally/bypass");
    check.typed::<OutcomeKind>(fields, "outcome", "an outcome kind");
    check.typed::<u32>(fields, "remaining", "a non-negative count");
    check.typed::<u64>(fields, "duration_ms", "a non-negative duration");

    if fields.get("event").and_then(Value::as_str) == Some("outcome") {
        for field in ["stage", "outcome"] {
            if !fields.contains_key(field) {
                check.flag(field, format!("outcome events must carry {field}"));
            }
        }
    }

    if let Some(trace_id) = fields.get("trace_id").and_then(Value::as_str)
        && trace_id.split("::").filter(|part| !part.is_empty()).count() < 3
    {
        check.flag(
            "trace_id",
            format!("expected <component>::<run_id>::<seq>, got '{trace_id}'"),
        );
    }

    if !check.errors.is_empty() {
        return Err(check.errors);
    }
    match serde_json::from_value(value) {
        Ok(entry) => Ok(entry),
        Err(err) => {
            check.flag("<entry>", format!("does not decode: {err}"));
            Err(check.errors)
        }
    }
}

/// Outcome of checking a whole log file.
#[derive(Debug, Default)]
pub struct LogFileSummary {
    /// Non-blank lines checked.
    pub lines: usize,
    pub errors: Vec<LogValidationError>,
}

impl LogFileSummary {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check every non-blank line of `path`. Line numbers count blank lines too.
pub fn validate_log_file(path: &Path) -> io::Result<LogFileSummary> {
    let content = std::fs::read_to_string(path)?;
    let mut summary = LogFileSummary::default();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        summary.lines += 1;
        if let Err(errors) = validate_log_line(line, index + 1) {
            summary.errors.extend(errors);
        }
    }
    Ok(summary)
}

/// A written file, by path, role and content digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    pub bytes: u64,
}

/// Manifest of the files one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactIndex {
    pub schema_version: u32,
    pub run_id: String,
    pub created_utc: String,
    pub artifacts: Vec<Artifact>,
}

impl ArtifactIndex {
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            schema_version: 1,
            run_id: run_id.into(),
            created_utc: now_utc(),
            artifacts: Vec::new(),
        }
    }

    /// Digest the file at `path` and list it under `kind`.
    pub fn record(&mut self, path: &Path, kind: &str) -> io::Result<()> {
        let data = std::fs::read(path)?;
        self.artifacts.push(Artifact {
            path: path.display().to_string(),
            kind: kind.to_string(),
            sha256: format!("{:x}", Sha256::digest(&data)),
            bytes: data.len() as u64,
        });
        Ok(())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc() -> String {
    let since_epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(since_epoch.as_secs(), since_epoch.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = i64::try_from(secs / 86_400).unwrap_or(i64::MAX / 2);
    let (year, month, day) = civil_from_days(days);
    let clock = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        clock / 3600,
        clock % 3600 / 60,
        clock % 60,
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
