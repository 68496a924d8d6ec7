//! Integration test: structured logging contract.
//!
//! Validates that:
//! 1. LogEmitter writes valid JSONL to files with sequential trace ids.
//! 2. A full session log validates and records both pipeline stages.
//! 3. The validation function catches schema violations.
//! 4. ArtifactIndex digests written files and serializes correctly.
//!
//! Run: cargo test -p failgate-harness --test structured_log_test

use std::path::PathBuf;

use failgate_core::Outcome;
use failgate_harness::printer::Printer;
use failgate_harness::structured_log::{
    ArtifactIndex, LogEmitter, LogEntry, LogLevel, Stage, validate_log_file, validate_log_line,
};
use failgate_harness::{Session, SessionConfig, self_check};

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("failgate_{name}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn parse_lines(content: &str) -> Vec<serde_json::Value> {
    content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn emitter_writes_valid_jsonl() {
    let dir = scratch_dir("emitter");
    let log_path = dir.join("nested/test_output.jsonl");

    {
        let mut emitter = LogEmitter::to_file(&log_path, "failgate", "run-integ").unwrap();
        emitter
            .emit(LogEntry::new(LogLevel::Info, "case_start"))
            .unwrap();
        emitter
            .emit(
                LogEntry::observed(Stage::PreDisplay, &Outcome::non_fatal("Value of: false"))
                    .with_case("Suite", "Case")
                    .with_remaining(1),
            )
            .unwrap();
        emitter
            .emit(LogEntry::new(LogLevel::Info, "case_end"))
            .unwrap();
        emitter.flush().unwrap();
    }

    let summary = validate_log_file(&log_path).unwrap();
    assert_eq!(summary.lines, 3, "Expected 3 log lines");
    assert!(summary.is_clean(), "Emitter output should validate: {:?}", summary.errors);

    let lines = parse_lines(&std::fs::read_to_string(&log_path).unwrap());
    assert_eq!(lines[0]["trace_id"], "failgate::run-integ::001");
    assert!(lines[1]["trace_id"].as_str().unwrap().ends_with("::002"));
    assert!(lines[2]["trace_id"].as_str().unwrap().ends_with("::003"));
    assert_eq!(lines[1]["run_id"], "run-integ");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn session_log_validates_and_traces_every_stage() {
    let dir = scratch_dir("session");
    let log_path = dir.join("self_check.jsonl");
    let (printer, _) = Printer::to_buffer();
    let config = SessionConfig::new()
        .with_run_id("nightly")
        .with_log_path(&log_path);
    let report = {
        let mut session = Session::new(config).unwrap().with_printer(printer);
        session.run(self_check::cases()).unwrap()
    };
    assert!(report.all_passed());

    let summary = validate_log_file(&log_path).unwrap();
    assert!(summary.lines > 0);
    assert!(summary.is_clean(), "Session log should validate: {:?}", summary.errors);

    let lines = parse_lines(&std::fs::read_to_string(&log_path).unwrap());
    let count = |event: &str| lines.iter().filter(|l| l["event"] == event).count();
    assert_eq!(count("case_start"), self_check::cases().len());
    assert_eq!(count("case_end"), self_check::cases().len());
    assert_eq!(count("session_end"), 1);
    assert_eq!(count("stale_budget"), 0);

    let pre = lines
        .iter()
        .filter(|l| l["event"] == "outcome" && l["stage"] == "pre_display")
        .count();
    let post = lines
        .iter()
        .filter(|l| l["event"] == "outcome" && l["stage"] == "post_tally")
        .count();
    assert_eq!(pre, post);
    assert!(
        lines
            .iter()
            .all(|l| l["trace_id"].as_str().unwrap().starts_with("failgate::nightly::"))
    );

    let last = lines.last().unwrap();
    assert_eq!(last["event"], "session_end");
    assert_eq!(last["details"]["failed"], 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn validation_catches_missing_fields() {
    let line = r#"{"timestamp":"2026-01-01T00:00:00Z","level":"info","event":"test"}"#;
    let errors = validate_log_line(line, 1).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "trace_id"));

    let line = r#"{"trace_id":"a::b::c","level":"info","event":"test"}"#;
    let errors = validate_log_line(line, 2).unwrap_err();
    assert!(errors.iter().any(|e| e.field == "timestamp"));

    let line = r#"{"timestamp":"2026-01-01T00:00:00Z","trace_id":"a::b::c"}"#;
    let errors = validate_log_line(line, 3).unwrap_err();
    assert!(errors.len() >= 2);
}

#[test]
fn validation_catches_invalid_enums() {
    let line = r#"{"timestamp":"T","trace_id":"a::b::c","level":"critical","event":"e"}"#;
    assert!(validate_log_line(line, 1).is_err());

    let line =
        r#"{"timestamp":"T","trace_id":"a::b::c","level":"info","event":"e","stage":"later"}"#;
    assert!(validate_log_line(line, 2).is_err());

    let line =
        r#"{"timestamp":"T","trace_id":"a::b::c","level":"info","event":"e","outcome":"maybe"}"#;
    assert!(validate_log_line(line, 3).is_err());
}

#[test]
fn validation_reports_line_numbers() {
    let dir = scratch_dir("lines");
    let path = dir.join("mixed.jsonl");
    std::fs::write(
        &path,
        concat!(
            r#"{"timestamp":"T","trace_id":"failgate::r::001","level":"info","event":"ping"}"#,
            "\n\n",
            "not json\n",
        ),
    )
    .unwrap();

    let summary = validate_log_file(&path).unwrap();
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].line_number, 3);
    assert!(summary.errors[0].to_string().starts_with("line 3: field '<json>'"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn valid_log_line_accepts_full_entry() {
    let line = r#"{"timestamp":"2026-02-11T00:00:00Z","trace_id":"failgate::run-1::005","level":"error","event":"outcome","run_id":"run-1","suite":"FailureBridgeHandling","case":"FatalLogRaisesSignal","stage":"post_tally","outcome":"fatal_failure","message":"boom","remaining":0,"duration_ms":1,"details":{"note":"x"}}"#;
    let result = validate_log_line(line, 1);
    assert!(result.is_ok(), "Full entry should validate: {:?}", result.err());
}

#[test]
fn artifact_index_lists_what_a_run_wrote() {
    let dir = scratch_dir("artifacts");
    let log_path = dir.join("self_check.jsonl");
    let report_path = dir.join("self_check.md");
    std::fs::write(&log_path, "{}\n").unwrap();
    std::fs::write(&report_path, "# Self-check\n").unwrap();

    let mut idx = ArtifactIndex::new("run-001");
    idx.record(&log_path, "structured_log").unwrap();
    idx.record(&report_path, "report_markdown").unwrap();

    let json = idx.to_json().unwrap();
    let restored: ArtifactIndex = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.schema_version, 1);
    assert_eq!(restored.run_id, "run-001");
    assert_eq!(restored.artifacts, idx.artifacts);
    assert_eq!(restored.artifacts[0].kind, "structured_log");
    assert_eq!(restored.artifacts[1].bytes, 13);
    assert_eq!(restored.artifacts[1].sha256.len(), 64);

    std::fs::remove_dir_all(&dir).ok();
}
