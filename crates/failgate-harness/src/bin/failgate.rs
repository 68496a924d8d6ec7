//! CLI entrypoint for the failgate harness.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use failgate_harness::structured_log::{ArtifactIndex, validate_log_file};
use failgate_harness::{Session, SessionConfig, SessionReport, self_check};

/// Expected-failure tracking and failure bridging for test sessions.
#[derive(Debug, Parser)]
#[command(name = "failgate")]
#[command(about = "Self-check and log tooling for failgate test oracles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the built-in self-check suite; every deliberate failure must be expected.
    SelfCheck {
        /// Only run cases whose `suite.name` contains this text.
        #[arg(long)]
        filter: Option<String>,
        /// Write the JSONL structured log here.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Write the markdown report here (JSON report and artifact index alongside).
        #[arg(long)]
        report: Option<PathBuf>,
        /// Run identifier for trace ids and reports.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Print the build flavor (`dbg` or `opt`).
    BuildMode,
    /// Validate a JSONL structured log.
    ValidateLog {
        /// Path to the log file.
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::SelfCheck {
            filter,
            log,
            report,
            run_id,
        } => {
            let mut config = SessionConfig::from_env();
            if let Some(filter) = filter {
                config = config.with_filter(filter);
            }
            if let Some(log) = log {
                config = config.with_log_path(log);
            }
            if let Some(run_id) = run_id {
                config = config.with_run_id(run_id);
            }
            let log_path = config.log_path.clone();

            let mut session = Session::new(config)?.with_title("failgate self-check");
            let report_doc = session.run(self_check::cases())?;
            drop(session);

            eprintln!(
                "Self-check complete: total={}, passed={}, failed={}, skipped={}",
                report_doc.total, report_doc.passed, report_doc.failed, report_doc.skipped
            );

            if let Some(report_path) = report {
                write_reports(&report_doc, &report_path, log_path.as_deref())?;
            }

            if !report_doc.all_passed() {
                return Err("Self-check failed: some deliberate failures were not expected".into());
            }
        }
        Command::BuildMode => {
            println!("{}", if cfg!(debug_assertions) { "dbg" } else { "opt" });
        }
        Command::ValidateLog { path } => {
            let summary = validate_log_file(&path)?;
            for error in &summary.errors {
                eprintln!("{error}");
            }
            eprintln!(
                "Validated {} line(s) in {}: {} error(s)",
                summary.lines,
                path.display(),
                summary.errors.len()
            );
            if !summary.is_clean() {
                return Err(format!("{} is not a valid failgate log", path.display()).into());
            }
        }
    }

    Ok(())
}

fn write_reports(
    report: &SessionReport,
    report_path: &Path,
    log_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    eprintln!("Writing report to {}", report_path.display());
    std::fs::write(report_path, report.to_markdown())?;
    let json_path = report_path.with_extension("json");
    std::fs::write(&json_path, report.to_json())?;

    let mut index = ArtifactIndex::new(&report.run_id);
    index.record(report_path, "report_markdown")?;
    index.record(&json_path, "report_json")?;
    if let Some(log_path) = log_path {
        index.record(log_path, "structured_log")?;
    }
    let index_path = report_path.with_extension("artifacts.json");
    std::fs::write(&index_path, index.to_json()?)?;
    eprintln!("Wrote artifact index to {}", index_path.display());
    Ok(())
}
