//! Human-readable session output in the familiar gtest layout.
//!
//! ```text
//! [==========] Running 2 tests.
//! [ RUN      ] ExpectedFailure.MarkOne
//! src/self_check.rs:41: Failure
//! (EXPECTED FAILURE --> SUCCESS) :: Value of: false == true
//! [       OK ] ExpectedFailure.MarkOne (0 ms)
//! ```
//!
//! Successful outcomes print nothing; only failures and skips produce a block.

use std::io::{self, Write};

use failgate_core::{Outcome, OutcomeKind};

use crate::report::{CaseStatus, SessionReport};
use crate::sink::SharedBuffer;

pub struct Printer {
    out: Box<dyn Write>,
}

impl Printer {
    #[must_use]
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    #[must_use]
    pub fn to_buffer() -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::new();
        (Self::new(Box::new(buffer.clone())), buffer)
    }

    pub fn session_start(&mut self, cases: usize) -> io::Result<()> {
        writeln!(self.out, "[==========] Running {}.", plural(cases, "test"))
    }

    pub fn case_start(&mut self, case_id: &str) -> io::Result<()> {
        writeln!(self.out, "[ RUN      ] {case_id}")
    }

    pub fn outcome(&mut self, outcome: &Outcome) -> io::Result<()> {
        let label = match outcome.kind {
            OutcomeKind::Success => return Ok(()),
            OutcomeKind::NonFatalFailure | OutcomeKind::FatalFailure => "Failure",
            OutcomeKind::Skipped => "Skipped",
        };
        match &outcome.location {
            Some(location) => writeln!(self.out, "{location}: {label}")?,
            None => writeln!(self.out, "unknown file: {label}")?,
        }
        if !outcome.message.is_empty() {
            writeln!(self.out, "{}", outcome.message)?;
        }
        Ok(())
    }

    pub fn case_end(
        &mut self,
        case_id: &str,
        status: CaseStatus,
        duration_ms: u64,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {case_id} ({duration_ms} ms)",
            status_tag(status)
        )
    }

    pub fn session_end(&mut self, report: &SessionReport) -> io::Result<()> {
        writeln!(
            self.out,
            "[==========] {} ran. ({} ms total)",
            plural(report.total, "test"),
            report.duration_ms
        )?;
        writeln!(self.out, "[  PASSED  ] {}.", plural(report.passed, "test"))?;
        for (status, count) in [
            (CaseStatus::Skipped, report.skipped),
            (CaseStatus::Failed, report.failed),
        ] {
            if count == 0 {
                continue;
            }
            writeln!(
                self.out,
                "{} {}, listed below:",
                status_tag(status),
                plural(count, "test")
            )?;
            for case in report.cases.iter().filter(|c| c.status == status) {
                writeln!(self.out, "{} {}", status_tag(status), case.id())?;
            }
        }
        self.out.flush()
    }
}

const fn status_tag(status: CaseStatus) -> &'static str {
    match status {
        CaseStatus::Passed => "[       OK ]",
        CaseStatus::Failed => "[  FAILED  ]",
        CaseStatus::Skipped => "[  SKIPPED ]",
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use failgate_core::Location;

    #[test]
    fn successes_are_silent() {
        let (mut printer, buffer) = Printer::to_buffer();
        printer.outcome(&Outcome::success("all good")).unwrap();
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn failures_print_location_then_message() {
        let (mut printer, buffer) = Printer::to_buffer();
        printer
            .outcome(&Outcome::non_fatal("Value of: x").at(Some(Location::new("src/a.rs", 9))))
            .unwrap();
        printer.outcome(&Outcome::fatal("boom")).unwrap();
        assert_eq!(
            buffer.contents(),
            "src/a.rs:9: Failure\nValue of: x\nunknown file: Failure\nboom\n"
        );
    }

    #[test]
    fn case_lines_use_status_tags() {
        let (mut printer, buffer) = Printer::to_buffer();
        printer.case_start("Suite.Case").unwrap();
        printer.case_end("Suite.Case", CaseStatus::Failed, 4).unwrap();
        assert_eq!(
            buffer.contents(),
            "[ RUN      ] Suite.Case\n[  FAILED  ] Suite.Case (4 ms)\n"
        );
    }
}
