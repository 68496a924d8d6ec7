//! Serialized session runner.
//!
//! A [`Session`] owns one [`ExpectationTracker`], the [`Printer`] and an
//! optional structured log, and lends them to each case through a
//! [`CaseContext`]. Every outcome a case reports travels the same pipeline:
//!
//! ```text
//! tracker.pre_display -> printer -> tracker.post_tally -> case tally
//! ```
//!
//! Defects in the case itself (a nested expectation window, a budget left
//! over at the end) are reported past the tracker so an open window cannot
//! swallow them.
//!
//! Sessions hold a process-wide lock while running because the failure
//! bridge handlers they install are process-wide.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Instant;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use thiserror::Error;

use failgate_core::{
    BridgeHandlers, ExpectationTracker, FailureHandlerChain, FailureSignal, HandlerGuard, Location,
    Outcome, OutcomeKind, TrackerError, catch_boundary, install_abort_hook, take_panic_site,
};

use crate::config::SessionConfig;
use crate::printer::Printer;
use crate::report::{CaseReport, CaseStatus, SessionReport};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Stage};

/// Component name used in structured-log trace ids.
pub const LOG_COMPONENT: &str = "failgate";

const DEFAULT_TITLE: &str = "failgate session";

static SESSION_LOCK: ReentrantMutex<()> = parking_lot::const_reentrant_mutex(());

/// Serialize against every running session in this process.
///
/// [`Session::run`] takes this lock itself; it is reentrant, so a caller can
/// hold it across a run to inspect process-wide handler state afterwards.
pub fn session_lock() -> ReentrantMutexGuard<'static, ()> {
    SESSION_LOCK.lock()
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open structured log {}: {source}", path.display())]
    OpenLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session output failed: {0}")]
    Output(#[from] io::Error),
}

/// Why a case body stopped early.
#[derive(Debug, Error)]
pub enum CaseError {
    /// A failure signal the body chose to return; reported as a fatal failure.
    #[error(transparent)]
    Signal(#[from] FailureSignal),
    /// Misuse of the expectation tracker; reported past the tracker.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    /// A fatal check already reported its failure.
    #[error("fatal check failed")]
    Aborted,
    /// The case asked to be skipped; the skip is already reported.
    #[error("case skipped")]
    Skipped,
}

pub type CaseResult = Result<(), CaseError>;

pub type CaseBody = fn(&mut CaseContext<'_>) -> CaseResult;

/// Setup/teardown wrapped around a case.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    #[default]
    Plain,
    /// Clears the abort hook around the suite and installs the failure bridge
    /// around each case; the case must end without a tallied failure.
    FailureBridge,
}

#[derive(Debug, Clone, Copy)]
pub struct TestCase {
    pub suite: &'static str,
    pub name: &'static str,
    pub fixture: FixtureKind,
    pub body: CaseBody,
}

impl TestCase {
    #[must_use]
    pub const fn new(suite: &'static str, name: &'static str, body: CaseBody) -> Self {
        Self {
            suite,
            name,
            fixture: FixtureKind::Plain,
            body,
        }
    }

    #[must_use]
    pub const fn with_fixture(mut self, fixture: FixtureKind) -> Self {
        self.fixture = fixture;
        self
    }

    /// `suite.name`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}.{}", self.suite, self.name)
    }
}

/// Printer, log and the first output error seen.
struct Outputs {
    printer: Printer,
    log: Option<LogEmitter>,
    error: Option<io::Error>,
}

impl Outputs {
    fn keep(&mut self, result: io::Result<()>) {
        if let Err(err) = result
            && self.error.is_none()
        {
            self.error = Some(err);
        }
    }

    fn log(&mut self, entry: LogEntry) {
        if let Some(log) = self.log.as_mut() {
            let result = log.emit(entry);
            self.keep(result);
        }
    }
}

pub struct Session {
    config: SessionConfig,
    title: String,
    tracker: ExpectationTracker,
    out: Outputs,
}

impl Session {
    /// Create a session printing to stdout, logging to `config.log_path` if set.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        let log = match &config.log_path {
            Some(path) => Some(
                LogEmitter::to_file(path, LOG_COMPONENT, &config.run_id).map_err(|source| {
                    SessionError::OpenLog {
                        path: path.clone(),
                        source,
                    }
                })?,
            ),
            None => None,
        };
        Ok(Self {
            config,
            title: DEFAULT_TITLE.to_string(),
            tracker: ExpectationTracker::new(),
            out: Outputs {
                printer: Printer::stdout(),
                log,
                error: None,
            },
        })
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_printer(mut self, printer: Printer) -> Self {
        self.out.printer = printer;
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.out.log = Some(log);
        self
    }

    /// Run every case the filter selects, in order.
    ///
    /// Case failures land in the report; only printer or log I/O errors fail
    /// the run.
    pub fn run(&mut self, cases: &[TestCase]) -> Result<SessionReport, SessionError> {
        let _serialized = session_lock();
        let started = Instant::now();
        let selected: Vec<&TestCase> = cases
            .iter()
            .filter(|case| self.config.selects(&case.id()))
            .collect();

        let result = self.out.printer.session_start(selected.len());
        self.out.keep(result);

        let mut reports = Vec::with_capacity(selected.len());
        let mut open_suite: Option<(&'static str, FixtureKind)> = None;
        for case in selected {
            if open_suite.is_none_or(|(suite, _)| suite != case.suite) {
                if let Some((_, fixture)) = open_suite {
                    tear_down_suite(fixture);
                }
                set_up_suite(case.fixture);
                open_suite = Some((case.suite, case.fixture));
            }
            reports.push(self.run_case(case));
        }
        if let Some((_, fixture)) = open_suite {
            tear_down_suite(fixture);
        }

        let report = SessionReport::from_cases(
            &self.title,
            &self.config.run_id,
            elapsed_ms(started),
            reports,
        );
        let result = self.out.printer.session_end(&report);
        self.out.keep(result);

        self.out.log(
            LogEntry::new(LogLevel::for_verdict(!report.all_passed()), "session_end")
                .with_duration_ms(report.duration_ms)
                .with_details(serde_json::json!({
                    "total": report.total,
                    "passed": report.passed,
                    "failed": report.failed,
                    "skipped": report.skipped,
                })),
        );
        if let Some(log) = self.out.log.as_mut() {
            let result = log.flush();
            self.out.keep(result);
        }

        match self.out.error.take() {
            Some(err) => Err(SessionError::Output(err)),
            None => Ok(report),
        }
    }

    fn run_case(&mut self, case: &TestCase) -> CaseReport {
        let case_id = case.id();
        let started = Instant::now();
        self.tracker.on_test_start();
        // A site left over from an earlier case must not be blamed on this one.
        let _ = take_panic_site();
        let result = self.out.printer.case_start(&case_id);
        self.out.keep(result);
        self.out
            .log(LogEntry::new(LogLevel::Info, "case_start").with_case(case.suite, case.name));

        let mut ctx = CaseContext {
            tracker: &mut self.tracker,
            out: &mut self.out,
            case,
            tallied: Vec::new(),
            expected_failures: 0,
            guard: None,
        };
        ctx.set_up();
        let result = catch_boundary(|| (case.body)(&mut ctx));
        ctx.settle(result);
        ctx.tear_down();
        ctx.end_expectations();
        let CaseContext {
            tallied,
            expected_failures,
            ..
        } = ctx;

        let status = if tallied.iter().any(Outcome::is_failure) {
            CaseStatus::Failed
        } else if tallied.iter().any(|o| o.kind == OutcomeKind::Skipped) {
            CaseStatus::Skipped
        } else {
            CaseStatus::Passed
        };
        let duration_ms = elapsed_ms(started);
        let result = self.out.printer.case_end(&case_id, status, duration_ms);
        self.out.keep(result);
        let level = LogLevel::for_verdict(status == CaseStatus::Failed);
        self.out.log(
            LogEntry::new(level, "case_end")
                .with_case(case.suite, case.name)
                .with_duration_ms(duration_ms)
                .with_details(serde_json::json!({
                    "status": status,
                    "expected_failures": expected_failures,
                })),
        );

        CaseReport {
            suite: case.suite.to_string(),
            name: case.name.to_string(),
            status,
            duration_ms,
            expected_failures,
            outcomes: tallied,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("title", &self.title)
            .field("tracker", &self.tracker)
            .finish_non_exhaustive()
    }
}

fn set_up_suite(fixture: FixtureKind) {
    if fixture == FixtureKind::FailureBridge {
        install_abort_hook(None);
    }
}

fn tear_down_suite(fixture: FixtureKind) {
    if fixture == FixtureKind::FailureBridge {
        install_abort_hook(None);
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[track_caller]
fn caller_site() -> Location {
    let caller = std::panic::Location::caller();
    Location::new(caller.file(), caller.line())
}

/// What a running case can do: report outcomes and manage its expectation budget.
///
/// Checks that pass report nothing. Failing checks and [`CaseContext::succeed`]
/// go through the reporting pipeline, where an open expectation window may
/// rewrite them.
pub struct CaseContext<'s> {
    tracker: &'s mut ExpectationTracker,
    out: &'s mut Outputs,
    case: &'s TestCase,
    tallied: Vec<Outcome>,
    expected_failures: u32,
    guard: Option<HandlerGuard>,
}

impl CaseContext<'_> {
    /// Declare that the next `count` failures reported by this case are intended.
    ///
    /// Zero is a no-op. Opening a window while one is pending is an error;
    /// propagate it with `?` and the runner reports it.
    pub fn mark_expected_failures(&mut self, count: u32) -> CaseResult {
        self.tracker.mark(count)?;
        let remaining = self.tracker.remaining();
        self.log_entry(
            LogEntry::new(LogLevel::Debug, "expectation_marked").with_remaining(remaining),
        );
        Ok(())
    }

    /// True while expected failures are still pending.
    #[must_use]
    pub fn expectation_active(&self) -> bool {
        self.tracker.is_active()
    }

    /// Non-fatal check; returns `condition`.
    #[track_caller]
    pub fn expect(&mut self, condition: bool, what: &str) -> bool {
        if !condition {
            let message = format!("Value of: {what}\n  Actual: false\nExpected: true");
            self.report(Outcome::non_fatal(message).at(Some(caller_site())));
        }
        condition
    }

    /// Non-fatal equality check; returns whether the values matched.
    #[track_caller]
    pub fn expect_eq<T: PartialEq + fmt::Debug>(&mut self, expected: T, actual: T) -> bool {
        let equal = expected == actual;
        if !equal {
            let message =
                format!("Expected equality of these values:\n  {expected:?}\n  {actual:?}");
            self.report(Outcome::non_fatal(message).at(Some(caller_site())));
        }
        equal
    }

    /// Non-fatal inequality check; returns whether the values differed.
    #[track_caller]
    pub fn expect_ne<T: PartialEq + fmt::Debug>(&mut self, left: T, right: T) -> bool {
        let differ = left != right;
        if !differ {
            let message = format!("Expected: ({left:?}) != ({right:?}), actual: equal");
            self.report(Outcome::non_fatal(message).at(Some(caller_site())));
        }
        differ
    }

    /// Fatal check: on failure, reports and returns `Err` so `?` ends the case.
    #[track_caller]
    pub fn ensure(&mut self, condition: bool, what: &str) -> CaseResult {
        if condition {
            return Ok(());
        }
        let message = format!("Value of: {what}\n  Actual: false\nExpected: true");
        self.report(Outcome::fatal(message).at(Some(caller_site())));
        Err(CaseError::Aborted)
    }

    /// Report an unconditional non-fatal failure.
    #[track_caller]
    pub fn add_failure(&mut self, message: &str) {
        self.report(Outcome::non_fatal(message).at(Some(caller_site())));
    }

    /// Report an explicit success.
    #[track_caller]
    pub fn succeed(&mut self, what: &str) {
        let message = if what.is_empty() { "Succeeded" } else { what };
        self.report(Outcome::success(message).at(Some(caller_site())));
    }

    /// Report a skip; return the result to stop the case.
    #[track_caller]
    pub fn skip(&mut self, why: &str) -> CaseResult {
        self.report(Outcome::skipped(why).at(Some(caller_site())));
        Err(CaseError::Skipped)
    }

    /// Any failure reached the tally.
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.tallied.iter().any(Outcome::is_failure)
    }

    #[must_use]
    pub fn has_fatal_failure(&self) -> bool {
        self.tallied
            .iter()
            .any(|o| o.kind == OutcomeKind::FatalFailure)
    }

    #[must_use]
    pub fn has_nonfatal_failure(&self) -> bool {
        self.tallied
            .iter()
            .any(|o| o.kind == OutcomeKind::NonFatalFailure)
    }

    fn report(&mut self, outcome: Outcome) {
        let shown = self.tracker.pre_display(outcome);
        self.log_outcome(Stage::PreDisplay, &shown);
        let result = self.out.printer.outcome(&shown);
        self.out.keep(result);

        let pending = self.tracker.remaining();
        let tallied = self.tracker.post_tally(shown);
        if self.tracker.remaining() < pending {
            self.expected_failures += 1;
        }
        self.log_outcome(Stage::PostTally, &tallied);
        self.tallied.push(tallied);
    }

    fn report_bypass(&mut self, outcome: Outcome) {
        self.log_outcome(Stage::Bypass, &outcome);
        let result = self.out.printer.outcome(&outcome);
        self.out.keep(result);
        self.tallied.push(outcome);
    }

    fn set_up(&mut self) {
        if self.case.fixture == FixtureKind::FailureBridge {
            self.guard = Some(FailureHandlerChain::install(
                BridgeHandlers::failure_bridge(),
            ));
        }
    }

    fn settle(&mut self, result: Result<CaseResult, FailureSignal>) {
        match result {
            Ok(Ok(()) | Err(CaseError::Aborted | CaseError::Skipped)) => {}
            Ok(Err(CaseError::Signal(signal))) => {
                let location = signal.location().cloned();
                let message = format!(
                    "{} signal raised in the test body: {signal}",
                    signal.kind_name()
                );
                self.report(Outcome::fatal(message).at(location));
            }
            Ok(Err(CaseError::Tracker(err))) => {
                self.report_bypass(Outcome::fatal(err.to_string()));
            }
            Err(signal) => {
                let location = signal.location().cloned().or_else(take_panic_site);
                let message = format!(
                    "{} signal escaped the test body: {signal}",
                    signal.kind_name()
                );
                self.report(Outcome::fatal(message).at(location));
            }
        }
    }

    fn tear_down(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        guard.release();
        let (fatal, any, nonfatal) = (
            self.has_fatal_failure(),
            self.has_failure(),
            self.has_nonfatal_failure(),
        );
        self.expect(!fatal, "!has_fatal_failure()");
        self.expect(!any, "!has_failure()");
        self.expect(!nonfatal, "!has_nonfatal_failure()");
    }

    fn end_expectations(&mut self) {
        if let Err(err @ TrackerError::StaleBudget { remaining }) = self.tracker.on_test_end() {
            self.log_entry(
                LogEntry::new(LogLevel::Error, "stale_budget").with_remaining(remaining),
            );
            self.report_bypass(Outcome::fatal(err.to_string()));
        }
    }

    fn log_outcome(&mut self, stage: Stage, outcome: &Outcome) {
        let remaining = self.tracker.remaining();
        self.log_entry(LogEntry::observed(stage, outcome).with_remaining(remaining));
    }

    fn log_entry(&mut self, entry: LogEntry) {
        let entry = entry.with_case(self.case.suite, self.case.name);
        self.out.log(entry);
    }
}
