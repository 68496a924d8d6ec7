//! Expected-failure tracking.
//!
//! A test declares a budget of upcoming failures with [`ExpectationTracker::mark`].
//! Every outcome the harness reports is then seen twice by the tracker: once
//! before the harness displays it ([`ExpectationTracker::pre_display`]) and once
//! after, right before it is tallied ([`ExpectationTracker::post_tally`]).
//!
//! The first visit controls what the operator sees: expected failures keep their
//! failure kind so the printer still shows them, annotated as expected. The
//! second visit controls the tally: the buffered original comes back, expected
//! failures are flipped to [`OutcomeKind::Success`] and the budget drains by one.
//! A success arriving while failures are expected is a defect at both visits and
//! does not consume the budget.

use thiserror::Error;

use crate::outcome::{Outcome, OutcomeKind};

/// Prefix added at display time to a success that arrived while a failure was expected.
pub const UNEXPECTED_SUCCESS_PREFIX: &str = "(**UNEXPECTED SUCCESS --> FAULT**) :: ";

/// Prefix added at display time to a failure consumed by the budget.
pub const EXPECTED_FAILURE_PREFIX: &str = "(EXPECTED FAILURE --> SUCCESS) :: ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    #[error(
        "cannot open a new expectation window while {remaining} expected failure(s) are still pending"
    )]
    NestedWindow { remaining: u32 },
    #[error("test ended with {remaining} expected failure(s) that never occurred")]
    StaleBudget { remaining: u32 },
}

/// Which visit of the two-pass pipeline the next outcome belongs to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Next outcome is a first (pre-display) visit.
    #[default]
    Idle,
    /// A pre-display visit has been seen; the next one is its post-tally visit.
    ReportedOnce,
}

/// Per-session expectation budget.
///
/// One tracker is owned by the session runner and lent to each test case; it is
/// reset at the start of every case and checked at the end of it.
#[derive(Debug, Default)]
pub struct ExpectationTracker {
    remaining: u32,
    phase: Phase,
    buffered: Option<Outcome>,
}

impl ExpectationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that the next `count` failures are expected.
    ///
    /// A count of zero is a no-op. Windows do not nest: marking while a
    /// previous window still has pending failures is an error.
    pub fn mark(&mut self, count: u32) -> Result<(), TrackerError> {
        if count == 0 {
            return Ok(());
        }
        if self.remaining != 0 {
            return Err(TrackerError::NestedWindow {
                remaining: self.remaining,
            });
        }
        self.remaining = count;
        Ok(())
    }

    /// True while expected failures are still pending.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Single entry point for hosts that deliver both visits through one callback.
    ///
    /// Dispatches on [`Phase`]: an idle tracker treats the outcome as a
    /// pre-display visit, a tracker that has seen one treats it as post-tally.
    pub fn on_outcome_reported(&mut self, outcome: Outcome) -> Outcome {
        match self.phase {
            Phase::Idle => self.pre_display(outcome),
            Phase::ReportedOnce => self.post_tally(outcome),
        }
    }

    /// First visit: decide what the display stage shows.
    pub fn pre_display(&mut self, outcome: Outcome) -> Outcome {
        if self.remaining == 0 {
            return outcome;
        }

        self.phase = Phase::ReportedOnce;
        self.buffered = None;

        let mut shown = outcome.clone();
        match outcome.kind {
            OutcomeKind::Success => {
                shown.message = format!("{UNEXPECTED_SUCCESS_PREFIX}{}", outcome.message);
                shown.kind = OutcomeKind::NonFatalFailure;
                self.buffered = Some(outcome);
            }
            OutcomeKind::NonFatalFailure | OutcomeKind::FatalFailure => {
                // Kind stays a failure here: a success-kind outcome is printed silently.
                shown.message = format!("{EXPECTED_FAILURE_PREFIX}{}", outcome.message);
                self.buffered = Some(outcome);
            }
            OutcomeKind::Skipped => {}
        }
        shown
    }

    /// Second visit: restore the buffered original and decide what is tallied.
    pub fn post_tally(&mut self, outcome: Outcome) -> Outcome {
        if self.remaining == 0 {
            return outcome;
        }

        self.phase = Phase::Idle;
        let mut tallied = self.buffered.take().unwrap_or(outcome);
        match tallied.kind {
            OutcomeKind::Success => tallied.kind = OutcomeKind::NonFatalFailure,
            OutcomeKind::NonFatalFailure | OutcomeKind::FatalFailure => {
                self.remaining -= 1;
                tallied.kind = OutcomeKind::Success;
            }
            OutcomeKind::Skipped => {}
        }
        tallied
    }

    /// Reset all state for a new test case.
    pub fn on_test_start(&mut self) {
        self.remaining = 0;
        self.phase = Phase::Idle;
        self.buffered = None;
    }

    /// Check that the case drained its budget.
    ///
    /// State is cleared either way so the next case starts from zero; the
    /// returned error is the caller's to report.
    pub fn on_test_end(&mut self) -> Result<(), TrackerError> {
        let remaining = std::mem::take(&mut self.remaining);
        self.phase = Phase::Idle;
        self.buffered = None;
        if remaining != 0 {
            return Err(TrackerError::StaleBudget { remaining });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_passes(tracker: &mut ExpectationTracker, outcome: Outcome) -> (Outcome, Outcome) {
        let shown = tracker.on_outcome_reported(outcome.clone());
        let tallied = tracker.on_outcome_reported(shown.clone());
        (shown, tallied)
    }

    #[test]
    fn inactive_tracker_passes_everything_through() {
        let mut tracker = ExpectationTracker::new();
        let failure = Outcome::non_fatal("Value of: true\n  Actual: true\nExpected: false");
        let (shown, tallied) = both_passes(&mut tracker, failure.clone());
        assert_eq!(shown, failure);
        assert_eq!(tallied, failure);
        assert_eq!(tracker.phase(), Phase::Idle);
    }

    #[test]
    fn single_mark_consumes_one_failure() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(1).unwrap();
        assert!(tracker.is_active());

        let (shown, tallied) = both_passes(&mut tracker, Outcome::non_fatal("false == true"));
        assert_eq!(shown.kind, OutcomeKind::NonFatalFailure);
        assert_eq!(
            shown.message,
            "(EXPECTED FAILURE --> SUCCESS) :: false == true"
        );
        assert_eq!(tallied.kind, OutcomeKind::Success);
        assert_eq!(tallied.message, "false == true");
        assert!(!tracker.is_active());
        assert!(tracker.on_test_end().is_ok());
    }

    #[test]
    fn fatal_failures_keep_their_kind_at_display() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(1).unwrap();
        let shown = tracker.pre_display(Outcome::fatal("ensure failed"));
        assert_eq!(shown.kind, OutcomeKind::FatalFailure);
        assert_eq!(tracker.phase(), Phase::ReportedOnce);
        let tallied = tracker.post_tally(shown);
        assert_eq!(tallied.kind, OutcomeKind::Success);
        assert_eq!(tracker.phase(), Phase::Idle);
    }

    #[test]
    fn five_marks_then_a_genuine_failure() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(5).unwrap();
        for i in 0..5 {
            let (shown, tallied) = both_passes(&mut tracker, Outcome::non_fatal(format!("f{i}")));
            assert!(shown.message.starts_with(EXPECTED_FAILURE_PREFIX));
            assert_eq!(tallied.kind, OutcomeKind::Success);
            assert_eq!(tracker.remaining(), 4 - i);
        }

        let (shown, tallied) = both_passes(&mut tracker, Outcome::non_fatal("sixth"));
        assert_eq!(shown.message, "sixth");
        assert_eq!(tallied.kind, OutcomeKind::NonFatalFailure);
    }

    #[test]
    fn unexpected_success_is_flagged_and_does_not_consume() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(1).unwrap();

        let (shown, tallied) = both_passes(&mut tracker, Outcome::success("it worked"));
        assert_eq!(shown.kind, OutcomeKind::NonFatalFailure);
        assert_eq!(
            shown.message,
            "(**UNEXPECTED SUCCESS --> FAULT**) :: it worked"
        );
        assert_eq!(tallied.kind, OutcomeKind::NonFatalFailure);
        assert_eq!(tallied.message, "it worked");
        assert!(tracker.is_active());

        let (_, tallied) = both_passes(&mut tracker, Outcome::non_fatal("now it fails"));
        assert_eq!(tallied.kind, OutcomeKind::Success);
        assert!(!tracker.is_active());
    }

    #[test]
    fn skipped_outcomes_are_untouched() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(2).unwrap();
        let skip = Outcome::skipped("not on this platform");
        let (shown, tallied) = both_passes(&mut tracker, skip.clone());
        assert_eq!(shown, skip);
        assert_eq!(tallied, skip);
        assert_eq!(tracker.remaining(), 2);
        assert_eq!(tracker.phase(), Phase::Idle);
    }

    #[test]
    fn tally_restores_original_message_verbatim() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(1).unwrap();
        let original = Outcome::fatal("line one\nline two :: with colons")
            .at(Some(crate::Location::new("src/lib.rs", 42)));
        let mut shown = tracker.pre_display(original.clone());
        // Display-side mutation must not leak into the tally.
        shown.message.push_str(" [printed]");
        let tallied = tracker.post_tally(shown);
        assert_eq!(tallied.message, original.message);
        assert_eq!(tallied.location, original.location);
    }

    #[test]
    fn nested_mark_is_rejected() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(2).unwrap();
        assert_eq!(
            tracker.mark(1),
            Err(TrackerError::NestedWindow { remaining: 2 })
        );
        assert_eq!(tracker.remaining(), 2);
    }

    #[test]
    fn zero_mark_is_a_noop() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(0).unwrap();
        assert!(!tracker.is_active());
        tracker.mark(3).unwrap();
        tracker.mark(0).unwrap();
        assert_eq!(tracker.remaining(), 3);
    }

    #[test]
    fn underconsumed_budget_is_reported_at_end() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(3).unwrap();
        let _ = both_passes(&mut tracker, Outcome::non_fatal("one"));
        assert_eq!(
            tracker.on_test_end(),
            Err(TrackerError::StaleBudget { remaining: 2 })
        );
        assert_eq!(tracker.remaining(), 0);
        assert!(tracker.on_test_end().is_ok());
    }

    #[test]
    fn start_resets_half_finished_pass() {
        let mut tracker = ExpectationTracker::new();
        tracker.mark(1).unwrap();
        let _ = tracker.pre_display(Outcome::non_fatal("interrupted"));
        assert_eq!(tracker.phase(), Phase::ReportedOnce);

        tracker.on_test_start();
        assert_eq!(tracker.phase(), Phase::Idle);
        assert_eq!(tracker.remaining(), 0);

        let failure = Outcome::non_fatal("fresh");
        assert_eq!(tracker.post_tally(failure.clone()), failure);
    }
}
