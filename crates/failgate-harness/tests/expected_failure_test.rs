//! Integration test: expected-failure budgets through a full session.
//!
//! Validates that:
//! 1. A budget of N absorbed by exactly N failures leaves the case passing.
//! 2. A failure after the budget is exhausted is a genuine failure.
//! 3. A budget left over at case end fails that case and not the next one.
//! 4. The tally keeps the original message while the printer shows the annotated one.
//!
//! Run: cargo test -p failgate-harness --test expected_failure_test

use failgate_core::OutcomeKind;
use failgate_core::tracker::EXPECTED_FAILURE_PREFIX;
use failgate_harness::printer::Printer;
use failgate_harness::{
    CaseContext, CaseResult, CaseStatus, Session, SessionConfig, SessionReport, TestCase,
};

fn run(cases: &[TestCase]) -> (SessionReport, String) {
    let (printer, printed) = Printer::to_buffer();
    let mut session = Session::new(SessionConfig::new().with_run_id("expected-failure"))
        .expect("session without a log path")
        .with_printer(printer);
    let report = session.run(cases).expect("buffered output never fails");
    (report, printed.contents())
}

fn five_failures(ctx: &mut CaseContext<'_>) -> CaseResult {
    for i in 0..5 {
        ctx.expect_eq(i, i + 1);
    }
    Ok(())
}

#[test]
fn exact_budget_nets_zero_failures() {
    let (report, printed) = run(&[TestCase::new("Budget", "Exact", |ctx| {
        ctx.mark_expected_failures(5)?;
        five_failures(ctx)
    })]);

    let case = &report.cases[0];
    assert_eq!(case.status, CaseStatus::Passed);
    assert_eq!(case.expected_failures, 5);
    assert_eq!(case.failures(), 0);
    assert_eq!(printed.matches(EXPECTED_FAILURE_PREFIX).count(), 5);
}

#[test]
fn failure_after_exhaustion_is_genuine() {
    let (report, printed) = run(&[TestCase::new("Budget", "Overrun", |ctx| {
        ctx.mark_expected_failures(5)?;
        five_failures(ctx)?;
        ctx.expect(false, "sixth");
        Ok(())
    })]);

    let case = &report.cases[0];
    assert_eq!(case.status, CaseStatus::Failed);
    assert_eq!(case.failures(), 1);
    let last = case.outcomes.last().expect("sixth outcome tallied");
    assert_eq!(last.kind, OutcomeKind::NonFatalFailure);
    assert!(printed.contains("Value of: sixth"));
    assert!(!printed.contains(&format!("{EXPECTED_FAILURE_PREFIX}Value of: sixth")));
}

#[test]
fn short_budget_fails_only_its_own_case() {
    let (report, printed) = run(&[
        TestCase::new("Budget", "Short", |ctx| {
            ctx.mark_expected_failures(3)?;
            ctx.expect(false, "only one");
            Ok(())
        }),
        TestCase::new("Budget", "After", |ctx| {
            ctx.ensure(!ctx.expectation_active(), "!expectation_active()")
        }),
    ]);

    assert_eq!(report.failed, 1);
    let short = report.case("Budget.Short").expect("short case ran");
    assert_eq!(short.status, CaseStatus::Failed);
    assert_eq!(short.expected_failures, 1);
    assert!(
        printed.contains("test ended with 2 expected failure(s) that never occurred"),
        "{printed}"
    );
    assert_eq!(
        report.case("Budget.After").map(|c| c.status),
        Some(CaseStatus::Passed)
    );
}

#[test]
fn tally_keeps_original_message() {
    let (report, printed) = run(&[TestCase::new("Budget", "Message", |ctx| {
        ctx.mark_expected_failures(1)?;
        ctx.add_failure("disk quota exceeded");
        Ok(())
    })]);

    let outcome = &report.cases[0].outcomes[0];
    assert_eq!(outcome.kind, OutcomeKind::Success);
    assert_eq!(outcome.message, "disk quota exceeded");
    assert!(printed.contains(&format!("{EXPECTED_FAILURE_PREFIX}disk quota exceeded")));
    let location = outcome.location.as_ref().expect("call site attached");
    assert!(location.file.ends_with("expected_failure_test.rs"));
}

#[test]
fn zero_mark_is_a_no_op() {
    let (report, _) = run(&[TestCase::new("Budget", "Zero", |ctx| {
        ctx.mark_expected_failures(0)?;
        ctx.ensure(!ctx.expectation_active(), "!expectation_active()")?;
        ctx.mark_expected_failures(1)?;
        ctx.expect_ne("same", "same");
        Ok(())
    })]);
    assert!(report.all_passed());
}

#[test]
fn skipped_outcome_leaves_budget_alone() {
    let (report, _) = run(&[TestCase::new("Budget", "SkipInsideWindow", |ctx| {
        ctx.mark_expected_failures(1)?;
        ctx.add_failure("consumes the budget");
        ctx.skip("rest needs a network")
    })]);
    let case = &report.cases[0];
    assert_eq!(case.status, CaseStatus::Skipped);
    assert_eq!(case.expected_failures, 1);
}
