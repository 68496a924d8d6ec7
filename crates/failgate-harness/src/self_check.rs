//! Built-in self-check suite.
//!
//! Every case here deliberately trips failures and marks them as expected, so
//! a healthy build ends the session with zero failed cases. A non-zero tally
//! means the tracker or the bridge misbehaved.

use failgate_core::invariant::has_custom_assertion_handler;
use failgate_core::{FailureSignal, debug_invariant, fatal, has_custom_abort_hook, invariant};

use crate::session::{CaseContext, CaseResult, FixtureKind, TestCase};

pub const EXPECTED_FAILURE_SUITE: &str = "ExpectedFailureHandling";
pub const FAILURE_BRIDGE_SUITE: &str = "FailureBridgeHandling";

static CASES: [TestCase; 12] = [
    TestCase::new(EXPECTED_FAILURE_SUITE, "NoMarkCarriedOver_1", no_mark_carried_over),
    TestCase::new(EXPECTED_FAILURE_SUITE, "AutoResetOfSingleMark", auto_reset_single),
    TestCase::new(EXPECTED_FAILURE_SUITE, "NoMarkCarriedOver_2", no_mark_carried_over),
    TestCase::new(EXPECTED_FAILURE_SUITE, "AutoResetOfMultipleMark", auto_reset_multiple),
    TestCase::new(EXPECTED_FAILURE_SUITE, "NoMarkCarriedOver_3", no_mark_carried_over),
    TestCase::new(
        EXPECTED_FAILURE_SUITE,
        "PassingChecksDoNotConsumeMark",
        passing_checks_do_not_consume,
    ),
    TestCase::new(EXPECTED_FAILURE_SUITE, "FatalCheckConsumesMark", fatal_check_consumes),
    TestCase::new(EXPECTED_FAILURE_SUITE, "NoMarkCarriedOver_4", no_mark_carried_over),
    TestCase::new(FAILURE_BRIDGE_SUITE, "FatalLogRaisesSignal", fatal_log_raises)
        .with_fixture(FixtureKind::FailureBridge),
    TestCase::new(FAILURE_BRIDGE_SUITE, "InnerCodePanics", inner_code_panics)
        .with_fixture(FixtureKind::FailureBridge),
    TestCase::new(FAILURE_BRIDGE_SUITE, "InnerCodeHitsAnInvariant", inner_code_hits_invariant)
        .with_fixture(FixtureKind::FailureBridge),
    TestCase::new(FAILURE_BRIDGE_SUITE, "SignalUnwindsThroughFrames", signal_unwinds)
        .with_fixture(FixtureKind::FailureBridge),
];

/// The self-check cases, in run order.
#[must_use]
pub fn cases() -> &'static [TestCase] {
    &CASES
}

fn no_mark_carried_over(ctx: &mut CaseContext<'_>) -> CaseResult {
    let active = ctx.expectation_active();
    ctx.expect(!active, "!expectation_active()");
    Ok(())
}

fn auto_reset_single(ctx: &mut CaseContext<'_>) -> CaseResult {
    ctx.mark_expected_failures(1)?;
    let active = ctx.expectation_active();
    ctx.expect(active, "expectation_active()");

    ctx.expect(false, "false");

    let active = ctx.expectation_active();
    ctx.expect(!active, "!expectation_active()");
    ctx.expect(true, "true");
    Ok(())
}

fn auto_reset_multiple(ctx: &mut CaseContext<'_>) -> CaseResult {
    ctx.mark_expected_failures(5)?;
    let active = ctx.expectation_active();
    ctx.expect(active, "expectation_active()");

    ctx.expect(false, "false");

    let active = ctx.expectation_active();
    ctx.expect(active, "expectation_active()");

    ctx.expect(false, "false");
    ctx.expect_eq(0x1337, 0xDEAD);
    ctx.expect_ne(7, 7);

    let active = ctx.expectation_active();
    ctx.expect(active, "expectation_active()");

    ctx.expect(false, "true == false");

    let active = ctx.expectation_active();
    ctx.expect(!active, "!expectation_active()");
    Ok(())
}

fn passing_checks_do_not_consume(ctx: &mut CaseContext<'_>) -> CaseResult {
    ctx.mark_expected_failures(1)?;
    let active = ctx.expectation_active();
    ctx.expect(active, "expectation_active()");

    // Passes, so nothing is reported and the mark keeps waiting.
    ctx.expect(true, "true");

    let active = ctx.expectation_active();
    ctx.expect(active, "expectation_active()");

    ctx.expect(false, "false");

    let active = ctx.expectation_active();
    ctx.expect(!active, "!expectation_active()");
    Ok(())
}

fn fatal_check_consumes(ctx: &mut CaseContext<'_>) -> CaseResult {
    ctx.mark_expected_failures(1)?;
    ctx.ensure(1 + 1 == 3, "1 + 1 == 3")?;
    ctx.add_failure("never to arrive here");
    Ok(())
}

fn open_ledger() -> Result<(), FailureSignal> {
    Err(fatal!("Buggerit Millenium Hand & Shrimp!"))
}

fn fatal_log_raises(ctx: &mut CaseContext<'_>) -> CaseResult {
    let hooked = has_custom_abort_hook();
    ctx.expect(hooked, "has_custom_abort_hook()");

    ctx.mark_expected_failures(1)?;
    open_ledger()?;

    ctx.add_failure("never to arrive here");
    Ok(())
}

fn fake_library_call() {
    panic!("blargh!");
}

fn inner_code_panics(ctx: &mut CaseContext<'_>) -> CaseResult {
    ctx.mark_expected_failures(1)?;
    fake_library_call();
    ctx.add_failure("never to arrive here");
    Ok(())
}

fn checked_library_call() -> Result<(), FailureSignal> {
    debug_invariant!(false, "debug builds stop here")?;
    invariant!(false, "release builds stop here")?;
    Ok(())
}

fn inner_code_hits_invariant(ctx: &mut CaseContext<'_>) -> CaseResult {
    let hooked = has_custom_assertion_handler();
    ctx.expect(hooked, "has_custom_assertion_handler()");

    ctx.mark_expected_failures(1)?;
    checked_library_call()?;
    ctx.add_failure("never to arrive here");
    Ok(())
}

fn deep_library_call(depth: u32) -> u32 {
    if depth == 0 {
        fatal!("ran out of stack budget").unwind();
    }
    deep_library_call(depth - 1) + 1
}

fn signal_unwinds(ctx: &mut CaseContext<'_>) -> CaseResult {
    ctx.mark_expected_failures(1)?;
    let reached = deep_library_call(8);
    ctx.add_failure(&format!("never to arrive here (depth {reached})"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;
    use crate::printer::Printer;
    use crate::report::CaseStatus;
    use crate::session::Session;

    #[test]
    fn case_ids_are_unique() {
        let mut ids: Vec<String> = cases().iter().map(TestCase::id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), cases().len());
    }

    #[test]
    fn self_check_passes_with_every_failure_expected() {
        let (printer, printed) = Printer::to_buffer();
        let mut session = Session::new(SessionConfig::new())
            .unwrap()
            .with_printer(printer);
        let report = session.run(cases()).unwrap();

        assert!(report.all_passed(), "{}", printed.contents());
        assert_eq!(report.total, cases().len());
        let multiple = report
            .case("ExpectedFailureHandling.AutoResetOfMultipleMark")
            .unwrap();
        assert_eq!(multiple.expected_failures, 5);
        for case in &report.cases {
            assert_eq!(case.status, CaseStatus::Passed, "{}", case.id());
        }
    }
}
