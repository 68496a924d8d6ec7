//! Test-oracle core for failgate.
//!
//! This crate provides:
//! - Expectation tracking: declare that the next N reported failures are
//!   intentional and rewrite their outcomes so the tally reads as a pass
//! - Failure bridging: turn fatal-log aborts, invariant violations and escaped
//!   panics into one [`FailureSignal`] instead of a dead process
//! - Scoped handler installation: [`HandlerGuard`] restores whatever was
//!   installed before, on every exit path
//! - The host seams those pieces attach to: a fatal-log call site with an
//!   installable abort hook and an invariant facility with installable handlers

#![forbid(unsafe_code)]

pub mod bridge;
pub mod config;
pub mod fatal_log;
pub mod guard;
pub mod invariant;
pub mod outcome;
pub mod signal;
pub mod tracker;

pub use bridge::{catch_boundary, normalize_payload};
pub use fatal_log::{
    AbortDisposition, AbortHook, FatalEvent, has_custom_abort_hook, install_abort_hook,
};
pub use guard::{BridgeHandlers, FailureHandlerChain, HandlerGuard, take_panic_site};
pub use invariant::{AssertionInfo, AssertionKind};
pub use outcome::{Outcome, OutcomeKind};
pub use signal::{FailureSignal, Location};
pub use tracker::{ExpectationTracker, Phase, TrackerError};
