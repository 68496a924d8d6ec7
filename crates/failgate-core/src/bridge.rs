//! Failure bridge: turn would-be aborts into one reportable [`FailureSignal`].
//!
//! The handlers in this module are the ones a test installs (normally via
//! [`crate::FailureHandlerChain`]) so that fatal log events, invariant
//! violations and escaped panics end the current unit of work instead of the
//! process.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::config;
use crate::fatal_log::{AbortDisposition, FatalEvent};
use crate::invariant::{self, AssertionDisposition, AssertionInfo};
use crate::signal::FailureSignal;

const UNHANDLED_PREFIX: &str = "Unhandled exception: ";

/// Abort hook that raises the fatal event as a signal carrying its message.
pub fn raise_failure_signal(event: &FatalEvent) -> AbortDisposition {
    AbortDisposition::Raise(FailureSignal::Fatal {
        message: event.message.clone(),
        location: Some(event.location.clone()),
    })
}

/// Assertion handler that raises the fixed-width rendering as a signal.
pub fn raise_on_violation(info: &AssertionInfo) -> AssertionDisposition {
    AssertionDisposition::Raise(FailureSignal::Assertion {
        rendered: info.render(config::render_width()),
    })
}

/// Uncaught handler: wrap the escaped payload as an `Unhandled` signal.
///
/// Being invoked with no pending payload is a contract violation and yields an
/// `Internal` signal naming it rather than a silent success.
pub fn normalize_uncaught(payload: Option<&(dyn Any + Send)>) -> FailureSignal {
    match payload {
        Some(payload) => FailureSignal::Unhandled {
            message: format!("{UNHANDLED_PREFIX}{}", describe_payload(payload)),
        },
        None => FailureSignal::Internal {
            condition: "uncaught handler invoked without a pending panic payload".into(),
        },
    }
}

/// Reduce an owned panic payload to one signal.
///
/// A payload that already is a [`FailureSignal`], by value or boxed, is
/// returned as-is and never reaches the installed uncaught handler; that
/// handler only sees foreign payloads (panic messages and other values).
/// The payload allocation is released before returning.
pub fn normalize_payload(payload: Box<dyn Any + Send>) -> FailureSignal {
    let payload = match payload.downcast::<FailureSignal>() {
        Ok(signal) => return *signal,
        Err(other) => other,
    };
    let payload = match payload.downcast::<Box<FailureSignal>>() {
        Ok(boxed) => return **boxed,
        Err(other) => other,
    };
    let handler = invariant::uncaught_handler().unwrap_or(normalize_uncaught);
    handler(Some(&*payload))
}

/// Run `f`, catching any unwinding exactly once and normalizing it.
pub fn catch_boundary<T>(f: impl FnOnce() -> T) -> Result<T, FailureSignal> {
    catch_unwind(AssertUnwindSafe(f)).map_err(normalize_payload)
}

fn describe_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(signal) = payload.downcast_ref::<FailureSignal>() {
        return signal.to_string();
    }
    if let Some(signal) = payload.downcast_ref::<Box<FailureSignal>>() {
        return signal.to_string();
    }
    if let Some(msg) = payload.downcast_ref::<String>() {
        return msg.clone();
    }
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        return (*msg).to_string();
    }
    String::from("UNKNOWN TYPE")
}
