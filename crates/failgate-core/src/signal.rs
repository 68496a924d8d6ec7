//! The typed control-flow signal raised in place of a process abort.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Source position of the call that raised a signal or reported an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A failure that would otherwise have terminated the process.
///
/// Values of this type travel either as the `Err` side of a `Result` (the
/// default) or, when a caller opts into unwinding with [`FailureSignal::unwind`],
/// as a panic payload that [`crate::catch_boundary`] recovers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureSignal {
    /// A fatal-severity log event intercepted by the abort hook.
    #[error("{message}")]
    Fatal {
        message: String,
        location: Option<Location>,
    },
    /// A panic that escaped every catch point inside a unit of work.
    #[error("{message}")]
    Unhandled { message: String },
    /// An invariant violation rendered by the assertion facility.
    #[error("{rendered}")]
    Assertion { rendered: String },
    /// The bridge itself was driven outside its contract.
    #[error("INTERNAL ERROR? {condition}")]
    Internal { condition: String },
}

impl FailureSignal {
    /// Fatal signal without a known origin.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
            location: None,
        }
    }

    /// Origin of the signal, when one was captured.
    #[must_use]
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Fatal { location, .. } => location.as_ref(),
            _ => None,
        }
    }

    /// Stable short name used in logs and reports.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Fatal { .. } => "fatal",
            Self::Unhandled { .. } => "unhandled",
            Self::Assertion { .. } => "assertion",
            Self::Internal { .. } => "internal",
        }
    }

    /// Unwind the current thread with this signal as the panic payload.
    pub fn unwind(self) -> ! {
        std::panic::panic_any(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_carried_text() {
        let sig = FailureSignal::fatal("disk on fire");
        assert_eq!(sig.to_string(), "disk on fire");

        let sig = FailureSignal::Internal {
            condition: "no pending payload".into(),
        };
        assert_eq!(sig.to_string(), "INTERNAL ERROR? no pending payload");
    }

    #[test]
    fn location_only_on_fatal() {
        let sig = FailureSignal::Fatal {
            message: "x".into(),
            location: Some(Location::new("src/a.rs", 7)),
        };
        assert_eq!(
            sig.location().map(ToString::to_string).as_deref(),
            Some("src/a.rs:7")
        );
        assert!(
            FailureSignal::Assertion {
                rendered: "r".into()
            }
            .location()
            .is_none()
        );
    }

    #[test]
    fn unwind_carries_signal_as_payload() {
        let payload = std::panic::catch_unwind::<_, ()>(|| FailureSignal::fatal("boom").unwind())
            .expect_err("unwind must panic");
        let sig = payload
            .downcast_ref::<FailureSignal>()
            .expect("payload is a FailureSignal");
        assert_eq!(sig.kind_name(), "fatal");
    }
}
