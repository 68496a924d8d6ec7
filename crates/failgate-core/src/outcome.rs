//! Assertion outcomes as seen by the reporting pipeline.

use serde::{Deserialize, Serialize};

use crate::signal::Location;

/// Classification of a single reported assertion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    NonFatalFailure,
    FatalFailure,
    Skipped,
}

impl OutcomeKind {
    /// True for both failure severities.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::NonFatalFailure | Self::FatalFailure)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NonFatalFailure => "non_fatal_failure",
            Self::FatalFailure => "fatal_failure",
            Self::Skipped => "skipped",
        }
    }
}

/// One reported assertion result.
///
/// Outcomes are produced by the harness; the tracker rewrites transient copies
/// of them between the display and tally stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Outcome {
    #[must_use]
    pub fn new(kind: OutcomeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(OutcomeKind::Success, message)
    }

    #[must_use]
    pub fn non_fatal(message: impl Into<String>) -> Self {
        Self::new(OutcomeKind::NonFatalFailure, message)
    }

    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(OutcomeKind::FatalFailure, message)
    }

    #[must_use]
    pub fn skipped(message: impl Into<String>) -> Self {
        Self::new(OutcomeKind::Skipped, message)
    }

    /// Attach the source location of the reporting call.
    #[must_use]
    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.kind.is_failure()
    }
}
