//! Session reports.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use failgate_core::Outcome;

/// Final verdict of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

impl CaseStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASS",
            Self::Failed => "FAIL",
            Self::Skipped => "SKIP",
        }
    }
}

/// Result of one case as tallied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub suite: String,
    pub name: String,
    pub status: CaseStatus,
    pub duration_ms: u64,
    /// Failures absorbed by an expectation budget.
    pub expected_failures: u32,
    /// Every outcome as it reached the tally, in report order.
    pub outcomes: Vec<Outcome>,
}

impl CaseReport {
    /// `suite.name`, as printed and filtered on.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}.{}", self.suite, self.name)
    }

    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}

/// Totals and per-case results for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub title: String,
    pub run_id: String,
    /// Timestamp (UTC).
    pub timestamp: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub cases: Vec<CaseReport>,
}

impl SessionReport {
    /// Build totals from case results.
    #[must_use]
    pub fn from_cases(
        title: impl Into<String>,
        run_id: impl Into<String>,
        duration_ms: u64,
        cases: Vec<CaseReport>,
    ) -> Self {
        let count = |status| cases.iter().filter(|c| c.status == status).count();
        Self {
            title: title.into(),
            run_id: run_id.into(),
            timestamp: crate::structured_log::now_utc(),
            total: cases.len(),
            passed: count(CaseStatus::Passed),
            failed: count(CaseStatus::Failed),
            skipped: count(CaseStatus::Skipped),
            duration_ms,
            cases,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Look up a case by `suite.name`.
    #[must_use]
    pub fn case(&self, case_id: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.id() == case_id)
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {}\n", self.title);
        let _ = writeln!(out, "- Run: {}", self.run_id);
        let _ = writeln!(out, "- Timestamp: {}", self.timestamp);
        let _ = writeln!(out, "- Total: {}", self.total);
        let _ = writeln!(out, "- Passed: {}", self.passed);
        let _ = writeln!(out, "- Failed: {}", self.failed);
        let _ = writeln!(out, "- Skipped: {}\n", self.skipped);

        out.push_str("| Case | Expected failures | Failures | Status |\n");
        out.push_str("|------|-------------------|----------|--------|\n");
        for case in &self.cases {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                case.id(),
                case.expected_failures,
                case.failures(),
                case.status.as_str()
            );
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
