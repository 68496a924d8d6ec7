//! Session harness for failgate.
//!
//! This crate provides:
//! - A serialized session runner that feeds every reported outcome through the
//!   expectation tracker's two stages around a gtest-style printer
//! - The `FailureBridge` fixture, which installs the failure bridge around
//!   each case and checks the case ended clean
//! - JSONL structured logging and session reports
//! - A built-in self-check suite exercising both core mechanisms

#![forbid(unsafe_code)]

pub mod config;
pub mod printer;
pub mod report;
pub mod self_check;
pub mod session;
pub mod sink;
pub mod structured_log;

pub use config::SessionConfig;
pub use report::{CaseReport, CaseStatus, SessionReport};
pub use session::{
    CaseBody, CaseContext, CaseError, CaseResult, FixtureKind, Session, SessionError, TestCase,
};
pub use sink::SharedBuffer;
