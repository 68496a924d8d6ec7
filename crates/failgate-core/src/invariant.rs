//! Invariant/assertion facility seam.
//!
//! Two process-wide handlers live here:
//! - the *assertion handler*, consulted by [`violation`] when an invariant
//!   check fails; with none installed the violation is printed and the process
//!   aborts.
//! - the *uncaught handler*, consulted by [`crate::catch_boundary`] when a
//!   panic escapes a unit of work; with none installed the boundary falls back
//!   to [`crate::bridge::normalize_uncaught`].

use std::any::Any;
use std::fmt::Write as _;

use parking_lot::RwLock;

use crate::config;
use crate::signal::{FailureSignal, Location};

/// Which facility entry point detected the violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionKind {
    DebugAssertion,
    Assertion,
    Assumption,
    Panic,
    Unreachable,
}

impl AssertionKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::DebugAssertion => "Debug Assertion",
            Self::Assertion => "Assertion",
            Self::Assumption => "Assumption",
            Self::Panic => "Panic",
            Self::Unreachable => "Unreachable",
        }
    }

    const fn macro_name(self) -> &'static str {
        match self {
            Self::DebugAssertion => "debug_invariant!",
            Self::Assertion => "invariant!",
            Self::Assumption => "assume!",
            Self::Panic => "panic!",
            Self::Unreachable => "unreachable!",
        }
    }
}

/// Everything known about one failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionInfo {
    pub kind: AssertionKind,
    pub expression: String,
    pub message: String,
    pub location: Location,
}

impl AssertionInfo {
    /// Render as plain text wrapped at `width` columns.
    ///
    /// ```text
    /// Assertion failed at src/ledger.rs:88: balance must not go negative
    ///     invariant!(balance >= 0);
    /// ```
    #[must_use]
    pub fn render(&self, width: usize) -> String {
        let mut header = format!("{} failed at {}", self.kind.label(), self.location);
        if !self.message.is_empty() {
            let _ = write!(header, ": {}", self.message);
        }
        let call = format!("{}({});", self.kind.macro_name(), self.expression);

        let mut out = String::new();
        for line in header.lines() {
            push_wrapped(&mut out, line, "", width);
        }
        for line in call.lines() {
            push_wrapped(&mut out, line, "    ", width);
        }
        out
    }
}

/// Append `line` prefixed by `indent`, hard-wrapped so no output line exceeds `width` chars.
fn push_wrapped(out: &mut String, line: &str, indent: &str, width: usize) {
    let continuation = format!("{indent}    ");
    let mut prefix = indent;
    let mut rest: Vec<char> = line.chars().collect();
    loop {
        let room = width.saturating_sub(prefix.chars().count()).max(1);
        if rest.len() <= room {
            out.push_str(prefix);
            out.extend(rest.iter());
            out.push('\n');
            return;
        }
        let tail = rest.split_off(room);
        out.push_str(prefix);
        out.extend(rest.iter());
        out.push('\n');
        rest = tail;
        prefix = &continuation;
    }
}

/// What the facility should do after consulting the assertion handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionDisposition {
    /// Take the facility's own abort path.
    Abort,
    /// Surface this signal to the caller instead.
    Raise(FailureSignal),
}

pub type AssertionHandler = fn(&AssertionInfo) -> AssertionDisposition;

/// Receives the escaped panic payload, or `None` when invoked with nothing pending.
pub type UncaughtHandler = fn(Option<&(dyn Any + Send)>) -> FailureSignal;

static ASSERTION_HANDLER: RwLock<Option<AssertionHandler>> = parking_lot::const_rwlock(None);
static UNCAUGHT_HANDLER: RwLock<Option<UncaughtHandler>> = parking_lot::const_rwlock(None);

/// Install an assertion handler; returns the previous one.
pub fn install_assertion_handler(handler: Option<AssertionHandler>) -> Option<AssertionHandler> {
    std::mem::replace(&mut *ASSERTION_HANDLER.write(), handler)
}

/// Install an uncaught-panic handler; returns the previous one.
pub fn install_uncaught_handler(handler: Option<UncaughtHandler>) -> Option<UncaughtHandler> {
    std::mem::replace(&mut *UNCAUGHT_HANDLER.write(), handler)
}

#[must_use]
pub fn has_custom_assertion_handler() -> bool {
    ASSERTION_HANDLER.read().is_some()
}

/// Currently installed uncaught handler, if any.
#[must_use]
pub fn uncaught_handler() -> Option<UncaughtHandler> {
    *UNCAUGHT_HANDLER.read()
}

/// Report a failed check.
///
/// Returns only when the installed handler raised a signal; otherwise the
/// rendering is written to stderr and the process aborts.
pub fn violation(info: AssertionInfo) -> FailureSignal {
    let handler = *ASSERTION_HANDLER.read();
    if let Some(handler) = handler
        && let AssertionDisposition::Raise(signal) = handler(&info)
    {
        return signal;
    }
    eprint!("{}", info.render(config::render_width()));
    std::process::abort()
}

/// Check an invariant; evaluates to `Result<(), FailureSignal>`.
///
/// ```no_run
/// use failgate_core::{FailureSignal, invariant};
///
/// fn withdraw(balance: i64, amount: i64) -> Result<i64, FailureSignal> {
///     invariant!(amount <= balance, "overdraw by {}", amount - balance)?;
///     Ok(balance - amount)
/// }
/// ```
#[macro_export]
macro_rules! invariant {
    (@check $kind:expr, $cond:expr, $message:expr) => {
        if $cond {
            ::std::result::Result::Ok(())
        } else {
            ::std::result::Result::Err($crate::invariant::violation($crate::AssertionInfo {
                kind: $kind,
                expression: ::std::stringify!($cond).to_owned(),
                message: $message,
                location: $crate::Location::new(::std::file!(), ::std::line!()),
            }))
        }
    };
    ($cond:expr $(,)?) => {
        $crate::invariant!(@check $crate::AssertionKind::Assertion, $cond, ::std::string::String::new())
    };
    ($cond:expr, $($arg:tt)+) => {
        $crate::invariant!(@check $crate::AssertionKind::Assertion, $cond, ::std::format!($($arg)+))
    };
}

/// Like [`invariant!`], but only checked when debug assertions are enabled.
#[macro_export]
macro_rules! debug_invariant {
    ($cond:expr $(,)?) => {
        if ::std::cfg!(debug_assertions) {
            $crate::invariant!(@check $crate::AssertionKind::DebugAssertion, $cond, ::std::string::String::new())
        } else {
            ::std::result::Result::<(), $crate::FailureSignal>::Ok(())
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if ::std::cfg!(debug_assertions) {
            $crate::invariant!(@check $crate::AssertionKind::DebugAssertion, $cond, ::std::format!($($arg)+))
        } else {
            ::std::result::Result::<(), $crate::FailureSignal>::Ok(())
        }
    };
}
