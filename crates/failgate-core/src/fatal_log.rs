//! Fatal-severity log call site and its abort hook.
//!
//! A fatal log event normally ends the process. Installing an [`AbortHook`]
//! lets the hook answer with [`AbortDisposition::Raise`] instead, in which case
//! [`fatal`] hands the signal back to the caller and the caller decides how to
//! leave the current unit of work (return it as an `Err`, or unwind with
//! [`FailureSignal::unwind`]).

use parking_lot::RwLock;

use crate::signal::{FailureSignal, Location};

/// A fatal-severity log event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalEvent {
    pub message: String,
    pub location: Location,
}

/// What the call site should do after consulting the abort hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortDisposition {
    /// Proceed with process termination.
    Terminate,
    /// Surface this signal to the caller instead.
    Raise(FailureSignal),
}

/// Callback consulted in place of terminating on a fatal event.
pub type AbortHook = fn(&FatalEvent) -> AbortDisposition;

static ABORT_HOOK: RwLock<Option<AbortHook>> = parking_lot::const_rwlock(None);

/// Install `hook` (or restore default termination with `None`).
///
/// Returns the previously installed hook so the caller can put it back.
pub fn install_abort_hook(hook: Option<AbortHook>) -> Option<AbortHook> {
    std::mem::replace(&mut *ABORT_HOOK.write(), hook)
}

/// True when a hook other than default termination is installed.
#[must_use]
pub fn has_custom_abort_hook() -> bool {
    ABORT_HOOK.read().is_some()
}

/// Report a fatal event.
///
/// Returns only when the installed hook raised a signal; otherwise the event is
/// written to stderr and the process aborts.
pub fn fatal(event: FatalEvent) -> FailureSignal {
    let hook = *ABORT_HOOK.read();
    if let Some(hook) = hook
        && let AbortDisposition::Raise(signal) = hook(&event)
    {
        return signal;
    }
    eprintln!("F {}] {}", event.location, event.message);
    std::process::abort()
}

/// Log a fatal event at the call site.
///
/// Evaluates to the [`FailureSignal`] raised by the installed abort hook; the
/// process aborts when no hook raises.
///
/// ```no_run
/// use failgate_core::{FailureSignal, fatal};
///
/// fn open_ledger(path: &str) -> Result<(), FailureSignal> {
///     Err(fatal!("ledger {path} is corrupt"))
/// }
/// ```
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)+) => {
        $crate::fatal_log::fatal($crate::fatal_log::FatalEvent {
            message: ::std::format!($($arg)+),
            location: $crate::Location::new(::std::file!(), ::std::line!()),
        })
    };
}

#[cfg(test)]
pub(crate) static HOOK_TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());
