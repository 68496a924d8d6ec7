//! Scoped installation of the failure bridge.
//!
//! [`FailureHandlerChain::install`] swaps in a set of handlers and remembers
//! what was there before. The returned [`HandlerGuard`] puts the previous
//! handlers back when it is released or dropped, so a case that returns early,
//! fails, or unwinds never leaves its handlers behind for the next one.
//!
//! Quiet panics work differently: std refuses to swap the panic hook on a
//! panicking thread, so the first quiet guard chains one recording hook in
//! front of whatever hook was set, for the rest of the process. Guards only
//! raise and lower a depth counter; at depth zero the recording hook hands
//! every panic to the hook it replaced.

use std::cell::RefCell;
use std::fmt;
use std::panic::{self, PanicHookInfo};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bridge;
use crate::fatal_log::{AbortHook, install_abort_hook};
use crate::invariant::{
    AssertionHandler, UncaughtHandler, install_assertion_handler, install_uncaught_handler,
};
use crate::signal::Location;

thread_local! {
    static LAST_PANIC_SITE: RefCell<Option<Location>> = const { RefCell::new(None) };
}

static RECORDING_HOOK: OnceLock<()> = OnceLock::new();
// Number of live guards that asked for quiet panics.
static QUIET_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Handlers to install for the duration of a guard.
#[derive(Debug, Default, Clone, Copy)]
pub struct BridgeHandlers {
    pub abort_hook: Option<AbortHook>,
    pub uncaught: Option<UncaughtHandler>,
    pub assertion: Option<AssertionHandler>,
    /// Record panic sites instead of printing them while the guard lives.
    pub quiet_panics: bool,
}

impl BridgeHandlers {
    /// The bridge's own handlers: every abort path raises a signal.
    #[must_use]
    pub fn failure_bridge() -> Self {
        Self {
            abort_hook: Some(bridge::raise_failure_signal),
            uncaught: Some(bridge::normalize_uncaught),
            assertion: Some(bridge::raise_on_violation),
            quiet_panics: true,
        }
    }
}

/// The handlers that were installed before a guard took over.
pub struct FailureHandlerChain {
    previous_abort_hook: Option<AbortHook>,
    previous_uncaught_handler: Option<UncaughtHandler>,
    previous_assertion_handler: Option<AssertionHandler>,
    quiet: bool,
}

impl FailureHandlerChain {
    /// Install `handlers`, capturing the current ones for restoration.
    #[must_use = "dropping the guard restores the previous handlers immediately"]
    pub fn install(handlers: BridgeHandlers) -> HandlerGuard {
        let quiet = handlers.quiet_panics && recording_hook_ready();
        if quiet {
            QUIET_DEPTH.fetch_add(1, Ordering::SeqCst);
        }

        let chain = Self {
            previous_abort_hook: install_abort_hook(handlers.abort_hook),
            previous_uncaught_handler: install_uncaught_handler(handlers.uncaught),
            previous_assertion_handler: install_assertion_handler(handlers.assertion),
            quiet,
        };
        HandlerGuard { chain: Some(chain) }
    }

    fn restore(self) {
        install_abort_hook(self.previous_abort_hook);
        install_uncaught_handler(self.previous_uncaught_handler);
        install_assertion_handler(self.previous_assertion_handler);
        if self.quiet {
            QUIET_DEPTH.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Restores the previous handlers on release or drop.
pub struct HandlerGuard {
    chain: Option<FailureHandlerChain>,
}

impl HandlerGuard {
    /// Restore the previous handlers now.
    pub fn release(mut self) {
        if let Some(chain) = self.chain.take() {
            chain.restore();
        }
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        if let Some(chain) = self.chain.take() {
            chain.restore();
        }
    }
}

impl fmt::Debug for HandlerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerGuard")
            .field("active", &self.chain.is_some())
            .field("quiet", &self.chain.as_ref().is_some_and(|c| c.quiet))
            .finish()
    }
}

/// Chain the recording hook in front of the current one, once per process.
///
/// Returns `false` when the hook is not chained yet and cannot be, because
/// this thread is already panicking.
fn recording_hook_ready() -> bool {
    if RECORDING_HOOK.get().is_some() {
        return true;
    }
    if std::thread::panicking() {
        return false;
    }
    RECORDING_HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if QUIET_DEPTH.load(Ordering::SeqCst) > 0 {
                record_panic_site(info);
            } else {
                previous(info);
            }
        }));
    });
    true
}

fn record_panic_site(info: &PanicHookInfo<'_>) {
    let site = info
        .location()
        .map(|loc| Location::new(loc.file(), loc.line()));
    LAST_PANIC_SITE.with(|slot| *slot.borrow_mut() = site);
}

/// Take the site of the last panic recorded on this thread while quiet.
#[must_use]
pub fn take_panic_site() -> Option<Location> {
    LAST_PANIC_SITE.with(|slot| slot.borrow_mut().take())
}
