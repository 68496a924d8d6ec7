//! Runtime configuration.
//!
//! The width used when rendering invariant violations is set via the
//! `FAILGATE_RENDER_WIDTH` environment variable:
//! - unset or unparsable: [`DEFAULT_RENDER_WIDTH`] columns
//! - otherwise clamped to `MIN_RENDER_WIDTH..=MAX_RENDER_WIDTH`
//!
//! Renderings never carry color; the width is the only knob.

use std::sync::atomic::{AtomicUsize, Ordering};

pub const DEFAULT_RENDER_WIDTH: usize = 100;
pub const MIN_RENDER_WIDTH: usize = 40;
pub const MAX_RENDER_WIDTH: usize = 400;

// 0 = unresolved; any other value is the resolved width.
static CACHED_WIDTH: AtomicUsize = AtomicUsize::new(0);

fn parse_render_width(raw: &str) -> usize {
    raw.trim()
        .parse::<usize>()
        .map(|w| w.clamp(MIN_RENDER_WIDTH, MAX_RENDER_WIDTH))
        .unwrap_or(DEFAULT_RENDER_WIDTH)
}

/// Rendering width (reads env var on first call, caches thereafter).
#[must_use]
pub fn render_width() -> usize {
    let cached = CACHED_WIDTH.load(Ordering::Relaxed);
    if cached != 0 {
        return cached;
    }

    let width = std::env::var("FAILGATE_RENDER_WIDTH")
        .map(|v| parse_render_width(&v))
        .unwrap_or(DEFAULT_RENDER_WIDTH);
    // Racing first callers resolve the same env value; last store wins.
    CACHED_WIDTH.store(width, Ordering::Release);
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fatal_log::HOOK_TEST_LOCK;

    #[test]
    fn parse_widths() {
        assert_eq!(parse_render_width("120"), 120);
        assert_eq!(parse_render_width(" 80 "), 80);
        assert_eq!(parse_render_width("3"), MIN_RENDER_WIDTH);
        assert_eq!(parse_render_width("100000"), MAX_RENDER_WIDTH);
        assert_eq!(parse_render_width("wide"), DEFAULT_RENDER_WIDTH);
        assert_eq!(parse_render_width(""), DEFAULT_RENDER_WIDTH);
    }

    #[test]
    fn cached_width_is_process_sticky_until_cache_reset() {
        // Renderings elsewhere read the cache; keep them out while it is swapped.
        let _lock = HOOK_TEST_LOCK.lock();
        let previous = CACHED_WIDTH.swap(72, Ordering::SeqCst);
        assert_eq!(render_width(), 72);
        assert_eq!(render_width(), 72);
        CACHED_WIDTH.store(previous, Ordering::SeqCst);
    }
}
