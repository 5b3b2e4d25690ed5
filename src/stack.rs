//! Stack growth for the recursive passes (parser, resolver, evaluator).
//!
//! Nesting in Sky source maps directly onto native recursion, and a host
//! thread may have as little as 2 MB of stack. Each recursive entry point
//! wraps its body in [`ensure_sufficient_stack`], which moves onto a freshly
//! allocated segment when the remaining stack runs low.

/// Grow when less than this much stack is left.
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment.
const SEGMENT_SIZE: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
