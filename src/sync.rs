// SPDX-License-Identifier: MPL-2.0
//! Atomic time values shared between the fill loop and caller threads.
//!
//! The decoder mirrors a handful of floating-point statistics (stream fps,
//! stream length, seek landing time, decoding speed) from the worker thread
//! to arbitrary reader threads. Each is a single `f64` stored as its bit
//! pattern in an `AtomicU64`, so readers never take a lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A time or rate in seconds, readable and writable from any thread.
///
/// Negative values act as the "unset" sentinel, matching the convention of
/// reporting `-1.0` for quantities that have no value yet; `get()` renders
/// the sentinel as `None`.
pub struct AtomicSeconds(AtomicU64);

impl AtomicSeconds {
    /// Creates a new value initialized to the given seconds.
    #[must_use]
    pub fn new(secs: f64) -> Self {
        Self(AtomicU64::new(secs.to_bits()))
    }

    /// Creates a new value in the unset state.
    #[must_use]
    pub fn unset() -> Self {
        Self::new(-1.0)
    }

    pub fn store(&self, secs: f64) {
        self.0.store(secs.to_bits(), Ordering::SeqCst);
    }

    /// Returns the raw value, sentinel included.
    #[must_use]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }

    /// Returns the value, or `None` while unset.
    #[must_use]
    pub fn get(&self) -> Option<f64> {
        let secs = self.load();
        (secs >= 0.0).then_some(secs)
    }

    /// Resets to the unset state.
    pub fn clear(&self) {
        self.store(-1.0);
    }
}

impl fmt::Debug for AtomicSeconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicSeconds").field(&self.load()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn starts_with_initial_value() {
        let secs = AtomicSeconds::new(2.5);
        assert_eq!(secs.load(), 2.5);
        assert_eq!(secs.get(), Some(2.5));
    }

    #[test]
    fn unset_reads_as_none() {
        let secs = AtomicSeconds::unset();
        assert_eq!(secs.get(), None);
        assert!(secs.load() < 0.0);
    }

    #[test]
    fn zero_is_a_real_value_not_the_sentinel() {
        let secs = AtomicSeconds::new(0.0);
        assert_eq!(secs.get(), Some(0.0));
    }

    #[test]
    fn clear_returns_to_unset() {
        let secs = AtomicSeconds::new(7.0);
        secs.clear();
        assert_eq!(secs.get(), None);
    }

    #[test]
    fn visible_across_threads() {
        let secs = Arc::new(AtomicSeconds::unset());
        let writer = Arc::clone(&secs);
        std::thread::spawn(move || writer.store(3.25))
            .join()
            .expect("writer thread");
        assert_eq!(secs.get(), Some(3.25));
    }
}
