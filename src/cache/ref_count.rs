//! Reference Counting
//!
//! Atomic claim counter governing the lifetime of the shared cache file and
//! of its per-page I/O handles. A counter starts with one claim and is dead
//! once it reaches zero; a dead counter can never be revived.

use std::sync::atomic::{AtomicU32, Ordering};

/// Atomic reference count with a one-way transition to zero
#[derive(Debug)]
pub struct RefCount {
    refs: AtomicU32,
}

impl Default for RefCount {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCount {
    /// Create a counter holding the creator's claim
    pub fn new() -> Self {
        Self {
            refs: AtomicU32::new(1),
        }
    }

    /// Take another claim unless the counter already reached zero
    pub fn try_inc_ref(&self) -> bool {
        let mut current = self.refs.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.refs.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Take another claim while already holding one
    ///
    /// # Panics
    ///
    /// Panics if the counter is dead.
    pub fn inc_ref(&self) {
        assert!(self.try_inc_ref(), "inc_ref on released reference");
    }

    /// Release a claim, returning true if this was the last one
    pub fn dec_ref(&self) -> bool {
        let previous = self.refs.fetch_sub(1, Ordering::AcqRel);
        assert!(previous > 0, "dec_ref below zero");
        previous == 1
    }

    /// Current number of claims
    pub fn ref_count(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Check whether at least one claim is outstanding
    pub fn has_references(&self) -> bool {
        self.ref_count() > 0
    }
}

// =============================================================================
// Tests
// =============================================================================
