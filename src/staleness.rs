//! Tracks whether the applied dnsmasq config may be out of date.
//!
//! The flag starts dirty so the first pass always runs. Docker events set
//! it; a reconciliation pass takes it, and only a successful apply lets the
//! take stand. A pass that fails puts the flag back when its guard drops.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct StalenessTracker {
    dirty: AtomicBool,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self {
            dirty: AtomicBool::new(true),
        }
    }

    /// Record that the container set may have changed. Safe to call from
    /// any task, any number of times.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clears the flag if set and hands back a guard for the pass.
    ///
    /// Marks that land while the guard is alive leave the flag set, so they
    /// are picked up by the next pass.
    pub fn take_if_dirty(&self) -> Option<StalenessGuard<'_>> {
        self.dirty
            .swap(false, Ordering::AcqRel)
            .then(|| StalenessGuard::new(self))
    }

    /// Like [`take_if_dirty`](Self::take_if_dirty) but always returns a guard.
    pub fn force(&self) -> StalenessGuard<'_> {
        self.dirty.store(false, Ordering::Release);
        StalenessGuard::new(self)
    }
}

impl Default for StalenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// An in-flight reconciliation pass.
///
/// Dropping the guard without [`commit`](Self::commit) marks the tracker
/// dirty again.
#[must_use = "dropping the guard without commit marks the tracker dirty"]
#[derive(Debug)]
pub struct StalenessGuard<'a> {
    tracker: &'a StalenessTracker,
    committed: bool,
}

impl<'a> StalenessGuard<'a> {
    fn new(tracker: &'a StalenessTracker) -> Self {
        Self {
            tracker,
            committed: false,
        }
    }

    /// The pass applied successfully.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for StalenessGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.tracker.mark_dirty();
        }
    }
}
