//! Amortized sweeping of weakly keyed maps.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Insertions allowed between sweeps before the map size is considered.
pub const DEFAULT_SWEEP_FLOOR: usize = 32;

/// Decides when a map holding weak entries is due for a full sweep.
///
/// A sweep is due once the insertions since the last sweep reach half the
/// map's size (and at least the floor), so sweeping costs O(1) amortized
/// per insertion.
#[derive(Debug)]
pub struct SweepSchedule {
    since: AtomicUsize,
    floor: usize,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_FLOOR)
    }
}

impl SweepSchedule {
    /// Create a schedule that never sweeps more often than every `floor`
    /// insertions. A floor of `0` is treated as `1`.
    #[must_use]
    pub fn new(floor: usize) -> Self {
        Self {
            since: AtomicUsize::new(0),
            floor: floor.max(1),
        }
    }

    /// Record one insertion into a map now holding `len` entries. Returns
    /// `true` when the caller should sweep.
    pub fn record(&self, len: usize) -> bool {
        let since = self.since.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if since < (len / 2).max(self.floor) {
            return false;
        }
        self.since.store(0, Ordering::Relaxed);
        true
    }
}
