//! Per-validator liveness bookkeeping.

use crate::primitives::UnixNanos;

/// Signing info kept for every validator that has ever been reported by the
/// consensus engine.
///
/// The missed-block bitmap itself lives in its own key space (one bit per
/// window slot); this record carries the counters that make the window
/// update O(1). The bitmap is treated as all-zero until a bit is explicitly
/// set, so a fresh record never underflows the counter on a signed block.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ValidatorSigningInfo {
    /// Height at which the validator first entered the signing set.
    pub start_height: i64,
    /// Monotonic offset into the sliding window, reset on downtime jail
    /// and on window-size parameter changes.
    pub index_offset: i64,
    /// Number of set bits in the missed-block bitmap.
    pub missed_blocks_counter: i64,
    /// The validator may not unjail before this time.
    pub jailed_until: UnixNanos,
    /// Permanently barred from further slashing once set.
    pub tombstoned: bool,
}

impl ValidatorSigningInfo {
    pub fn new(start_height: i64) -> Self {
        ValidatorSigningInfo {
            start_height,
            ..Default::default()
        }
    }
}
