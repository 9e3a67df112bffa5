//! Core primitives and conversion constants for the meridian staking state.

/// Operator address: the first 20 bytes of the hash of the consensus public key.
pub type Address = [u8; 20];

/// Raw consensus public key bytes (ed25519-sized).
pub type ConsensusPublicKey = [u8; 32];

/// UTC timestamp in unix nanoseconds. Zero is the sentinel for "unset".
pub type UnixNanos = i64;

/// Duration in nanoseconds, the unit governance durations are stored in.
pub type Nanos = i64;

/// Nanoseconds in one second, for readable parameter defaults.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ============================================================================
// Consensus power
// ============================================================================

/// Micro-units per unit of consensus power (1 token = 1_000_000 micro-units).
pub const POWER_REDUCTION: u128 = 1_000_000;

/// Offset between a stake change and its effect in the consensus engine.
pub const VALIDATOR_UPDATE_DELAY: i64 = 1;

/// Integer voting weight derived from staked micro-units.
pub fn power_from_tokens(tokens: u128) -> i64 {
    (tokens / POWER_REDUCTION) as i64
}

/// Staked micro-units that correspond to a consensus power value.
///
/// Negative powers (which the consensus engine never reports for live
/// validators) map to zero tokens.
pub fn tokens_from_power(power: i64) -> u128 {
    if power <= 0 {
        return 0;
    }
    power as u128 * POWER_REDUCTION
}

// ============================================================================
// BasisPoints - fixed-point fractions for governance parameters
// ============================================================================

/// A fraction in [0, 1] expressed in basis points (1 bps = 1/10_000).
///
/// All fractional parameters (slash fractions, the minimum signed-per-window
/// ratio) are carried as basis points so that every replica performs the same
/// truncating integer arithmetic. `apply` computes `⌊amount · fraction⌋`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BasisPoints(pub u32);

/// Denominator of the basis-point representation.
pub const BPS_DENOM: u32 = 10_000;

impl BasisPoints {
    /// Create a new fraction from a raw bps value, clamped to 100%.
    pub const fn new(bps: u32) -> Self {
        if bps > BPS_DENOM {
            BasisPoints(BPS_DENOM)
        } else {
            BasisPoints(bps)
        }
    }

    /// Raw basis-point value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// `⌊amount · fraction⌋`, truncating toward zero.
    pub fn apply(&self, amount: u128) -> u128 {
        amount * self.0 as u128 / BPS_DENOM as u128
    }

    /// `⌊count · fraction⌋` over a signed block count. `count` must be
    /// non-negative (window sizes are validated at the parameter layer).
    pub fn apply_i64(&self, count: i64) -> i64 {
        (count as i128 * self.0 as i128 / BPS_DENOM as i128) as i64
    }
}

impl std::fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:04}", self.0 / BPS_DENOM, self.0 % BPS_DENOM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_round_trips_through_tokens() {
        assert_eq!(power_from_tokens(10_000_000), 10);
        assert_eq!(tokens_from_power(10), 10_000_000);
        // Sub-unit dust truncates.
        assert_eq!(power_from_tokens(10_999_999), 10);
        assert_eq!(tokens_from_power(0), 0);
        assert_eq!(tokens_from_power(-5), 0);
    }

    #[test]
    fn basis_points_truncate_toward_zero() {
        let one_percent = BasisPoints::new(100);
        assert_eq!(one_percent.apply(100_000_000), 1_000_000);
        assert_eq!(one_percent.apply(99), 0);

        let half = BasisPoints::new(5_000);
        assert_eq!(half.apply_i64(100), 50);
        assert_eq!(half.apply_i64(101), 50);
    }

    #[test]
    fn basis_points_clamp_at_one() {
        assert_eq!(BasisPoints::new(20_000), BasisPoints::new(10_000));
        assert_eq!(BasisPoints::new(10_000).apply(42), 42);
    }
}
