//! Module error taxonomy.
//!
//! Every variant carries a stable numeric code for the RPC surface.
//! These are transaction-level errors: they revert the transaction's
//! writes and the block continues. Conditions that mean the chain has
//! forked or the store is corrupt (pool imbalance, missing signing info
//! for a known validator) are not represented here — they panic and halt
//! the node.

use meridian_types::{Address, UnixNanos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    // Validation
    InvalidStake { amount: u128, minimum: u128 },
    InvalidChains,
    InvalidServiceUrl(String),
    AmountNegative,
    InsufficientBalance { needed: u128, available: u128 },

    // Lifecycle
    AlreadyStaked(Address),
    NotBonded(Address),
    NotJailed(Address),
    JailedUntilFuture { now: UnixNanos, jailed_until: UnixNanos },
    Tombstoned(Address),
    BelowMinimumStake { tokens: u128, minimum: u128 },
    ValidatorNotFound(Address),
    ApplicationNotFound(Address),

    // Evidence
    CantHandleEvidence(Address),
    EvidenceTooOld { age: i64, max_age: i64 },
    FutureInfraction { infraction_height: i64, height: i64 },
}

impl StakingError {
    /// Stable numeric code exposed on the RPC surface.
    pub fn code(&self) -> u32 {
        match self {
            StakingError::InvalidStake { .. } => 101,
            StakingError::InvalidChains => 102,
            StakingError::InvalidServiceUrl(_) => 103,
            StakingError::AmountNegative => 104,
            StakingError::InsufficientBalance { .. } => 105,

            StakingError::AlreadyStaked(_) => 110,
            StakingError::NotBonded(_) => 111,
            StakingError::NotJailed(_) => 112,
            StakingError::JailedUntilFuture { .. } => 113,
            StakingError::Tombstoned(_) => 114,
            StakingError::BelowMinimumStake { .. } => 115,
            StakingError::ValidatorNotFound(_) => 116,
            StakingError::ApplicationNotFound(_) => 117,

            StakingError::CantHandleEvidence(_) => 120,
            StakingError::EvidenceTooOld { .. } => 121,
            StakingError::FutureInfraction { .. } => 122,
        }
    }
}

impl std::fmt::Display for StakingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StakingError::InvalidStake { amount, minimum } => {
                write!(f, "stake of {} below the minimum of {}", amount, minimum)
            }
            StakingError::InvalidChains => {
                write!(f, "chain set is empty or contains an invalid identifier")
            }
            StakingError::InvalidServiceUrl(url) => write!(f, "invalid service url: {}", url),
            StakingError::AmountNegative => write!(f, "amount must be positive"),
            StakingError::InsufficientBalance { needed, available } => {
                write!(f, "insufficient balance: need {}, have {}", needed, available)
            }
            StakingError::AlreadyStaked(addr) => {
                write!(f, "validator {} is already staked", hex::encode(addr))
            }
            StakingError::NotBonded(addr) => {
                write!(f, "validator {} is not bonded", hex::encode(addr))
            }
            StakingError::NotJailed(addr) => {
                write!(f, "validator {} is not jailed", hex::encode(addr))
            }
            StakingError::JailedUntilFuture { now, jailed_until } => {
                write!(f, "still jailed: now {}, jailed until {}", now, jailed_until)
            }
            StakingError::Tombstoned(addr) => {
                write!(f, "validator {} is tombstoned", hex::encode(addr))
            }
            StakingError::BelowMinimumStake { tokens, minimum } => {
                write!(f, "tokens {} below the minimum stake of {}", tokens, minimum)
            }
            StakingError::ValidatorNotFound(addr) => {
                write!(f, "validator {} not found", hex::encode(addr))
            }
            StakingError::ApplicationNotFound(addr) => {
                write!(f, "application {} not found", hex::encode(addr))
            }
            StakingError::CantHandleEvidence(addr) => {
                write!(
                    f,
                    "cannot handle evidence for unknown or unbonded validator {}",
                    hex::encode(addr)
                )
            }
            StakingError::EvidenceTooOld { age, max_age } => {
                write!(f, "evidence age {} exceeds the maximum of {}", age, max_age)
            }
            StakingError::FutureInfraction {
                infraction_height,
                height,
            } => {
                write!(
                    f,
                    "infraction height {} is ahead of the current height {}",
                    infraction_height, height
                )
            }
        }
    }
}

impl std::error::Error for StakingError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let errors = vec![
            StakingError::InvalidStake { amount: 0, minimum: 1 },
            StakingError::InvalidChains,
            StakingError::InvalidServiceUrl(String::new()),
            StakingError::AmountNegative,
            StakingError::InsufficientBalance { needed: 1, available: 0 },
            StakingError::AlreadyStaked([0; 20]),
            StakingError::NotBonded([0; 20]),
            StakingError::NotJailed([0; 20]),
            StakingError::JailedUntilFuture { now: 0, jailed_until: 1 },
            StakingError::Tombstoned([0; 20]),
            StakingError::BelowMinimumStake { tokens: 0, minimum: 1 },
            StakingError::ValidatorNotFound([0; 20]),
            StakingError::ApplicationNotFound([0; 20]),
            StakingError::CantHandleEvidence([0; 20]),
            StakingError::EvidenceTooOld { age: 2, max_age: 1 },
            StakingError::FutureInfraction { infraction_height: 2, height: 1 },
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
