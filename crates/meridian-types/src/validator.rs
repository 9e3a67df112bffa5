//! Validator record: the canonical source of truth for a validator's
//! economic state.
//!
//! The record is keyed by operator address and stored independently of the
//! signing info (same key, separate key space). `staked_tokens` is reduced
//! by slashing and is never negative; `unstaking_completion_time` is
//! non-zero exactly while the validator is `Unbonding`.

use crate::primitives::{
    power_from_tokens, Address, ConsensusPublicKey, UnixNanos,
};

/// Lifecycle status of a validator's stake.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValidatorStatus {
    Unbonded = 0,
    Unbonding = 1,
    Bonded = 2,
}

/// Canonical validator record stored in the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    /// Operator address, derived from the consensus key hash.
    pub address: Address,
    /// Immutable identity material.
    pub public_key: ConsensusPublicKey,
    /// Excluded from the active set while true.
    pub jailed: bool,
    pub status: ValidatorStatus,
    /// Staked micro-units. Slashing clamps at zero.
    pub staked_tokens: u128,
    /// Sorted, deduplicated hex chain identifiers this validator serves.
    pub chains: Vec<String>,
    /// Endpoint the validator serves relays on.
    pub service_url: String,
    /// Non-zero iff `status == Unbonding`.
    pub unstaking_completion_time: UnixNanos,
}

impl Validator {
    /// Build a freshly staked validator. Chains are sorted and deduplicated
    /// here so that every replica persists an identical record.
    pub fn new(
        address: Address,
        public_key: ConsensusPublicKey,
        staked_tokens: u128,
        mut chains: Vec<String>,
        service_url: String,
    ) -> Self {
        chains.sort();
        chains.dedup();
        Validator {
            address,
            public_key,
            jailed: false,
            status: ValidatorStatus::Bonded,
            staked_tokens,
            chains,
            service_url,
            unstaking_completion_time: 0,
        }
    }

    pub fn is_bonded(&self) -> bool {
        self.status == ValidatorStatus::Bonded
    }

    pub fn is_unbonding(&self) -> bool {
        self.status == ValidatorStatus::Unbonding
    }

    pub fn is_unbonded(&self) -> bool {
        self.status == ValidatorStatus::Unbonded
    }

    pub fn is_jailed(&self) -> bool {
        self.jailed
    }

    /// Voting weight as reported to the consensus engine. Jailed and
    /// non-bonded validators carry zero power regardless of stake.
    pub fn consensus_power(&self) -> i64 {
        if self.is_bonded() && !self.jailed {
            power_from_tokens(self.staked_tokens)
        } else {
            0
        }
    }

    /// Raw power ignoring status, used when ranking stake at admission.
    pub fn potential_power(&self) -> i64 {
        power_from_tokens(self.staked_tokens)
    }
}

/// A single entry of the validator-set diff handed to the consensus engine
/// at end-block. `power == 0` signals removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorUpdate {
    pub public_key: ConsensusPublicKey,
    pub power: i64,
}

/// Maximum accepted length of a chain identifier, in hex characters.
pub const MAX_CHAIN_ID_LEN: usize = 64;

/// A chain identifier is a non-empty, even-length hex string of at most
/// [`MAX_CHAIN_ID_LEN`] characters.
pub fn is_valid_chain_id(chain: &str) -> bool {
    !chain.is_empty()
        && chain.len() % 2 == 0
        && chain.len() <= MAX_CHAIN_ID_LEN
        && chain.bytes().all(|b| b.is_ascii_hexdigit())
}
