//! Application record: the non-consensus staking mirror.
//!
//! Applications stake for network throughput rather than consensus power.
//! They share the validator lifecycle (bonded → unbonding → unbonded, with
//! their own pools and maturation queue) but are never slashed and carry no
//! signing info.

use crate::primitives::{Address, ConsensusPublicKey, UnixNanos};
use crate::validator::ValidatorStatus;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Application {
    pub address: Address,
    pub public_key: ConsensusPublicKey,
    pub status: ValidatorStatus,
    /// Staked micro-units.
    pub staked_tokens: u128,
    /// Chains the application consumes relays on.
    pub chains: Vec<String>,
    /// Non-zero iff `status == Unbonding`.
    pub unstaking_completion_time: UnixNanos,
}

impl Application {
    pub fn new(
        address: Address,
        public_key: ConsensusPublicKey,
        staked_tokens: u128,
        mut chains: Vec<String>,
    ) -> Self {
        chains.sort();
        chains.dedup();
        Application {
            address,
            public_key,
            status: ValidatorStatus::Bonded,
            staked_tokens,
            chains,
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
}
