//! Validator staking, slashing and liveness module for the meridian node.
//!
//! The module is a deterministic state machine driven by the consensus
//! engine's per-block lifecycle: `begin_block` drains the administrative
//! burn queue, applies equivocation evidence and processes signature
//! reports; transactions mutate stake between blocks; `end_block` matures
//! unbondings and emits the validator-set diff. Every replica fed the same
//! blocks computes byte-identical state — iteration order is fixed by the
//! byte-lex store contract and all arithmetic is integer.
//!
//! Two capability traits are injected at construction: the byte-keyed
//! [`store::StateUpdater`] and the token-custody [`bank::BankModule`].
//! Everything else (records, indices, signing windows, the burn queue,
//! parameters) lives behind the store.

pub mod apps;
pub mod bank;
pub mod block;
pub mod cache;
pub mod error;
pub mod events;
pub mod genesis;
pub mod keys;
pub mod lifecycle;
pub mod params;
pub mod signing;
pub mod slash;
pub mod store;
pub mod validator_store;

pub use bank::{BankModule, InMemoryBank};
pub use block::{BlockContext, Evidence, RequestBeginBlock, VoteInfo};
pub use error::StakingError;
pub use events::{Event, SlashReason};
pub use genesis::GenesisState;
pub use params::StakingParams;
pub use store::{InMemoryState, StateUpdater, StateView};

use cache::{ValidatorCache, VALIDATOR_CACHE_SIZE};
use meridian_types::{Address, ConsensusPublicKey};
use sha3::{Digest, Sha3_256};
use std::cell::RefCell;

/// Operator address derived from the consensus public key: the first 20
/// bytes of its SHA3-256 digest.
pub fn address_from_public_key(public_key: &ConsensusPublicKey) -> Address {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key);
    let digest = hasher.finalize();
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[..20]);
    addr
}

/// The staking module. One instance per node, owned by the block-processing
/// thread; no operation suspends or yields.
pub struct StakingModule<S, B> {
    store: S,
    bank: B,
    cache: RefCell<ValidatorCache>,
    events: Vec<Event>,
}

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    pub fn new(store: S, bank: B) -> Self {
        StakingModule {
            store,
            bank,
            cache: RefCell::new(ValidatorCache::new(VALIDATOR_CACHE_SIZE)),
            events: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    /// Events accumulated since the last drain, in emission order.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Must be called whenever the host rolls back uncommitted writes.
    pub fn flush_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_derivation_is_stable() {
        let key = [7u8; 32];
        let a = address_from_public_key(&key);
        let b = address_from_public_key(&key);
        assert_eq!(a, b);
        assert_ne!(a, address_from_public_key(&[8u8; 32]));
    }
}
