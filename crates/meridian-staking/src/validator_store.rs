//! Validator record store: primary records plus the power, consensus-address
//! and unstaking-queue indices.
//!
//! Every mutation removes stale index rows and writes the new ones in the
//! same logical batch; the host store commits per block, so the indices can
//! never be observed out of step with the primary records.

use crate::bank::BankModule;
use crate::keys;
use crate::store::StateUpdater;
use crate::{address_from_public_key, StakingModule};
use meridian_serde::{StateDecode, StateEncode};
use meridian_types::{Address, UnixNanos, Validator, ValidatorStatus};

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    /// Fetch a validator by operator address, through the decode cache.
    pub fn get_validator(&self, addr: &Address) -> Option<Validator> {
        if let Some(cached) = self.cache.borrow_mut().get(addr) {
            return Some(cached);
        }
        let bytes = self.store.get(&keys::validator_key(addr))?;
        let validator = Validator::from_state_bytes(&bytes).unwrap_or_else(|e| {
            panic!(
                "corrupt validator record for {}: {}",
                hex::encode(addr),
                e
            )
        });
        self.cache.borrow_mut().insert(*addr, validator.clone());
        Some(validator)
    }

    /// Persist a validator and refresh its index rows.
    pub fn set_validator(&mut self, validator: &Validator) {
        let addr = validator.address;
        let old = self
            .store
            .get(&keys::validator_key(&addr))
            .map(|bytes| {
                Validator::from_state_bytes(&bytes).unwrap_or_else(|e| {
                    panic!("corrupt validator record for {}: {}", hex::encode(addr), e)
                })
            });

        if let Some(old) = &old {
            if in_power_index(old) {
                self.store
                    .delete(&keys::staked_key(old.potential_power(), &addr));
            }
        }

        self.store
            .set(&keys::validator_key(&addr), validator.to_state_bytes());
        if in_power_index(validator) {
            self.store.set(
                &keys::staked_key(validator.potential_power(), &addr),
                addr.to_vec(),
            );
        }
        self.store.set(
            &keys::cons_addr_key(&address_from_public_key(&validator.public_key)),
            addr.to_vec(),
        );

        self.cache.borrow_mut().invalidate(&addr);
    }

    /// Remove a validator record and its index rows. The unstaking-queue
    /// entry, if any, is the caller's responsibility (it needs the
    /// completion time, which the record still carries here).
    pub fn delete_validator(&mut self, addr: &Address) {
        if let Some(validator) = self.get_validator(addr) {
            if in_power_index(&validator) {
                self.store
                    .delete(&keys::staked_key(validator.potential_power(), addr));
            }
            self.store
                .delete(&keys::cons_addr_key(&address_from_public_key(
                    &validator.public_key,
                )));
        }
        self.store.delete(&keys::validator_key(addr));
        self.cache.borrow_mut().invalidate(addr);
    }

    /// Resolve the operator record from a consensus address.
    pub fn validator_by_cons_addr(&self, cons_addr: &Address) -> Option<Validator> {
        let addr_bytes = self.store.get(&keys::cons_addr_key(cons_addr))?;
        let mut addr = [0u8; 20];
        if addr_bytes.len() != 20 {
            panic!("corrupt cons_addr index row for {}", hex::encode(cons_addr));
        }
        addr.copy_from_slice(&addr_bytes);
        self.get_validator(&addr)
    }

    /// All validators, ascending by operator address.
    pub fn all_validators(&self) -> Vec<Validator> {
        self.store
            .iter_prefix(keys::VALIDATOR_KEY)
            .map(|(key, bytes)| {
                Validator::from_state_bytes(&bytes).unwrap_or_else(|e| {
                    panic!("corrupt validator record at {:?}: {}", key, e)
                })
            })
            .collect()
    }

    pub fn validators_by_status(&self, status: ValidatorStatus) -> Vec<Validator> {
        self.all_validators()
            .into_iter()
            .filter(|v| v.status == status)
            .collect()
    }

    /// Bonded, non-jailed validators in descending power order via the
    /// power index. Within equal power the index yields descending
    /// addresses; callers that need the canonical `(-power, addr)` order
    /// sort explicitly.
    pub fn validators_by_power_desc(&self) -> Vec<Validator> {
        self.store
            .iter_prefix_rev(keys::STAKED_KEY)
            .filter_map(|(key, _)| keys::address_from_index_key(&key))
            .filter_map(|addr| self.get_validator(&addr))
            .collect()
    }

    // ------------------------------------------------------------------
    // Unbonding queue
    // ------------------------------------------------------------------

    pub(crate) fn insert_unstaking_entry(&mut self, completion: UnixNanos, addr: &Address) {
        self.store
            .set(&keys::unstaking_key(completion, addr), addr.to_vec());
    }

    pub(crate) fn delete_unstaking_entry(&mut self, completion: UnixNanos, addr: &Address) {
        self.store.delete(&keys::unstaking_key(completion, addr));
    }

    /// Queue entries with completion time ≤ `now`, in completion order.
    pub(crate) fn mature_unstaking_entries(&self, now: UnixNanos) -> Vec<(UnixNanos, Address)> {
        self.store
            .iter_prefix(keys::UNSTAKING_KEY)
            .take_while(|(key, _)| {
                let time_bytes = &key[keys::UNSTAKING_KEY.len()..key.len() - 20];
                meridian_serde::io::u64_from_be(time_bytes)
                    .map(|t| t as i64 <= now)
                    .unwrap_or(false)
            })
            .filter_map(|(key, _)| {
                let time_bytes = &key[keys::UNSTAKING_KEY.len()..key.len() - 20];
                let completion = meridian_serde::io::u64_from_be(time_bytes).ok()? as i64;
                let addr = keys::address_from_index_key(&key)?;
                Some((completion, addr))
            })
            .collect()
    }
}

/// A validator occupies a power-index row while it is bonded and free.
fn in_power_index(validator: &Validator) -> bool {
    validator.is_bonded() && !validator.jailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::InMemoryBank;
    use crate::store::InMemoryState;

    fn module() -> StakingModule<InMemoryState, InMemoryBank> {
        StakingModule::new(InMemoryState::new(), InMemoryBank::new())
    }

    fn validator(tag: u8, tokens: u128) -> Validator {
        let public_key = [tag; 32];
        Validator::new(
            address_from_public_key(&public_key),
            public_key,
            tokens,
            vec!["0001".into()],
            format!("https://node{}.example.com", tag),
        )
    }

    #[test]
    fn set_get_round_trip_and_cache() {
        let mut m = module();
        let v = validator(1, 10_000_000);
        m.set_validator(&v);
        assert_eq!(m.get_validator(&v.address), Some(v.clone()));
        // second read is served from cache
        assert_eq!(m.get_validator(&v.address), Some(v));
    }

    #[test]
    fn power_index_tracks_status_and_jail() {
        let mut m = module();
        let mut v = validator(1, 10_000_000);
        m.set_validator(&v);
        assert_eq!(m.validators_by_power_desc().len(), 1);

        v.jailed = true;
        m.set_validator(&v);
        assert!(m.validators_by_power_desc().is_empty());

        v.jailed = false;
        v.status = ValidatorStatus::Unbonding;
        m.set_validator(&v);
        assert!(m.validators_by_power_desc().is_empty());
    }

    #[test]
    fn power_index_is_descending() {
        let mut m = module();
        m.set_validator(&validator(1, 5_000_000));
        m.set_validator(&validator(2, 50_000_000));
        m.set_validator(&validator(3, 20_000_000));

        let powers: Vec<i64> = m
            .validators_by_power_desc()
            .iter()
            .map(|v| v.potential_power())
            .collect();
        assert_eq!(powers, vec![50, 20, 5]);
    }

    #[test]
    fn stake_change_rewrites_index_row() {
        let mut m = module();
        let mut v = validator(1, 5_000_000);
        m.set_validator(&v);
        v.staked_tokens = 7_000_000;
        m.set_validator(&v);

        let listed = m.validators_by_power_desc();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].potential_power(), 7);
    }

    #[test]
    fn cons_addr_lookup() {
        let mut m = module();
        let v = validator(9, 1_000_000);
        m.set_validator(&v);
        let cons = address_from_public_key(&v.public_key);
        assert_eq!(m.validator_by_cons_addr(&cons), Some(v));
    }

    #[test]
    fn delete_removes_record_and_indices() {
        let mut m = module();
        let v = validator(1, 5_000_000);
        m.set_validator(&v);
        m.delete_validator(&v.address);
        assert!(m.get_validator(&v.address).is_none());
        assert!(m.validators_by_power_desc().is_empty());
        assert!(m
            .validator_by_cons_addr(&address_from_public_key(&v.public_key))
            .is_none());
    }

    #[test]
    fn unstaking_entries_mature_in_time_order() {
        let mut m = module();
        let a1 = [1u8; 20];
        let a2 = [2u8; 20];
        let a3 = [3u8; 20];
        m.insert_unstaking_entry(300, &a3);
        m.insert_unstaking_entry(100, &a1);
        m.insert_unstaking_entry(200, &a2);

        let mature = m.mature_unstaking_entries(250);
        assert_eq!(mature, vec![(100, a1), (200, a2)]);
    }
}
