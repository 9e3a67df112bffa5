//! Deterministic per-block driver.
//!
//! `begin_block` order is fixed: burn-queue drain, then equivocation
//! evidence, then signature reports. `end_block` matures unbondings,
//! rebuilds the active set from a single snapshot of post-transaction
//! state, and emits the diff against the set persisted for the previous
//! block.

use crate::bank::{BankModule, STAKED_POOL, UNSTAKING_POOL};
use crate::keys;
use crate::store::StateUpdater;
use crate::StakingModule;
use meridian_serde::io::{get_i64, put_i64};
use meridian_types::{Address, UnixNanos, Validator, ValidatorStatus, ValidatorUpdate};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Immutable per-block coordinates handed down by the consensus engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockContext {
    pub height: i64,
    /// Block time, unix nanoseconds UTC.
    pub time: UnixNanos,
}

/// One validator's signature report for the previous block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteInfo {
    /// Consensus address of the reported validator.
    pub address: Address,
    pub power: i64,
    pub signed: bool,
}

/// Equivocation evidence attached to a block by the consensus engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Evidence {
    /// Consensus address of the offending validator.
    pub address: Address,
    /// Height of the infraction.
    pub height: i64,
    /// Time of the infraction, unix nanoseconds UTC.
    pub time: UnixNanos,
    /// The validator's power at the infraction.
    pub power: i64,
}

/// Inputs the consensus engine supplies at block begin.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestBeginBlock {
    pub last_commit_votes: Vec<VoteInfo>,
    pub byzantine_validators: Vec<Evidence>,
}

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    /// Block-begin hook: burns, evidence, signatures — in that order.
    ///
    /// Evidence failures are transaction-grade conditions (stale or
    /// duplicate evidence is expected during replay); they are logged and
    /// skipped without touching state.
    pub fn begin_block(&mut self, ctx: &BlockContext, req: &RequestBeginBlock) {
        self.drain_burn_queue();

        for evidence in &req.byzantine_validators {
            if let Err(e) = self.handle_double_sign(
                ctx,
                &evidence.address,
                evidence.height,
                evidence.time,
                evidence.power,
            ) {
                info!(code = e.code(), "ignored equivocation evidence: {}", e);
            }
        }

        for vote in &req.last_commit_votes {
            self.handle_validator_signature(ctx, &vote.address, vote.power, vote.signed);
        }
    }

    /// Block-end hook: mature unbondings, rebuild the active set, emit the
    /// validator-set diff and persist the new set as "last".
    pub fn end_block(&mut self, ctx: &BlockContext) -> Vec<ValidatorUpdate> {
        self.mature_unbondings(ctx.time);
        self.mature_app_unbondings(ctx.time);
        let updates = self.update_validator_set();
        self.cleanup_unbonded_records();
        updates
    }

    /// Snapshot-and-diff of the active set.
    ///
    /// Candidates are every non-jailed validator with stake that is not on
    /// its way out (unbonding); the top `MaxValidators` by
    /// `(power desc, address asc)` win. Waiting validators are promoted
    /// into the bonded pool and displaced ones parked back into the
    /// unstaking pool in the same pass, keeping pool custody aligned with
    /// status.
    fn update_validator_set(&mut self) -> Vec<ValidatorUpdate> {
        let params = self.get_params();

        let mut candidates: Vec<Validator> = self
            .all_validators()
            .into_iter()
            .filter(|v| !v.jailed && v.staked_tokens > 0 && !v.is_unbonding())
            .collect();
        candidates.sort_by(|a, b| {
            b.potential_power()
                .cmp(&a.potential_power())
                .then(a.address.cmp(&b.address))
        });
        candidates.truncate(params.max_validators as usize);

        let new_set: BTreeSet<Address> = candidates.iter().map(|v| v.address).collect();

        // Promotions: waiting validators that won a slot.
        for candidate in &candidates {
            if candidate.is_unbonded() {
                let mut promoted = candidate.clone();
                promoted.status = ValidatorStatus::Bonded;
                self.move_pool_tokens(UNSTAKING_POOL, STAKED_POOL, promoted.staked_tokens);
                self.set_validator(&promoted);
            }
        }
        // Demotions: bonded validators displaced by rank. Jailed validators
        // keep their bonded status (and pool custody); they simply drop out
        // of the reported set.
        let displaced: Vec<Validator> = self
            .validators_by_status(ValidatorStatus::Bonded)
            .into_iter()
            .filter(|v| !v.jailed && !new_set.contains(&v.address))
            .collect();
        for validator in displaced {
            let mut demoted = validator.clone();
            demoted.status = ValidatorStatus::Unbonded;
            self.move_pool_tokens(STAKED_POOL, UNSTAKING_POOL, demoted.staked_tokens);
            self.set_validator(&demoted);
        }

        let last = self.last_validator_powers();

        let mut updates = Vec::new();
        for candidate in &candidates {
            let power = candidate.potential_power();
            if last.get(&candidate.address) != Some(&power) {
                updates.push(ValidatorUpdate {
                    public_key: candidate.public_key,
                    power,
                });
            }
        }
        for addr in last.keys() {
            if !new_set.contains(addr) {
                let public_key = self
                    .get_validator(addr)
                    .map(|v| v.public_key)
                    .unwrap_or_else(|| {
                        panic!(
                            "validator {} in last power set but record missing",
                            hex::encode(addr)
                        )
                    });
                updates.push(ValidatorUpdate {
                    public_key,
                    power: 0,
                });
            }
        }

        for addr in last.keys() {
            self.store.delete(&keys::last_power_key(addr));
        }
        for candidate in &candidates {
            let mut value = Vec::with_capacity(8);
            put_i64(&mut value, candidate.potential_power());
            self.store
                .set(&keys::last_power_key(&candidate.address), value);
        }

        updates
    }

    /// The power of each validator reported to consensus at the previous
    /// block, ascending by address.
    pub fn last_validator_powers(&self) -> BTreeMap<Address, i64> {
        self.store
            .iter_prefix(keys::LAST_POWERS_KEY)
            .filter_map(|(key, value)| {
                let addr = keys::address_from_index_key(&key)?;
                let mut input: &[u8] = &value;
                let power = get_i64(&mut input).ok()?;
                Some((addr, power))
            })
            .collect()
    }

    /// A record is destroyed only once fully unbonded with nothing left at
    /// stake. Runs after the diff so removals can still resolve the public
    /// key.
    fn cleanup_unbonded_records(&mut self) {
        let doomed: Vec<Address> = self
            .all_validators()
            .into_iter()
            .filter(|v| v.is_unbonded() && v.staked_tokens == 0)
            .map(|v| v.address)
            .collect();
        for addr in doomed {
            self.delete_validator(&addr);
        }
    }
}
