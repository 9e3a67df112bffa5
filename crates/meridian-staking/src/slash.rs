//! Slashing: fraction slashes, equivocation handling and the
//! administrative burn queue.
//!
//! All penalties run through the same deduct/burn/force-unstake sequence:
//! the burn amount is clamped to the validator's remaining stake, burned
//! from the pool that currently custodies it, and the validator is
//! force-unstaked when the remainder drops below the stake minimum. A
//! tombstoned validator is never slashed again.

use crate::bank::{BankModule, STAKED_POOL, UNSTAKING_POOL};
use crate::error::StakingError;
use crate::events::{Event, SlashReason};
use crate::keys;
use crate::store::StateUpdater;
use crate::{BlockContext, StakingModule};
use meridian_serde::io::{get_u128, put_u128};
use meridian_types::{
    tokens_from_power, Address, BasisPoints, UnixNanos, VALIDATOR_UPDATE_DELAY,
};
use tracing::{info, warn};

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    /// Slash a validator for an infraction committed at a known height:
    /// burn `⌊tokens_from_power(power) · fraction⌋`, clamped to the
    /// remaining stake.
    ///
    /// A missing validator is tolerated (it may have been over-slashed and
    /// removed while old evidence replays); a future infraction height
    /// means the driver fed us an impossible block and is fatal.
    pub(crate) fn slash(
        &mut self,
        ctx: &BlockContext,
        addr: &Address,
        infraction_height: i64,
        power: i64,
        fraction: BasisPoints,
    ) {
        if infraction_height > ctx.height {
            panic!(
                "impossible attempt to slash future infraction at height {} but we are at height {}",
                infraction_height, ctx.height
            );
        }
        let validator = match self.get_validator(addr) {
            Some(v) => v,
            None => {
                warn!(
                    address = %hex::encode(addr),
                    "ignored attempt to slash a nonexistent validator"
                );
                return;
            }
        };
        let slash_amount = fraction.apply(tokens_from_power(power));
        self.deduct_and_burn(&validator.address, slash_amount);
        info!(
            address = %hex::encode(addr),
            infraction_height,
            fraction = %fraction,
            "validator slashed"
        );
    }

    /// Slash by an absolute token amount (the burn-queue path).
    pub(crate) fn simple_slash(&mut self, addr: &Address, amount: u128) {
        if amount == 0 {
            panic!("attempted to simple slash with a zero amount");
        }
        let validator = match self.get_validator(addr) {
            Some(v) => v,
            None => {
                warn!(
                    address = %hex::encode(addr),
                    "ignored attempt to simple slash a nonexistent validator"
                );
                return;
            }
        };
        if self
            .get_signing_info(addr)
            .map_or(false, |info| info.tombstoned)
        {
            warn!(
                address = %hex::encode(addr),
                "ignored attempt to simple slash a tombstoned validator"
            );
            return;
        }
        self.emit(Event::Slash {
            address: *addr,
            power: validator.potential_power(),
            reason: SlashReason::AdministrativeBurn,
        });
        self.deduct_and_burn(&validator.address, amount);
        info!(
            address = %hex::encode(addr),
            amount,
            "validator simple slashed"
        );
    }

    /// Deduct up to `amount` from the validator's stake, burn it from the
    /// custodying pool, and force-unstake when the remainder falls below
    /// the minimum.
    fn deduct_and_burn(&mut self, addr: &Address, amount: u128) {
        let mut validator = match self.get_validator(addr) {
            Some(v) => v,
            None => return,
        };
        if validator.is_unbonded() && validator.staked_tokens == 0 {
            warn!(
                address = %hex::encode(addr),
                "should not be slashing an unbonded validator"
            );
            return;
        }

        let tokens_to_burn = amount.min(validator.staked_tokens);
        if tokens_to_burn > 0 {
            let pool = if validator.is_bonded() {
                STAKED_POOL
            } else {
                UNSTAKING_POOL
            };
            validator.staked_tokens -= tokens_to_burn;
            self.set_validator(&validator);
            if let Err(e) = self.bank.burn(pool, tokens_to_burn) {
                panic!("pool imbalance burning slashed stake from {}: {}", pool, e);
            }
        }

        let params = self.get_params();
        if validator.staked_tokens < params.stake_minimum {
            self.force_unstake(&validator);
        }
    }

    /// Handle equivocation evidence: a validator signing two blocks at the
    /// same height. `power` is the validator's power at the infraction as
    /// reported by the consensus engine.
    pub fn handle_double_sign(
        &mut self,
        ctx: &BlockContext,
        cons_addr: &Address,
        infraction_height: i64,
        timestamp: UnixNanos,
        power: i64,
    ) -> Result<(), StakingError> {
        let validator = self
            .validator_by_cons_addr(cons_addr)
            .filter(|v| !v.is_unbonded())
            .ok_or(StakingError::CantHandleEvidence(*cons_addr))?;
        let addr = validator.address;

        if infraction_height > ctx.height {
            return Err(StakingError::FutureInfraction {
                infraction_height,
                height: ctx.height,
            });
        }
        let params = self.get_params();
        let age = ctx.time - timestamp;
        if age > params.max_evidence_age {
            return Err(StakingError::EvidenceTooOld {
                age,
                max_age: params.max_evidence_age,
            });
        }

        let signing_info = self.get_signing_info(&addr).unwrap_or_else(|| {
            panic!(
                "expected signing info for validator {} but none found",
                hex::encode(addr)
            )
        });
        if signing_info.tombstoned {
            return Err(StakingError::Tombstoned(addr));
        }

        info!(
            address = %hex::encode(addr),
            infraction_height,
            age,
            "confirmed double sign"
        );
        self.emit(Event::Slash {
            address: addr,
            power,
            reason: SlashReason::DoubleSign,
        });
        let distribution_height = infraction_height - VALIDATOR_UPDATE_DELAY;
        self.slash(
            ctx,
            &addr,
            distribution_height,
            power,
            params.slash_fraction_double_sign,
        );

        // Re-fetch: the slash may have force-unstaked and rewritten the
        // signing info in the meantime.
        let mut signing_info = self.get_signing_info(&addr).unwrap_or_default();
        signing_info.tombstoned = true;
        self.set_signing_info(&addr, &signing_info);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administrative burn queue
    // ------------------------------------------------------------------

    /// Accumulate an absolute burn against a validator, applied at the
    /// next begin-block.
    pub fn burn_validator(&mut self, addr: &Address, severity: u128) -> Result<(), StakingError> {
        if severity == 0 {
            return Err(StakingError::AmountNegative);
        }
        let current = self.get_validator_burn(addr).unwrap_or(0);
        let accumulated = current
            .checked_add(severity)
            .unwrap_or_else(|| panic!("burn severity overflow for {}", hex::encode(addr)));
        let mut value = Vec::with_capacity(16);
        put_u128(&mut value, accumulated);
        self.store.set(&keys::burn_key(addr), value);
        info!(
            address = %hex::encode(addr),
            severity,
            accumulated,
            "burn queued"
        );
        Ok(())
    }

    /// Convert a challenge count to tokens and queue the burn. A missing
    /// validator is logged and ignored: it may have been force-unstaked
    /// after the challenges were proven.
    pub fn burn_for_challenges(&mut self, addr: &Address, challenges: u128) {
        if self.get_validator(addr).is_none() {
            warn!(
                address = %hex::encode(addr),
                "validator to burn for challenges not found, possibly force unstaked"
            );
            return;
        }
        let params = self.get_params();
        let coins = params.relays_to_tokens_multiplier * challenges;
        if coins == 0 {
            return;
        }
        // queue rather than slash directly so the penalty lands at a
        // deterministic point of the block lifecycle
        let _ = self.burn_validator(addr, coins);
    }

    pub fn get_validator_burn(&self, addr: &Address) -> Option<u128> {
        let bytes = self.store.get(&keys::burn_key(addr))?;
        let mut input: &[u8] = &bytes;
        let amount = get_u128(&mut input)
            .unwrap_or_else(|e| panic!("corrupt burn entry for {}: {}", hex::encode(addr), e));
        Some(amount)
    }

    /// Drain the burn queue in byte-lex address order. Runs first in
    /// begin-block so administrative penalties are never elided by a
    /// force-unstake later in the same block.
    pub(crate) fn drain_burn_queue(&mut self) {
        let entries: Vec<(Address, u128)> = self
            .store
            .iter_prefix(keys::BURN_KEY)
            .filter_map(|(key, value)| {
                let addr = keys::address_from_index_key(&key)?;
                let mut input: &[u8] = &value;
                let amount = get_u128(&mut input).ok()?;
                Some((addr, amount))
            })
            .collect();
        for (addr, severity) in entries {
            self.simple_slash(&addr, severity);
            self.store.delete(&keys::burn_key(&addr));
        }
    }
}
