//! Stake lifecycle: stake, unstake, force-unstake, jail/unjail and
//! unbonding-queue maturation.
//!
//! Token custody follows status: bonded stake sits in the staked pool,
//! unbonding stake (and stake parked while a validator waits for an
//! active-set slot) in the unstaking pool. The module never mints; every
//! penalty burns through the bank and decreases total supply.

use crate::bank::{BankError, BankModule, STAKED_POOL, UNSTAKING_POOL};
use crate::error::StakingError;
use crate::events::Event;
use crate::store::StateUpdater;
use crate::{address_from_public_key, BlockContext, StakingModule};
use meridian_types::{
    is_valid_chain_id, Address, ConsensusPublicKey, UnixNanos, Validator, ValidatorSigningInfo,
    ValidatorStatus,
};
use tracing::{info, warn};

/// Longest accepted service endpoint string.
const MAX_SERVICE_URL_LEN: usize = 255;

fn validate_service_url(url: &str) -> Result<(), StakingError> {
    let well_formed = !url.is_empty()
        && url.len() <= MAX_SERVICE_URL_LEN
        && !url.contains(char::is_whitespace)
        && url.split_once("://").map_or(false, |(scheme, rest)| {
            !scheme.is_empty() && !rest.is_empty()
        });
    if well_formed {
        Ok(())
    } else {
        Err(StakingError::InvalidServiceUrl(url.to_string()))
    }
}

fn validate_chains(chains: &[String]) -> Result<(), StakingError> {
    if chains.is_empty() || chains.iter().any(|c| !is_valid_chain_id(c)) {
        return Err(StakingError::InvalidChains);
    }
    Ok(())
}

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    /// Stake transaction handler. The operator address is derived from the
    /// consensus key; the operator account pays the stake.
    ///
    /// The validator enters the bonded set immediately when it ranks within
    /// `MaxValidators` by `(power desc, address asc)`, and is parked
    /// `Unbonded` until a slot opens otherwise. Re-staking an unbonded
    /// validator tops up its existing tokens.
    pub fn stake(
        &mut self,
        ctx: &BlockContext,
        public_key: ConsensusPublicKey,
        amount: u128,
        chains: Vec<String>,
        service_url: String,
    ) -> Result<Address, StakingError> {
        let params = self.get_params();
        if amount < params.stake_minimum {
            return Err(StakingError::InvalidStake {
                amount,
                minimum: params.stake_minimum,
            });
        }
        validate_chains(&chains)?;
        validate_service_url(&service_url)?;

        let addr = address_from_public_key(&public_key);
        let existing = self.get_validator(&addr);
        if let Some(existing) = &existing {
            if !existing.is_unbonded() {
                return Err(StakingError::AlreadyStaked(addr));
            }
        }
        let parked_tokens = existing.as_ref().map_or(0, |v| v.staked_tokens);
        let total_tokens = parked_tokens + amount;

        let admitted = self.ranks_within_active_set(&addr, total_tokens, params.max_validators);

        // Operator pays first; nothing below this point can fail the tx.
        self.bank
            .send_account_to_module(&addr, STAKED_POOL, amount)
            .map_err(|e| match e {
                BankError::InsufficientFunds { needed, available } => {
                    StakingError::InsufficientBalance { needed, available }
                }
                other => panic!("stake transfer failed: {}", other),
            })?;

        if admitted {
            // Parked tokens of a re-staking validator move back to the
            // staked pool together with the fresh stake.
            if parked_tokens > 0 {
                self.move_pool_tokens(UNSTAKING_POOL, STAKED_POOL, parked_tokens);
            }
        } else {
            self.move_pool_tokens(STAKED_POOL, UNSTAKING_POOL, amount);
        }

        let mut validator = Validator::new(addr, public_key, total_tokens, chains, service_url);
        validator.jailed = existing.as_ref().map_or(false, |v| v.jailed);
        validator.status = if admitted {
            ValidatorStatus::Bonded
        } else {
            ValidatorStatus::Unbonded
        };
        self.set_validator(&validator);

        if self.get_signing_info(&addr).is_none() {
            self.set_signing_info(&addr, &ValidatorSigningInfo::new(ctx.height));
        }

        self.emit(Event::Stake {
            address: addr,
            amount,
        });
        info!(
            address = %hex::encode(addr),
            amount,
            bonded = admitted,
            "validator staked"
        );
        Ok(addr)
    }

    /// Begin unbonding a validator's entire stake.
    pub fn unstake(&mut self, ctx: &BlockContext, addr: &Address) -> Result<(), StakingError> {
        let mut validator = self
            .get_validator(addr)
            .ok_or(StakingError::ValidatorNotFound(*addr))?;
        if !validator.is_bonded() || validator.jailed {
            return Err(StakingError::NotBonded(*addr));
        }
        let params = self.get_params();
        let completion = ctx.time + params.unstaking_time;

        validator.status = ValidatorStatus::Unbonding;
        validator.unstaking_completion_time = completion;
        self.set_validator(&validator);
        self.insert_unstaking_entry(completion, addr);
        self.move_pool_tokens(STAKED_POOL, UNSTAKING_POOL, validator.staked_tokens);

        self.emit(Event::Unstake {
            address: *addr,
            completion_time: completion,
        });
        info!(
            address = %hex::encode(addr),
            completion,
            "validator began unbonding"
        );
        Ok(())
    }

    /// Burn a validator's entire remaining stake and drop it from the
    /// active set. Triggered when slashing pushes the stake below the
    /// minimum.
    pub(crate) fn force_unstake(&mut self, validator: &Validator) {
        let addr = validator.address;
        let mut validator = validator.clone();

        if validator.staked_tokens > 0 {
            let pool = if validator.is_bonded() {
                STAKED_POOL
            } else {
                UNSTAKING_POOL
            };
            if let Err(e) = self.bank.burn(pool, validator.staked_tokens) {
                panic!("pool imbalance burning forced unstake from {}: {}", pool, e);
            }
        }
        if validator.is_unbonding() {
            self.delete_unstaking_entry(validator.unstaking_completion_time, &addr);
        }

        validator.staked_tokens = 0;
        validator.status = ValidatorStatus::Unbonded;
        validator.unstaking_completion_time = 0;
        self.set_validator(&validator);

        if let Some(mut signing_info) = self.get_signing_info(&addr) {
            signing_info.jailed_until = 0;
            self.set_signing_info(&addr, &signing_info);
        }
        warn!(
            address = %hex::encode(addr),
            "validator force-unstaked, remaining stake burned"
        );
    }

    /// Exclude a validator from consensus. Idempotent.
    pub fn jail_validator(&mut self, addr: &Address) {
        let mut validator = match self.get_validator(addr) {
            Some(v) => v,
            None => {
                warn!(address = %hex::encode(addr), "cannot jail: validator not found");
                return;
            }
        };
        if validator.jailed {
            return;
        }
        validator.jailed = true;
        self.set_validator(&validator);
        self.emit(Event::Jail { address: *addr });
        info!(address = %hex::encode(addr), "validator jailed");
    }

    /// Unjail transaction handler.
    pub fn unjail(&mut self, ctx: &BlockContext, addr: &Address) -> Result<(), StakingError> {
        let mut validator = self
            .get_validator(addr)
            .ok_or(StakingError::ValidatorNotFound(*addr))?;
        if !validator.jailed {
            return Err(StakingError::NotJailed(*addr));
        }
        let signing_info = self.get_signing_info(addr).unwrap_or_default();
        if signing_info.tombstoned {
            return Err(StakingError::Tombstoned(*addr));
        }
        if ctx.time < signing_info.jailed_until {
            return Err(StakingError::JailedUntilFuture {
                now: ctx.time,
                jailed_until: signing_info.jailed_until,
            });
        }
        let params = self.get_params();
        if validator.staked_tokens < params.stake_minimum {
            return Err(StakingError::BelowMinimumStake {
                tokens: validator.staked_tokens,
                minimum: params.stake_minimum,
            });
        }

        validator.jailed = false;
        self.set_validator(&validator);
        self.emit(Event::Unjail { address: *addr });
        info!(address = %hex::encode(addr), "validator unjailed");
        Ok(())
    }

    /// Complete every unbonding whose time has come, returning stake to the
    /// operator accounts. Runs first in end-block.
    pub(crate) fn mature_unbondings(&mut self, now: UnixNanos) {
        for (completion, addr) in self.mature_unstaking_entries(now) {
            self.delete_unstaking_entry(completion, &addr);
            let mut validator = match self.get_validator(&addr) {
                Some(v) => v,
                None => {
                    warn!(
                        address = %hex::encode(addr),
                        "stale unstaking entry for missing validator"
                    );
                    continue;
                }
            };
            if !validator.is_unbonding() {
                warn!(
                    address = %hex::encode(addr),
                    "unstaking entry for validator not unbonding"
                );
                continue;
            }

            let tokens = validator.staked_tokens;
            if tokens > 0 {
                if let Err(e) = self.bank.send_module_to_account(UNSTAKING_POOL, &addr, tokens) {
                    panic!("pool imbalance returning unbonded stake: {}", e);
                }
            }
            validator.staked_tokens = 0;
            validator.status = ValidatorStatus::Unbonded;
            validator.unstaking_completion_time = 0;
            self.set_validator(&validator);
            info!(
                address = %hex::encode(addr),
                tokens,
                "unbonding matured"
            );
        }
    }

    /// Would the candidate hold a slot if the set were rebuilt right now?
    fn ranks_within_active_set(
        &self,
        candidate: &Address,
        candidate_tokens: u128,
        max_validators: u64,
    ) -> bool {
        let candidate_power = meridian_types::power_from_tokens(candidate_tokens);
        let mut ranking: Vec<(i64, Address)> = self
            .validators_by_power_desc()
            .into_iter()
            .filter(|v| v.address != *candidate)
            .map(|v| (v.potential_power(), v.address))
            .collect();
        ranking.push((candidate_power, *candidate));
        ranking.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        ranking
            .iter()
            .take(max_validators as usize)
            .any(|(_, addr)| addr == candidate)
    }

    /// Pool-to-pool moves must always succeed; failure means the pool
    /// accounting has diverged from the validator records.
    pub(crate) fn move_pool_tokens(&mut self, from: &str, to: &str, amount: u128) {
        if amount == 0 {
            return;
        }
        if let Err(e) = self.bank.send_module_to_module(from, to, amount) {
            panic!("pool imbalance moving {} from {} to {}: {}", amount, from, to, e);
        }
    }
}
