//! Application staking: the non-consensus mirror of the validator
//! lifecycle.
//!
//! Applications stake for relay throughput. They share the bonded →
//! unbonding → unbonded lifecycle with their own pools, prefixes and
//! maturation queue, but are never jailed, slashed or reported to the
//! consensus engine.

use crate::bank::{BankError, BankModule, APP_STAKED_POOL, APP_UNSTAKING_POOL};
use crate::error::StakingError;
use crate::events::Event;
use crate::keys;
use crate::store::StateUpdater;
use crate::{address_from_public_key, BlockContext, StakingModule};
use meridian_serde::{StateDecode, StateEncode};
use meridian_types::{
    is_valid_chain_id, Address, Application, ConsensusPublicKey, UnixNanos, ValidatorStatus,
};
use tracing::{info, warn};

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    pub fn get_application(&self, addr: &Address) -> Option<Application> {
        let bytes = self.store.get(&keys::application_key(addr))?;
        let app = Application::from_state_bytes(&bytes).unwrap_or_else(|e| {
            panic!("corrupt application record for {}: {}", hex::encode(addr), e)
        });
        Some(app)
    }

    pub fn set_application(&mut self, application: &Application) {
        let addr = application.address;
        let old = self.get_application(&addr);
        if let Some(old) = &old {
            if old.is_bonded() {
                self.store
                    .delete(&keys::app_staked_key(app_power(old), &addr));
            }
        }
        self.store
            .set(&keys::application_key(&addr), application.to_state_bytes());
        if application.is_bonded() {
            self.store.set(
                &keys::app_staked_key(app_power(application), &addr),
                addr.to_vec(),
            );
        }
    }

    pub fn delete_application(&mut self, addr: &Address) {
        if let Some(app) = self.get_application(addr) {
            if app.is_bonded() {
                self.store
                    .delete(&keys::app_staked_key(app_power(&app), addr));
            }
        }
        self.store.delete(&keys::application_key(addr));
    }

    pub fn all_applications(&self) -> Vec<Application> {
        self.store
            .iter_prefix(keys::APPLICATION_KEY)
            .map(|(key, bytes)| {
                Application::from_state_bytes(&bytes).unwrap_or_else(|e| {
                    panic!("corrupt application record at {:?}: {}", key, e)
                })
            })
            .collect()
    }

    /// Application stake transaction handler. Applications have no set cap:
    /// a valid stake bonds immediately.
    pub fn app_stake(
        &mut self,
        ctx: &BlockContext,
        public_key: ConsensusPublicKey,
        amount: u128,
        chains: Vec<String>,
    ) -> Result<Address, StakingError> {
        let params = self.get_params();
        if amount < params.stake_minimum {
            return Err(StakingError::InvalidStake {
                amount,
                minimum: params.stake_minimum,
            });
        }
        if chains.is_empty() || chains.iter().any(|c| !is_valid_chain_id(c)) {
            return Err(StakingError::InvalidChains);
        }

        let addr = address_from_public_key(&public_key);
        if let Some(existing) = self.get_application(&addr) {
            if !existing.is_unbonded() {
                return Err(StakingError::AlreadyStaked(addr));
            }
        }

        self.bank
            .send_account_to_module(&addr, APP_STAKED_POOL, amount)
            .map_err(|e| match e {
                BankError::InsufficientFunds { needed, available } => {
                    StakingError::InsufficientBalance { needed, available }
                }
                other => panic!("application stake transfer failed: {}", other),
            })?;

        let application = Application::new(addr, public_key, amount, chains);
        self.set_application(&application);
        self.emit(Event::Stake {
            address: addr,
            amount,
        });
        info!(
            address = %hex::encode(addr),
            amount,
            height = ctx.height,
            "application staked"
        );
        Ok(addr)
    }

    /// Begin unbonding an application's entire stake.
    pub fn app_unstake(&mut self, ctx: &BlockContext, addr: &Address) -> Result<(), StakingError> {
        let mut application = self
            .get_application(addr)
            .ok_or(StakingError::ApplicationNotFound(*addr))?;
        if !application.is_bonded() {
            return Err(StakingError::NotBonded(*addr));
        }
        let params = self.get_params();
        let completion = ctx.time + params.unstaking_time;

        application.status = ValidatorStatus::Unbonding;
        application.unstaking_completion_time = completion;
        self.set_application(&application);
        self.store
            .set(&keys::app_unstaking_key(completion, addr), addr.to_vec());
        if let Err(e) =
            self.bank
                .send_module_to_module(APP_STAKED_POOL, APP_UNSTAKING_POOL, application.staked_tokens)
        {
            panic!("pool imbalance moving application stake: {}", e);
        }

        self.emit(Event::Unstake {
            address: *addr,
            completion_time: completion,
        });
        Ok(())
    }

    /// Complete matured application unbondings; runs at end-block alongside
    /// the validator queue.
    pub(crate) fn mature_app_unbondings(&mut self, now: UnixNanos) {
        let mature: Vec<(UnixNanos, Address)> = self
            .store
            .iter_prefix(keys::APP_UNSTAKING_KEY)
            .take_while(|(key, _)| {
                let time_bytes = &key[keys::APP_UNSTAKING_KEY.len()..key.len() - 20];
                meridian_serde::io::u64_from_be(time_bytes)
                    .map(|t| t as i64 <= now)
                    .unwrap_or(false)
            })
            .filter_map(|(key, _)| {
                let time_bytes = &key[keys::APP_UNSTAKING_KEY.len()..key.len() - 20];
                let completion = meridian_serde::io::u64_from_be(time_bytes).ok()? as i64;
                let addr = keys::address_from_index_key(&key)?;
                Some((completion, addr))
            })
            .collect();

        for (completion, addr) in mature {
            self.store.delete(&keys::app_unstaking_key(completion, &addr));
            let application = match self.get_application(&addr) {
                Some(app) => app,
                None => {
                    warn!(
                        address = %hex::encode(addr),
                        "stale app unstaking entry for missing application"
                    );
                    continue;
                }
            };
            if !application.is_unbonding() {
                warn!(
                    address = %hex::encode(addr),
                    "app unstaking entry for application not unbonding"
                );
                continue;
            }

            let tokens = application.staked_tokens;
            if tokens > 0 {
                if let Err(e) =
                    self.bank
                        .send_module_to_account(APP_UNSTAKING_POOL, &addr, tokens)
                {
                    panic!("pool imbalance returning application stake: {}", e);
                }
            }
            self.delete_application(&addr);
            info!(
                address = %hex::encode(addr),
                tokens,
                "application unbonding matured"
            );
        }
    }
}

fn app_power(application: &Application) -> i64 {
    meridian_types::power_from_tokens(application.staked_tokens)
}
