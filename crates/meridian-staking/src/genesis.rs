//! Genesis initialization and export.
//!
//! `init_genesis` seeds an empty store from an explicit genesis state;
//! `export_genesis` reads the same shape back for chain restarts. Pool
//! balances are the host's responsibility: the bank must be seeded
//! consistently with the staked/unbonding tokens recorded here before the
//! first block runs.

use crate::bank::BankModule;
use crate::keys;
use crate::params::{param_key_table, StakingParams};
use crate::store::StateUpdater;
use crate::StakingModule;
use meridian_serde::io::put_i64;
use meridian_types::{Address, Application, Validator, ValidatorSigningInfo};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenesisState {
    pub params: StakingParams,
    pub validators: Vec<Validator>,
    pub applications: Vec<Application>,
    pub signing_infos: Vec<(Address, ValidatorSigningInfo)>,
}

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    pub fn init_genesis(&mut self, genesis: &GenesisState) {
        let params_json =
            serde_json::to_value(&genesis.params).expect("params serialize to json");
        for spec in param_key_table() {
            let value = &params_json[spec.name];
            self.store.set(
                &keys::param_key(spec.name),
                serde_json::to_vec(value).expect("json value serializes"),
            );
        }

        for validator in &genesis.validators {
            self.set_validator(validator);
            if validator.is_unbonding() {
                self.insert_unstaking_entry(
                    validator.unstaking_completion_time,
                    &validator.address,
                );
            }
        }
        for (addr, info) in &genesis.signing_infos {
            self.set_signing_info(addr, info);
        }
        // Validators without an explicit signing info start a fresh window.
        for validator in &genesis.validators {
            if self.get_signing_info(&validator.address).is_none() {
                self.set_signing_info(&validator.address, &ValidatorSigningInfo::new(0));
            }
        }

        for application in &genesis.applications {
            self.set_application(application);
            if application.is_unbonding() {
                self.store.set(
                    &keys::app_unstaking_key(
                        application.unstaking_completion_time,
                        &application.address,
                    ),
                    application.address.to_vec(),
                );
            }
        }

        // Seed the "last" reported set so the first end-block emits a diff,
        // not the whole universe.
        let mut bonded: Vec<&Validator> = genesis
            .validators
            .iter()
            .filter(|v| v.is_bonded() && !v.jailed && v.staked_tokens > 0)
            .collect();
        bonded.sort_by(|a, b| {
            b.potential_power()
                .cmp(&a.potential_power())
                .then(a.address.cmp(&b.address))
        });
        bonded.truncate(genesis.params.max_validators as usize);
        for validator in bonded {
            let mut value = Vec::with_capacity(8);
            put_i64(&mut value, validator.potential_power());
            self.store
                .set(&keys::last_power_key(&validator.address), value);
        }
    }

    pub fn export_genesis(&self) -> GenesisState {
        let validators = self.all_validators();
        let signing_infos = validators
            .iter()
            .filter_map(|v| Some((v.address, self.get_signing_info(&v.address)?)))
            .collect();
        GenesisState {
            params: self.get_params(),
            validators,
            applications: self.all_applications(),
            signing_infos,
        }
    }
}
