//! Per-validator liveness tracking: signing infos and the missed-block
//! bitmap.
//!
//! The bitmap holds one entry per window slot under
//! `missed|<addr><be index>`; a present entry means the slot was missed.
//! `missed_blocks_counter` mirrors the number of set bits so the per-block
//! update is a counter delta instead of a window sum.

use crate::bank::BankModule;
use crate::events::{Event, SlashReason};
use crate::keys;
use crate::store::StateUpdater;
use crate::{BlockContext, StakingModule};
use meridian_serde::{StateDecode, StateEncode};
use meridian_types::{Address, ValidatorSigningInfo, VALIDATOR_UPDATE_DELAY};
use tracing::info;

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    pub fn get_signing_info(&self, addr: &Address) -> Option<ValidatorSigningInfo> {
        let bytes = self.store.get(&keys::signing_info_key(addr))?;
        let info = ValidatorSigningInfo::from_state_bytes(&bytes).unwrap_or_else(|e| {
            panic!("corrupt signing info for {}: {}", hex::encode(addr), e)
        });
        Some(info)
    }

    pub fn set_signing_info(&mut self, addr: &Address, info: &ValidatorSigningInfo) {
        self.store
            .set(&keys::signing_info_key(addr), info.to_state_bytes());
    }

    /// The bitmap is all-zero until a bit has been explicitly set.
    pub(crate) fn missed_at(&self, addr: &Address, index: i64) -> bool {
        self.store.get(&keys::missed_key(addr, index)).is_some()
    }

    pub(crate) fn set_missed_at(&mut self, addr: &Address, index: i64, missed: bool) {
        let key = keys::missed_key(addr, index);
        if missed {
            self.store.set(&key, vec![0x01]);
        } else {
            self.store.delete(&key);
        }
    }

    pub(crate) fn clear_missed(&mut self, addr: &Address) {
        let keys_to_clear: Vec<Vec<u8>> = self
            .store
            .iter_prefix(&keys::missed_prefix(addr))
            .map(|(key, _)| key)
            .collect();
        for key in keys_to_clear {
            self.store.delete(&key);
        }
    }

    /// Process one signature report. Must be called exactly once per
    /// reported validator per block.
    ///
    /// Missing validator or signing info for a consensus-reported address
    /// means the replicated state has diverged from the engine's view,
    /// which is consensus-fatal.
    pub fn handle_validator_signature(
        &mut self,
        ctx: &BlockContext,
        cons_addr: &Address,
        power: i64,
        signed: bool,
    ) {
        let validator = self.validator_by_cons_addr(cons_addr).unwrap_or_else(|| {
            panic!(
                "validator with consensus address {} not found",
                hex::encode(cons_addr)
            )
        });
        let addr = validator.address;
        let params = self.get_params();
        let mut info = self.get_signing_info(&addr).unwrap_or_else(|| {
            panic!(
                "expected signing info for validator {} but none found",
                hex::encode(addr)
            )
        });

        // Relative index: counts blocks the validator *should* have signed.
        let index = info.index_offset % params.signed_blocks_window;
        info.index_offset += 1;

        let previous = self.missed_at(&addr, index);
        let missed = !signed;
        match (previous, missed) {
            (false, true) => {
                self.set_missed_at(&addr, index, true);
                info.missed_blocks_counter += 1;
            }
            (true, false) => {
                self.set_missed_at(&addr, index, false);
                info.missed_blocks_counter -= 1;
            }
            _ => {
                // Bit unchanged, counter already accurate.
            }
        }

        if missed {
            self.emit(Event::Liveness {
                address: addr,
                missed_blocks: info.missed_blocks_counter,
                height: ctx.height,
            });
            info!(
                address = %hex::encode(addr),
                height = ctx.height,
                missed = info.missed_blocks_counter,
                "absent validator"
            );
        }

        let min_height = info.start_height + params.signed_blocks_window;
        let max_missed = params.signed_blocks_window
            - params
                .min_signed_per_window
                .apply_i64(params.signed_blocks_window);

        if ctx.height > min_height && info.missed_blocks_counter > max_missed {
            if validator.is_bonded() && !validator.jailed && !info.tombstoned {
                // The stake distribution that signed this block is one
                // consensus round behind the current height; the result may
                // be negative in the first blocks and is informational only.
                let distribution_height = ctx.height - VALIDATOR_UPDATE_DELAY - 1;
                self.emit(Event::Slash {
                    address: addr,
                    power,
                    reason: SlashReason::MissingSignature,
                });
                self.slash(
                    ctx,
                    &addr,
                    distribution_height,
                    power,
                    params.slash_fraction_downtime,
                );
                self.jail_validator(&addr);
                info.jailed_until = ctx.time + params.downtime_jail_duration;
                // Reset the window so the validator is not re-slashed
                // immediately after unjailing.
                info.missed_blocks_counter = 0;
                info.index_offset = 0;
                self.clear_missed(&addr);
            } else {
                info!(
                    address = %hex::encode(addr),
                    "validator would have been slashed for downtime, but was not bonded, jailed or tombstoned"
                );
            }
        }

        self.set_signing_info(&addr, &info);
    }

    /// Re-base every signing window after a `SignedBlocksWindow` change so
    /// counters accumulated under the old window cannot trigger a spurious
    /// slash under the new one.
    pub(crate) fn reset_all_signing_windows(&mut self) {
        let addrs: Vec<Address> = self
            .store
            .iter_prefix(keys::SIGNING_INFO_KEY)
            .filter_map(|(key, _)| {
                let suffix = &key[keys::SIGNING_INFO_KEY.len()..];
                if suffix.len() != 20 {
                    return None;
                }
                let mut addr = [0u8; 20];
                addr.copy_from_slice(suffix);
                Some(addr)
            })
            .collect();

        for addr in addrs {
            let mut info = match self.get_signing_info(&addr) {
                Some(info) => info,
                None => continue,
            };
            info.missed_blocks_counter = 0;
            info.index_offset = 0;
            self.set_signing_info(&addr, &info);
            self.clear_missed(&addr);
        }
    }
}
