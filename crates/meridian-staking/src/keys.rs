//! Persisted key layout.
//!
//! Prefix constants are stable across versions; integers embedded in keys
//! are big-endian so byte-lex iteration equals numeric iteration.
//!
//! - `validator|<addr>` → encoded validator
//! - `staked|<be power><addr>` → addr (power index; bonded, non-jailed only)
//! - `unstaking|<be completion nanos><addr>` → addr (maturation queue)
//! - `cons_addr|<cons addr>` → operator addr
//! - `signing_info|<addr>` → encoded signing info
//! - `missed|<addr><be index>` → 0x01 (set bits of the missed bitmap)
//! - `burn|<addr>` → accumulated severity (u128)
//! - `params|<name>` → json-encoded parameter value
//! - `last_powers|<addr>` → i64 power reported to consensus last block
//! - `application|<addr>`, `app_staked|…`, `app_unstaking|…` mirror the
//!   validator spaces for the application subsystem

use meridian_serde::io::be_i64;
use meridian_types::{Address, UnixNanos};

pub const VALIDATOR_KEY: &[u8] = b"validator|";
pub const STAKED_KEY: &[u8] = b"staked|";
pub const UNSTAKING_KEY: &[u8] = b"unstaking|";
pub const CONS_ADDR_KEY: &[u8] = b"cons_addr|";
pub const SIGNING_INFO_KEY: &[u8] = b"signing_info|";
pub const MISSED_KEY: &[u8] = b"missed|";
pub const BURN_KEY: &[u8] = b"burn|";
pub const PARAMS_KEY: &[u8] = b"params|";
pub const LAST_POWERS_KEY: &[u8] = b"last_powers|";

pub const APPLICATION_KEY: &[u8] = b"application|";
pub const APP_STAKED_KEY: &[u8] = b"app_staked|";
pub const APP_UNSTAKING_KEY: &[u8] = b"app_unstaking|";

fn join(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let len = prefix.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.extend_from_slice(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

pub fn validator_key(addr: &Address) -> Vec<u8> {
    join(VALIDATOR_KEY, &[addr])
}

pub fn staked_key(power: i64, addr: &Address) -> Vec<u8> {
    join(STAKED_KEY, &[&be_i64(power), addr])
}

pub fn unstaking_key(completion: UnixNanos, addr: &Address) -> Vec<u8> {
    join(UNSTAKING_KEY, &[&be_i64(completion), addr])
}

pub fn cons_addr_key(cons_addr: &Address) -> Vec<u8> {
    join(CONS_ADDR_KEY, &[cons_addr])
}

pub fn signing_info_key(addr: &Address) -> Vec<u8> {
    join(SIGNING_INFO_KEY, &[addr])
}

pub fn missed_key(addr: &Address, index: i64) -> Vec<u8> {
    join(MISSED_KEY, &[addr, &be_i64(index)])
}

/// Prefix covering every missed-bit of one validator.
pub fn missed_prefix(addr: &Address) -> Vec<u8> {
    join(MISSED_KEY, &[addr])
}

pub fn burn_key(addr: &Address) -> Vec<u8> {
    join(BURN_KEY, &[addr])
}

pub fn param_key(name: &str) -> Vec<u8> {
    join(PARAMS_KEY, &[name.as_bytes()])
}

pub fn last_power_key(addr: &Address) -> Vec<u8> {
    join(LAST_POWERS_KEY, &[addr])
}

pub fn application_key(addr: &Address) -> Vec<u8> {
    join(APPLICATION_KEY, &[addr])
}

pub fn app_staked_key(power: i64, addr: &Address) -> Vec<u8> {
    join(APP_STAKED_KEY, &[&be_i64(power), addr])
}

pub fn app_unstaking_key(completion: UnixNanos, addr: &Address) -> Vec<u8> {
    join(APP_UNSTAKING_KEY, &[&be_i64(completion), addr])
}

/// Recover the address suffix of an index key (power or unstaking index).
pub fn address_from_index_key(key: &[u8]) -> Option<Address> {
    if key.len() < 20 {
        return None;
    }
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&key[key.len() - 20..]);
    Some(addr)
}

/// Recover the trailing big-endian i64 of a missed-bitmap key.
pub fn index_from_missed_key(key: &[u8]) -> Option<i64> {
    if key.len() < 8 {
        return None;
    }
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&key[key.len() - 8..]);
    Some(u64::from_be_bytes(arr) as i64)
}
