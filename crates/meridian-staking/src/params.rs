//! Governance-tunable parameters.
//!
//! Each parameter is persisted under `params|<name>` as a json-encoded
//! value, the representation the governance module reads and writes.
//! `get_params` assembles the full set with defaults for absent keys, so a
//! fresh store behaves like a genesis-defaulted one.

use crate::bank::BankModule;
use crate::keys;
use crate::store::StateUpdater;
use crate::StakingModule;
use meridian_types::{BasisPoints, Nanos, NANOS_PER_SECOND};
use serde::{Deserialize, Serialize};

pub const PARAM_UNSTAKING_TIME: &str = "unstaking_time";
pub const PARAM_MAX_VALIDATORS: &str = "max_validators";
pub const PARAM_STAKE_MINIMUM: &str = "stake_minimum";
pub const PARAM_SIGNED_BLOCKS_WINDOW: &str = "signed_blocks_window";
pub const PARAM_MIN_SIGNED_PER_WINDOW: &str = "min_signed_per_window";
pub const PARAM_DOWNTIME_JAIL_DURATION: &str = "downtime_jail_duration";
pub const PARAM_SLASH_FRACTION_DOUBLE_SIGN: &str = "slash_fraction_double_sign";
pub const PARAM_SLASH_FRACTION_DOWNTIME: &str = "slash_fraction_downtime";
pub const PARAM_MAX_EVIDENCE_AGE: &str = "max_evidence_age";
pub const PARAM_RELAYS_TO_TOKENS_MULTIPLIER: &str = "relays_to_tokens_multiplier";

/// One row of the parameter key table registered with governance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub type_name: &'static str,
}

/// The table of governance-settable parameters and their json types.
pub fn param_key_table() -> &'static [ParamSpec] {
    &[
        ParamSpec { name: PARAM_UNSTAKING_TIME, type_name: "i64 (nanoseconds)" },
        ParamSpec { name: PARAM_MAX_VALIDATORS, type_name: "u64" },
        ParamSpec { name: PARAM_STAKE_MINIMUM, type_name: "u128 (micro-units)" },
        ParamSpec { name: PARAM_SIGNED_BLOCKS_WINDOW, type_name: "i64" },
        ParamSpec { name: PARAM_MIN_SIGNED_PER_WINDOW, type_name: "u32 (basis points)" },
        ParamSpec { name: PARAM_DOWNTIME_JAIL_DURATION, type_name: "i64 (nanoseconds)" },
        ParamSpec { name: PARAM_SLASH_FRACTION_DOUBLE_SIGN, type_name: "u32 (basis points)" },
        ParamSpec { name: PARAM_SLASH_FRACTION_DOWNTIME, type_name: "u32 (basis points)" },
        ParamSpec { name: PARAM_MAX_EVIDENCE_AGE, type_name: "i64 (nanoseconds)" },
        ParamSpec { name: PARAM_RELAYS_TO_TOKENS_MULTIPLIER, type_name: "u128" },
    ]
}

mod bps_serde {
    use meridian_types::{BasisPoints, BPS_DENOM};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<Ser: Serializer>(bps: &BasisPoints, s: Ser) -> Result<Ser::Ok, Ser::Error> {
        bps.as_u32().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BasisPoints, D::Error> {
        let raw = u32::deserialize(d)?;
        if raw > BPS_DENOM {
            return Err(serde::de::Error::custom("fraction exceeds 10000 bps"));
        }
        Ok(BasisPoints::new(raw))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    pub unstaking_time: Nanos,
    pub max_validators: u64,
    pub stake_minimum: u128,
    pub signed_blocks_window: i64,
    #[serde(with = "bps_serde")]
    pub min_signed_per_window: BasisPoints,
    pub downtime_jail_duration: Nanos,
    #[serde(with = "bps_serde")]
    pub slash_fraction_double_sign: BasisPoints,
    #[serde(with = "bps_serde")]
    pub slash_fraction_downtime: BasisPoints,
    pub max_evidence_age: Nanos,
    pub relays_to_tokens_multiplier: u128,
}

impl Default for StakingParams {
    fn default() -> Self {
        StakingParams {
            unstaking_time: 21 * 24 * 3600 * NANOS_PER_SECOND,
            max_validators: 100,
            stake_minimum: 1_000_000,
            signed_blocks_window: 100,
            min_signed_per_window: BasisPoints::new(5_000),
            downtime_jail_duration: 600 * NANOS_PER_SECOND,
            slash_fraction_double_sign: BasisPoints::new(500),
            slash_fraction_downtime: BasisPoints::new(100),
            max_evidence_age: 3_600 * NANOS_PER_SECOND,
            relays_to_tokens_multiplier: 1_000,
        }
    }
}

impl StakingParams {
    /// Range validation applied on every governance write.
    fn validate(&self) -> Result<(), ParamError> {
        if self.signed_blocks_window < 1 {
            return Err(ParamError::OutOfRange(PARAM_SIGNED_BLOCKS_WINDOW));
        }
        if self.max_validators < 1 {
            return Err(ParamError::OutOfRange(PARAM_MAX_VALIDATORS));
        }
        if self.stake_minimum < 1 {
            return Err(ParamError::OutOfRange(PARAM_STAKE_MINIMUM));
        }
        if self.unstaking_time < 0
            || self.downtime_jail_duration < 0
            || self.max_evidence_age < 0
        {
            return Err(ParamError::OutOfRange("duration parameters"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    UnknownKey(String),
    InvalidValue(String),
    OutOfRange(&'static str),
}

impl std::fmt::Display for ParamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamError::UnknownKey(key) => write!(f, "unknown parameter key {}", key),
            ParamError::InvalidValue(msg) => write!(f, "invalid parameter value: {}", msg),
            ParamError::OutOfRange(what) => write!(f, "parameter out of range: {}", what),
        }
    }
}

impl std::error::Error for ParamError {}

impl<S: StateUpdater, B: BankModule> StakingModule<S, B> {
    /// Assemble the current parameter set; absent keys fall back to
    /// defaults. Callers inside a block treat the result as a snapshot.
    pub fn get_params(&self) -> StakingParams {
        let defaults = serde_json::to_value(StakingParams::default())
            .expect("params serialize to json");
        let mut map = match defaults {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("params serialize to a json object"),
        };
        for spec in param_key_table() {
            if let Some(bytes) = self.store.get(&keys::param_key(spec.name)) {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .unwrap_or_else(|e| panic!("corrupt parameter {}: {}", spec.name, e));
                map.insert(spec.name.to_string(), value);
            }
        }
        serde_json::from_value(serde_json::Value::Object(map))
            .unwrap_or_else(|e| panic!("corrupt parameter store: {}", e))
    }

    /// Json-encoded value of a single parameter, for the governance query
    /// surface.
    pub fn get_param_json(&self, key: &str) -> Result<Vec<u8>, ParamError> {
        if !param_key_table().iter().any(|s| s.name == key) {
            return Err(ParamError::UnknownKey(key.to_string()));
        }
        if let Some(bytes) = self.store.get(&keys::param_key(key)) {
            return Ok(bytes);
        }
        let defaults =
            serde_json::to_value(StakingParams::default()).expect("params serialize to json");
        let value = &defaults[key];
        Ok(serde_json::to_vec(value).expect("json value serializes"))
    }

    /// Governance callback: set one parameter from its json encoding.
    ///
    /// Shrinking or growing `signed_blocks_window` re-bases every signing
    /// window so that stale counters cannot trigger a spurious slash under
    /// the new window size.
    pub fn set_param(&mut self, key: &str, json_value: &[u8]) -> Result<(), ParamError> {
        if !param_key_table().iter().any(|s| s.name == key) {
            return Err(ParamError::UnknownKey(key.to_string()));
        }
        let value: serde_json::Value = serde_json::from_slice(json_value)
            .map_err(|e| ParamError::InvalidValue(e.to_string()))?;

        let old = self.get_params();
        let mut map = match serde_json::to_value(&old).expect("params serialize to json") {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("params serialize to a json object"),
        };
        map.insert(key.to_string(), value.clone());
        let new: StakingParams = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| ParamError::InvalidValue(e.to_string()))?;
        new.validate()?;

        self.store.set(
            &keys::param_key(key),
            serde_json::to_vec(&value).expect("json value serializes"),
        );

        if key == PARAM_SIGNED_BLOCKS_WINDOW && old.signed_blocks_window != new.signed_blocks_window
        {
            self.reset_all_signing_windows();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::InMemoryBank;
    use crate::store::InMemoryState;

    fn module() -> StakingModule<InMemoryState, InMemoryBank> {
        StakingModule::new(InMemoryState::new(), InMemoryBank::new())
    }

    #[test]
    fn defaults_apply_on_fresh_store() {
        let m = module();
        assert_eq!(m.get_params(), StakingParams::default());
    }

    #[test]
    fn set_and_read_back_single_param() {
        let mut m = module();
        m.set_param(PARAM_MAX_VALIDATORS, b"4").unwrap();
        let params = m.get_params();
        assert_eq!(params.max_validators, 4);
        // the rest stay at defaults
        assert_eq!(params.stake_minimum, StakingParams::default().stake_minimum);

        let json = m.get_param_json(PARAM_MAX_VALIDATORS).unwrap();
        assert_eq!(json, b"4");
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut m = module();
        assert_eq!(
            m.set_param("bogus", b"1"),
            Err(ParamError::UnknownKey("bogus".to_string()))
        );
        assert!(m.get_param_json("bogus").is_err());
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let mut m = module();
        assert!(matches!(
            m.set_param(PARAM_MAX_VALIDATORS, b"\"ten\""),
            Err(ParamError::InvalidValue(_))
        ));
    }

    #[test]
    fn out_of_range_window_is_rejected() {
        let mut m = module();
        assert_eq!(
            m.set_param(PARAM_SIGNED_BLOCKS_WINDOW, b"0"),
            Err(ParamError::OutOfRange(PARAM_SIGNED_BLOCKS_WINDOW))
        );
    }

    #[test]
    fn over_unity_fraction_is_rejected() {
        let mut m = module();
        assert!(matches!(
            m.set_param(PARAM_MIN_SIGNED_PER_WINDOW, b"10001"),
            Err(ParamError::InvalidValue(_))
        ));
    }
}
