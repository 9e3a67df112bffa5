use crate::error::StateError;
use crate::io::{get_i64, get_u8, put_i64, put_u8, StateDecode, StateEncode};
use meridian_types::ValidatorSigningInfo;

impl StateEncode for ValidatorSigningInfo {
    fn encode_state(&self, out: &mut Vec<u8>) {
        put_i64(out, self.start_height);
        put_i64(out, self.index_offset);
        put_i64(out, self.missed_blocks_counter);
        put_i64(out, self.jailed_until);
        put_u8(out, self.tombstoned as u8);
    }
}

impl StateDecode for ValidatorSigningInfo {
    fn decode_state(input: &mut &[u8]) -> Result<Self, StateError> {
        let start_height = get_i64(input)?;
        let index_offset = get_i64(input)?;
        let missed_blocks_counter = get_i64(input)?;
        let jailed_until = get_i64(input)?;
        let tombstoned = match get_u8(input)? {
            0 => false,
            1 => true,
            _ => return Err(StateError::InvalidValue("invalid tombstoned flag")),
        };
        Ok(ValidatorSigningInfo {
            start_height,
            index_offset,
            missed_blocks_counter,
            jailed_until,
            tombstoned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_info_round_trip() {
        let info = ValidatorSigningInfo {
            start_height: 42,
            index_offset: 99,
            missed_blocks_counter: 7,
            jailed_until: 1_650_000_000_000_000_000,
            tombstoned: true,
        };
        let bytes = info.to_state_bytes();
        assert_eq!(ValidatorSigningInfo::from_state_bytes(&bytes).unwrap(), info);
    }
}
