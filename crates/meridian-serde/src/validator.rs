use crate::error::StateError;
use crate::io::{
    get_array, get_str, get_u128, get_u16, get_u8, put_bytes, put_i64, put_str, put_u128, put_u16,
    put_u8, StateDecode, StateEncode,
};
use crate::io::{get_i64, len_to_u16};
use meridian_types::{Validator, ValidatorStatus};

impl StateEncode for ValidatorStatus {
    fn encode_state(&self, out: &mut Vec<u8>) {
        put_u8(out, *self as u8);
    }
}

impl StateDecode for ValidatorStatus {
    fn decode_state(input: &mut &[u8]) -> Result<Self, StateError> {
        match get_u8(input)? {
            0 => Ok(ValidatorStatus::Unbonded),
            1 => Ok(ValidatorStatus::Unbonding),
            2 => Ok(ValidatorStatus::Bonded),
            _ => Err(StateError::InvalidValue("invalid ValidatorStatus")),
        }
    }
}

impl StateEncode for Validator {
    fn encode_state(&self, out: &mut Vec<u8>) {
        put_bytes(out, &self.address);
        put_bytes(out, &self.public_key);
        put_u8(out, self.jailed as u8);
        self.status.encode_state(out);
        put_u128(out, self.staked_tokens);
        put_u16(out, len_to_u16(self.chains.len()));
        for chain in &self.chains {
            put_str(out, chain);
        }
        put_str(out, &self.service_url);
        put_i64(out, self.unstaking_completion_time);
    }
}

impl StateDecode for Validator {
    fn decode_state(input: &mut &[u8]) -> Result<Self, StateError> {
        let address = get_array::<20>(input)?;
        let public_key = get_array::<32>(input)?;
        let jailed = match get_u8(input)? {
            0 => false,
            1 => true,
            _ => return Err(StateError::InvalidValue("invalid jailed flag")),
        };
        let status = ValidatorStatus::decode_state(input)?;
        let staked_tokens = get_u128(input)?;
        let chain_count = get_u16(input)? as usize;
        let mut chains = Vec::with_capacity(chain_count);
        for _ in 0..chain_count {
            chains.push(get_str(input)?);
        }
        let service_url = get_str(input)?;
        let unstaking_completion_time = get_i64(input)?;

        Ok(Validator {
            address,
            public_key,
            jailed,
            status,
            staked_tokens,
            chains,
            service_url,
            unstaking_completion_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_round_trip() {
        let v = Validator {
            address: [0x11; 20],
            public_key: [0x22; 32],
            jailed: true,
            status: ValidatorStatus::Unbonding,
            staked_tokens: 123_456_789_000,
            chains: vec!["0001".into(), "00af".into()],
            service_url: "https://relay.example.org:8081".into(),
            unstaking_completion_time: 1_700_000_000_000_000_000,
        };
        let bytes = v.to_state_bytes();
        let decoded = Validator::from_state_bytes(&bytes).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn trailing_bytes_rejected() {
        let v = Validator::new([1; 20], [2; 32], 5, vec!["0001".into()], "u".into());
        let mut bytes = v.to_state_bytes();
        bytes.push(0);
        assert_eq!(
            Validator::from_state_bytes(&bytes),
            Err(StateError::TrailingBytes)
        );
    }

    #[test]
    fn bad_status_byte_rejected() {
        let v = Validator::new([1; 20], [2; 32], 5, vec!["0001".into()], "u".into());
        let mut bytes = v.to_state_bytes();
        // status byte sits after address, pubkey and jailed flag
        bytes[20 + 32 + 1] = 9;
        assert!(matches!(
            Validator::from_state_bytes(&bytes),
            Err(StateError::InvalidValue(_))
        ));
    }
}
