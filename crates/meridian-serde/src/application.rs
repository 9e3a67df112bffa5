use crate::error::StateError;
use crate::io::{
    get_array, get_i64, get_str, get_u128, get_u16, put_bytes, put_i64, put_str, put_u128,
    put_u16, StateDecode, StateEncode,
};
use crate::io::len_to_u16;
use meridian_types::{Application, ValidatorStatus};

impl StateEncode for Application {
    fn encode_state(&self, out: &mut Vec<u8>) {
        put_bytes(out, &self.address);
        put_bytes(out, &self.public_key);
        self.status.encode_state(out);
        put_u128(out, self.staked_tokens);
        put_u16(out, len_to_u16(self.chains.len()));
        for chain in &self.chains {
            put_str(out, chain);
        }
        put_i64(out, self.unstaking_completion_time);
    }
}

impl StateDecode for Application {
    fn decode_state(input: &mut &[u8]) -> Result<Self, StateError> {
        let address = get_array::<20>(input)?;
        let public_key = get_array::<32>(input)?;
        let status = ValidatorStatus::decode_state(input)?;
        let staked_tokens = get_u128(input)?;
        let chain_count = get_u16(input)? as usize;
        let mut chains = Vec::with_capacity(chain_count);
        for _ in 0..chain_count {
            chains.push(get_str(input)?);
        }
        let unstaking_completion_time = get_i64(input)?;
        Ok(Application {
            address,
            public_key,
            status,
            staked_tokens,
            chains,
            unstaking_completion_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_round_trip() {
        let mut app = Application::new([3; 20], [4; 32], 9_000_000, vec!["beef".into()]);
        app.status = ValidatorStatus::Unbonding;
        app.unstaking_completion_time = 123_456;
        let bytes = app.to_state_bytes();
        assert_eq!(Application::from_state_bytes(&bytes).unwrap(), app);
    }
}
