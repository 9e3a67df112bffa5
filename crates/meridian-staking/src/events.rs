//! Events emitted toward the consensus engine and indexers.
//!
//! Attribute values are rendered as strings; addresses are lowercase hex.

use meridian_types::{Address, UnixNanos};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlashReason {
    DoubleSign,
    MissingSignature,
    /// Queued governance/internal burn applied at begin-block.
    AdministrativeBurn,
}

impl SlashReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlashReason::DoubleSign => "double_sign",
            SlashReason::MissingSignature => "missing_signature",
            SlashReason::AdministrativeBurn => "administrative_burn",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Stake {
        address: Address,
        amount: u128,
    },
    Unstake {
        address: Address,
        completion_time: UnixNanos,
    },
    Slash {
        address: Address,
        power: i64,
        reason: SlashReason,
    },
    Liveness {
        address: Address,
        missed_blocks: i64,
        height: i64,
    },
    Jail {
        address: Address,
    },
    Unjail {
        address: Address,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Stake { .. } => "stake",
            Event::Unstake { .. } => "unstake",
            Event::Slash { .. } => "slash",
            Event::Liveness { .. } => "liveness",
            Event::Jail { .. } => "jail",
            Event::Unjail { .. } => "unjail",
        }
    }

    /// String attribute pairs for the RPC/event-indexing surface.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        match self {
            Event::Stake { address, amount } => vec![
                ("address", hex::encode(address)),
                ("amount", amount.to_string()),
            ],
            Event::Unstake {
                address,
                completion_time,
            } => vec![
                ("address", hex::encode(address)),
                ("completion_time", completion_time.to_string()),
            ],
            Event::Slash {
                address,
                power,
                reason,
            } => vec![
                ("address", hex::encode(address)),
                ("power", power.to_string()),
                ("reason", reason.as_str().to_string()),
            ],
            Event::Liveness {
                address,
                missed_blocks,
                height,
            } => vec![
                ("address", hex::encode(address)),
                ("missed_blocks", missed_blocks.to_string()),
                ("height", height.to_string()),
            ],
            Event::Jail { address } | Event::Unjail { address } => {
                vec![("address", hex::encode(address))]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_event_attributes() {
        let ev = Event::Slash {
            address: [0xAB; 20],
            power: 100,
            reason: SlashReason::DoubleSign,
        };
        assert_eq!(ev.kind(), "slash");
        let attrs = ev.attributes();
        assert_eq!(attrs[0].0, "address");
        assert_eq!(attrs[1], ("power", "100".to_string()));
        assert_eq!(attrs[2], ("reason", "double_sign".to_string()));
    }
}
