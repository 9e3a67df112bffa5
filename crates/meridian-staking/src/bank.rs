//! Account/bank capability trait and the token pools this module operates.
//!
//! The module never mints. Bonded stake lives in [`STAKED_POOL`]; unbonding
//! stake (and stake parked while a validator waits for an active-set slot)
//! lives in [`UNSTAKING_POOL`]. Slashing burns from the pool that currently
//! custodies the stake, decreasing total supply through the bank's burn
//! primitive.

use meridian_types::Address;
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;

/// Pool holding the bonded stake of validators.
pub const STAKED_POOL: &str = "staked_tokens_pool";
/// Pool holding unbonding (and parked) validator stake.
pub const UNSTAKING_POOL: &str = "staking_unstaking_pool";
/// Pool holding bonded application stake.
pub const APP_STAKED_POOL: &str = "application_staked_pool";
/// Pool holding unbonding application stake.
pub const APP_UNSTAKING_POOL: &str = "application_unstaking_pool";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankError {
    InsufficientFunds { needed: u128, available: u128 },
    UnknownModule(String),
}

impl std::fmt::Display for BankError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BankError::InsufficientFunds { needed, available } => {
                write!(f, "insufficient funds: need {}, have {}", needed, available)
            }
            BankError::UnknownModule(name) => write!(f, "unknown module account {}", name),
        }
    }
}

impl std::error::Error for BankError {}

/// Token custody operations the staking module requires of the bank.
pub trait BankModule {
    fn send_account_to_module(
        &mut self,
        from: &Address,
        to_module: &str,
        amount: u128,
    ) -> Result<(), BankError>;

    fn send_module_to_account(
        &mut self,
        from_module: &str,
        to: &Address,
        amount: u128,
    ) -> Result<(), BankError>;

    fn send_module_to_module(
        &mut self,
        from_module: &str,
        to_module: &str,
        amount: u128,
    ) -> Result<(), BankError>;

    /// Burn from a module pool, decreasing total supply.
    fn burn(&mut self, module: &str, amount: u128) -> Result<(), BankError>;

    fn module_address(&self, module: &str) -> Address;

    fn account_balance(&self, addr: &Address) -> u128;

    fn module_balance(&self, module: &str) -> u128;
}

/// Deterministic module account address: first 20 bytes of the name hash.
pub fn derive_module_address(module: &str) -> Address {
    let mut hasher = Sha3_256::new();
    hasher.update(b"module/");
    hasher.update(module.as_bytes());
    let digest = hasher.finalize();
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[..20]);
    addr
}

// ============================================================================
// In-Memory Bank
// ============================================================================

/// In-memory bank for tests and lightweight hosts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryBank {
    accounts: BTreeMap<Address, u128>,
    modules: BTreeMap<String, u128>,
    total_supply: u128,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint into an account, for fixtures only.
    pub fn fund_account(&mut self, addr: Address, amount: u128) {
        *self.accounts.entry(addr).or_insert(0) += amount;
        self.total_supply += amount;
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    fn module_entry(&mut self, module: &str) -> &mut u128 {
        self.modules.entry(module.to_string()).or_insert(0)
    }
}

impl BankModule for InMemoryBank {
    fn send_account_to_module(
        &mut self,
        from: &Address,
        to_module: &str,
        amount: u128,
    ) -> Result<(), BankError> {
        let balance = self.accounts.entry(*from).or_insert(0);
        if *balance < amount {
            return Err(BankError::InsufficientFunds {
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        *self.module_entry(to_module) += amount;
        Ok(())
    }

    fn send_module_to_account(
        &mut self,
        from_module: &str,
        to: &Address,
        amount: u128,
    ) -> Result<(), BankError> {
        let balance = self.module_entry(from_module);
        if *balance < amount {
            return Err(BankError::InsufficientFunds {
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        *self.accounts.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    fn send_module_to_module(
        &mut self,
        from_module: &str,
        to_module: &str,
        amount: u128,
    ) -> Result<(), BankError> {
        let from = self.module_entry(from_module);
        if *from < amount {
            return Err(BankError::InsufficientFunds {
                needed: amount,
                available: *from,
            });
        }
        *from -= amount;
        *self.module_entry(to_module) += amount;
        Ok(())
    }

    fn burn(&mut self, module: &str, amount: u128) -> Result<(), BankError> {
        let balance = self.module_entry(module);
        if *balance < amount {
            return Err(BankError::InsufficientFunds {
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        self.total_supply -= amount;
        Ok(())
    }

    fn module_address(&self, module: &str) -> Address {
        derive_module_address(module)
    }

    fn account_balance(&self, addr: &Address) -> u128 {
        self.accounts.get(addr).copied().unwrap_or(0)
    }

    fn module_balance(&self, module: &str) -> u128 {
        self.modules.get(module).copied().unwrap_or(0)
    }
}
