//! Administrative burn queue: deterministic drain order and force-unstake.

use meridian_staking::bank::{STAKED_POOL, UNSTAKING_POOL};
use meridian_staking::{
    address_from_public_key, BankModule, BlockContext, Event, InMemoryBank, InMemoryState, RequestBeginBlock,
    SlashReason, StakingModule,
};
use meridian_types::{Address, ConsensusPublicKey, ValidatorStatus, NANOS_PER_SECOND};

type Module = StakingModule<InMemoryState, InMemoryBank>;

fn new_module() -> Module {
    StakingModule::new(InMemoryState::new(), InMemoryBank::new())
}

fn ctx(height: i64, secs: i64) -> BlockContext {
    BlockContext {
        height,
        time: secs * NANOS_PER_SECOND,
    }
}

fn stake_validator(m: &mut Module, public_key: ConsensusPublicKey, tokens: u128) -> Address {
    let addr = address_from_public_key(&public_key);
    m.bank_mut().fund_account(addr, tokens);
    m.stake(
        &ctx(0, 0),
        public_key,
        tokens,
        vec!["0001".into()],
        "http://v1".into(),
    )
    .unwrap();
    addr
}

/// Two validator keys whose derived addresses are returned low/high by
/// byte-lex order.
fn ordered_pair(m: &mut Module) -> (Address, Address) {
    let a = stake_validator(m, [1u8; 32], 100_000_000);
    let b = stake_validator(m, [2u8; 32], 100_000_000);
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[test]
fn burns_drain_in_address_order() {
    let mut m = new_module();
    let (low, high) = ordered_pair(&mut m);
    m.take_events();

    // queue in the opposite order; the drain must still go low, high
    m.burn_validator(&high, 3_000_000).unwrap();
    m.burn_validator(&low, 7_000_000).unwrap();

    m.begin_block(&ctx(1, 1), &RequestBeginBlock::default());

    let slashes: Vec<Address> = m
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Slash {
                address,
                reason: SlashReason::AdministrativeBurn,
                ..
            } => Some(address),
            _ => None,
        })
        .collect();
    assert_eq!(slashes, vec![low, high]);

    assert_eq!(m.get_validator(&low).unwrap().staked_tokens, 93_000_000);
    assert_eq!(m.get_validator(&high).unwrap().staked_tokens, 97_000_000);
    // queue is empty after the drain
    assert_eq!(m.get_validator_burn(&low), None);
    assert_eq!(m.get_validator_burn(&high), None);
}

#[test]
fn burn_severities_accumulate_before_drain() {
    let mut m = new_module();
    let addr = stake_validator(&mut m, [1u8; 32], 100_000_000);

    m.burn_validator(&addr, 1_000_000).unwrap();
    m.burn_validator(&addr, 2_000_000).unwrap();
    assert_eq!(m.get_validator_burn(&addr), Some(3_000_000));

    m.begin_block(&ctx(1, 1), &RequestBeginBlock::default());
    assert_eq!(m.get_validator(&addr).unwrap().staked_tokens, 97_000_000);
}

#[test]
fn force_unstake_in_drain_precedes_later_entries() {
    let mut m = new_module();
    let (low, high) = ordered_pair(&mut m);
    m.take_events();

    // the low-address validator is burned to below the minimum
    m.burn_validator(&low, 99_500_000).unwrap();
    m.burn_validator(&high, 1_000_000).unwrap();

    m.begin_block(&ctx(1, 1), &RequestBeginBlock::default());

    // low was force-unstaked: every remaining token burned
    let low_record = m.get_validator(&low).unwrap();
    assert_eq!(low_record.status, ValidatorStatus::Unbonded);
    assert_eq!(low_record.staked_tokens, 0);

    // high was slashed normally afterwards
    assert_eq!(m.get_validator(&high).unwrap().staked_tokens, 99_000_000);

    let slashes: Vec<Address> = m
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            Event::Slash {
                address,
                reason: SlashReason::AdministrativeBurn,
                ..
            } => Some(address),
            _ => None,
        })
        .collect();
    assert_eq!(slashes, vec![low, high]);

    // the force-unstaked record disappears at end-block
    m.end_block(&ctx(1, 1));
    assert!(m.get_validator(&low).is_none());
}

#[test]
fn slash_to_zero_force_unstakes_and_removes_from_set() {
    let mut m = new_module();
    // 2 tokens staked, minimum 1 token
    let public_key = [1u8; 32];
    let addr = stake_validator(&mut m, public_key, 2_000_000);
    m.end_block(&ctx(0, 0));
    let supply_before = m.bank().total_supply();

    m.burn_validator(&addr, 2_000_000).unwrap();
    m.begin_block(&ctx(1, 1), &RequestBeginBlock::default());

    let v = m.get_validator(&addr).unwrap();
    assert_eq!(v.status, ValidatorStatus::Unbonded);
    assert_eq!(v.staked_tokens, 0);
    assert_eq!(m.bank().total_supply(), supply_before - 2_000_000);
    assert_eq!(m.bank().module_balance(STAKED_POOL), 0);
    assert_eq!(m.bank().module_balance(UNSTAKING_POOL), 0);

    let updates = m.end_block(&ctx(1, 1));
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].power, 0);
    assert_eq!(updates[0].public_key, public_key);
    assert!(m.get_validator(&addr).is_none());
}

#[test]
fn overslash_clamps_to_remaining_stake() {
    let mut m = new_module();
    let addr = stake_validator(&mut m, [1u8; 32], 2_000_000);
    let supply_before = m.bank().total_supply();

    // severity far above the stake: burn clamps at 2 tokens
    m.burn_validator(&addr, 50_000_000).unwrap();
    m.begin_block(&ctx(1, 1), &RequestBeginBlock::default());

    assert_eq!(m.get_validator(&addr).unwrap().staked_tokens, 0);
    assert_eq!(m.bank().total_supply(), supply_before - 2_000_000);
}

#[test]
fn challenge_burns_convert_through_the_multiplier() {
    let mut m = new_module();
    let addr = stake_validator(&mut m, [1u8; 32], 100_000_000);

    // default multiplier is 1_000 micro-units per challenge
    m.burn_for_challenges(&addr, 500);
    assert_eq!(m.get_validator_burn(&addr), Some(500_000));

    // unknown validators are ignored
    m.burn_for_challenges(&[9u8; 20], 500);
    assert_eq!(m.get_validator_burn(&[9u8; 20]), None);
}
