//! Equivocation evidence handling: slashing, tombstones, age limits.

use meridian_staking::params::PARAM_MAX_EVIDENCE_AGE;
use meridian_staking::{
    address_from_public_key, BankModule, BlockContext, Event, Evidence, InMemoryBank, InMemoryState,
    RequestBeginBlock, SlashReason, StakingError, StakingModule,
};
use meridian_types::{Address, ConsensusPublicKey, NANOS_PER_SECOND};

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

#[test]
fn double_sign_slashes_and_tombstones() {
    let mut m = new_module();
    // default slash_fraction_double_sign = 5%
    let public_key = [1u8; 32];
    let addr = stake_validator(&mut m, public_key, 100_000_000);
    let supply_before = m.bank().total_supply();

    // infraction at height 40, evidence handled at height 50, age 30s
    let now = 100;
    m.handle_double_sign(&ctx(50, now), &addr, 40, (now - 30) * NANOS_PER_SECOND, 100)
        .unwrap();

    let v = m.get_validator(&addr).unwrap();
    assert_eq!(v.staked_tokens, 95_000_000);
    assert_eq!(m.bank().total_supply(), supply_before - 5_000_000);
    assert!(m.get_signing_info(&addr).unwrap().tombstoned);

    let events = m.take_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Slash { address, power: 100, reason: SlashReason::DoubleSign } if *address == addr
    )));

    // identical evidence later: rejected, no further state change
    let err = m
        .handle_double_sign(&ctx(60, now + 10), &addr, 40, (now - 30) * NANOS_PER_SECOND, 100)
        .unwrap_err();
    assert_eq!(err, StakingError::Tombstoned(addr));
    assert_eq!(m.get_validator(&addr).unwrap().staked_tokens, 95_000_000);
    assert_eq!(m.bank().total_supply(), supply_before - 5_000_000);
}

#[test]
fn evidence_age_boundary() {
    let mut m = new_module();
    m.set_param(
        PARAM_MAX_EVIDENCE_AGE,
        (3_600i64 * NANOS_PER_SECOND).to_string().as_bytes(),
    )
    .unwrap();
    let public_key = [1u8; 32];
    let addr = stake_validator(&mut m, public_key, 100_000_000);

    let now = 10_000;
    // age exactly equal to the maximum is accepted
    m.handle_double_sign(&ctx(50, now), &addr, 40, (now - 3_600) * NANOS_PER_SECOND, 100)
        .unwrap();
    assert!(m.get_signing_info(&addr).unwrap().tombstoned);

    // one nanosecond older is rejected
    let mut m = new_module();
    let addr = stake_validator(&mut m, public_key, 100_000_000);
    let err = m
        .handle_double_sign(
            &ctx(50, now),
            &addr,
            40,
            (now - 3_600) * NANOS_PER_SECOND - 1,
            100,
        )
        .unwrap_err();
    assert!(matches!(err, StakingError::EvidenceTooOld { .. }));
    assert_eq!(m.get_validator(&addr).unwrap().staked_tokens, 100_000_000);
}

#[test]
fn evidence_for_unknown_or_unbonded_validator_is_rejected() {
    let mut m = new_module();
    let unknown = [9u8; 20];
    assert_eq!(
        m.handle_double_sign(&ctx(50, 100), &unknown, 40, 0, 100),
        Err(StakingError::CantHandleEvidence(unknown))
    );

    // an unbonding validator can still be slashed for equivocation
    let public_key = [1u8; 32];
    let addr = stake_validator(&mut m, public_key, 100_000_000);
    m.unstake(&ctx(1, 0), &addr).unwrap();
    m.handle_double_sign(&ctx(50, 100), &addr, 40, 90 * NANOS_PER_SECOND, 100)
        .unwrap();
    assert_eq!(m.get_validator(&addr).unwrap().staked_tokens, 95_000_000);
}

#[test]
fn future_infraction_is_rejected() {
    let mut m = new_module();
    let public_key = [1u8; 32];
    let addr = stake_validator(&mut m, public_key, 100_000_000);
    let err = m
        .handle_double_sign(&ctx(50, 100), &addr, 51, 100 * NANOS_PER_SECOND, 100)
        .unwrap_err();
    assert!(matches!(err, StakingError::FutureInfraction { .. }));
}

#[test]
fn begin_block_tolerates_bad_evidence() {
    let mut m = new_module();
    let public_key = [1u8; 32];
    let addr = stake_validator(&mut m, public_key, 100_000_000);

    let req = RequestBeginBlock {
        last_commit_votes: vec![],
        byzantine_validators: vec![
            // unknown validator: ignored
            Evidence {
                address: [9u8; 20],
                height: 40,
                time: 0,
                power: 10,
            },
            // real evidence: applied
            Evidence {
                address: addr,
                height: 40,
                time: 90 * NANOS_PER_SECOND,
                power: 100,
            },
            // duplicate in the same block: tombstone rejects it
            Evidence {
                address: addr,
                height: 41,
                time: 90 * NANOS_PER_SECOND,
                power: 100,
            },
        ],
    };
    m.begin_block(&ctx(50, 100), &req);

    let v = m.get_validator(&addr).unwrap();
    assert_eq!(v.staked_tokens, 95_000_000);
    assert!(m.get_signing_info(&addr).unwrap().tombstoned);
}

#[test]
fn tombstoned_validator_keeps_maturing() {
    let mut m = new_module();
    let public_key = [1u8; 32];
    let addr = stake_validator(&mut m, public_key, 100_000_000);

    m.handle_double_sign(&ctx(50, 100), &addr, 40, 90 * NANOS_PER_SECOND, 100)
        .unwrap();
    m.unstake(&ctx(51, 100), &addr).unwrap();
    let completion = m.get_validator(&addr).unwrap().unstaking_completion_time;

    m.end_block(&BlockContext {
        height: 52,
        time: completion,
    });
    // bond matured and was returned despite the tombstone
    assert!(m.get_validator(&addr).is_none());
    assert_eq!(m.bank().account_balance(&addr), 95_000_000);
}
