#![cfg(test)]

use super::*;
use mock_oracle::{MockOracle, MockOracleClient};
use risk_engine::{RiskEngine, RiskEngineClient};
use soroban_sdk::{testutils::Address as _, Env};

const PRICE_2E18: u128 = 2_000_000_000_000_000_000;

struct Setup<'a> {
    admin: Address,
    proxy_id: Address,
    proxy: UpgradeProxyClient<'a>,
    engine_id: Address,
    engine: RiskEngineClient<'a>,
    oracle: MockOracleClient<'a>,
}

fn setup(env: &Env) -> Setup<'_> {
    env.mock_all_auths();
    let admin = Address::generate(env);
    let proxy_id = env.register(UpgradeProxy, ());
    let proxy = UpgradeProxyClient::new(env, &proxy_id);
    proxy.initialize(&admin);

    let oracle_id = env.register(MockOracle, ());
    let oracle = MockOracleClient::new(env, &oracle_id);

    let engine_id = env.register(RiskEngine, ());
    let engine = RiskEngineClient::new(env, &engine_id);
    engine.initialize(
        &admin,
        &oracle_id,
        &Address::generate(env),
        &Address::generate(env),
        &1_000_000u128,
    );

    Setup {
        admin,
        proxy_id,
        proxy,
        engine_id,
        engine,
        oracle,
    }
}

#[test]
fn two_phase_handshake_activates_implementation() {
    let env = Env::default();
    let s = setup(&env);

    s.proxy.set_pending_implementation(&s.admin, &s.engine_id);
    assert_eq!(s.proxy.get_pending_implementation(), Some(s.engine_id.clone()));
    assert_eq!(s.proxy.get_implementation(), None);

    s.engine.become_implementation(&s.admin, &s.proxy_id);
    assert_eq!(s.proxy.get_implementation(), Some(s.engine_id.clone()));
    assert_eq!(s.proxy.get_pending_implementation(), None);
}

#[test]
fn reproposal_replaces_pending() {
    let env = Env::default();
    let s = setup(&env);

    let stand_in = Address::generate(&env);
    s.proxy.set_pending_implementation(&s.admin, &stand_in);
    s.proxy.set_pending_implementation(&s.admin, &s.engine_id);
    assert_eq!(s.proxy.get_pending_implementation(), Some(s.engine_id.clone()));

    s.engine.become_implementation(&s.admin, &s.proxy_id);
    assert_eq!(s.proxy.get_implementation(), Some(s.engine_id.clone()));
}

#[test]
#[should_panic(expected = "not admin")]
fn non_admin_cannot_propose() {
    let env = Env::default();
    let s = setup(&env);
    let intruder = Address::generate(&env);
    s.proxy.set_pending_implementation(&intruder, &s.engine_id);
}

#[test]
#[should_panic(expected = "pending implementation mismatch")]
fn only_pending_contract_can_accept() {
    let env = Env::default();
    let s = setup(&env);

    let other_id = env.register(RiskEngine, ());
    let other = RiskEngineClient::new(&env, &other_id);
    other.initialize(
        &s.admin,
        &Address::generate(&env),
        &Address::generate(&env),
        &Address::generate(&env),
        &0u128,
    );

    s.proxy.set_pending_implementation(&s.admin, &s.engine_id);
    other.become_implementation(&s.admin, &s.proxy_id);
}

#[test]
#[should_panic(expected = "pending implementation mismatch")]
fn admin_cannot_force_acceptance() {
    let env = Env::default();
    let s = setup(&env);
    s.proxy.set_pending_implementation(&s.admin, &s.engine_id);
    s.proxy.accept_implementation(&s.admin);
}

#[test]
fn forwards_hooks_to_active_implementation() {
    let env = Env::default();
    let s = setup(&env);

    s.proxy.set_pending_implementation(&s.admin, &s.engine_id);
    s.engine.become_implementation(&s.admin, &s.proxy_id);

    let market = Address::generate(&env);
    s.engine.support_market(&s.admin, &market);
    s.oracle.set_price(&market, &PRICE_2E18);

    let user = Address::generate(&env);
    s.proxy.mint_allowed(&market, &user, &1_000u128);
    s.proxy.redeem_allowed(&market, &user, &1_000u128);
    s.proxy.repay_allowed(&market, &user, &user, &1_000u128);
    assert!(s.proxy.is_risk_engine());
}

#[test]
#[should_panic(expected = "market not listed")]
fn forwarding_surfaces_implementation_failures() {
    let env = Env::default();
    let s = setup(&env);

    s.proxy.set_pending_implementation(&s.admin, &s.engine_id);
    s.engine.become_implementation(&s.admin, &s.proxy_id);

    let unlisted = Address::generate(&env);
    s.proxy.mint_allowed(&unlisted, &Address::generate(&env), &1u128);
}

#[test]
#[should_panic(expected = "no implementation set")]
fn hooks_require_an_active_implementation() {
    let env = Env::default();
    let s = setup(&env);
    s.proxy
        .mint_allowed(&Address::generate(&env), &Address::generate(&env), &1u128);
}
