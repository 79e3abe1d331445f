#![cfg(test)]

use super::*;
use mock_nft::{MockNft, MockNftClient};
use mock_oracle::{MockOracle, MockOracleClient};
use soroban_sdk::{contract, contractimpl, testutils::Address as _, Env, String};

const PRICE_2E18: u128 = 2_000_000_000_000_000_000;

// Stand-in market: just enough surface for the debt aggregation walk.
#[contract]
pub struct StubMarket;

#[contractimpl]
impl StubMarket {
    pub fn set_debt(env: Env, user: Address, amount: u128) {
        env.storage().persistent().set(&user, &amount);
    }

    pub fn get_user_borrow_balance(env: Env, user: Address) -> u128 {
        env.storage().persistent().get(&user).unwrap_or(0u128)
    }
}

struct Setup<'a> {
    admin: Address,
    engine: RiskEngineClient<'a>,
    oracle: MockOracleClient<'a>,
    whitelist: MockNftClient<'a>,
    blacklist: MockNftClient<'a>,
    market_a: Address,
    market_b: Address,
}

fn setup(env: &Env, credit_limit: u128) -> Setup<'_> {
    env.mock_all_auths();
    let admin = Address::generate(env);

    let oracle_id = env.register(MockOracle, ());
    let oracle = MockOracleClient::new(env, &oracle_id);

    let whitelist_id = env.register(MockNft, ());
    let whitelist = MockNftClient::new(env, &whitelist_id);
    whitelist.initialize(
        &String::from_str(env, "Member Pass"),
        &String::from_str(env, "PASS"),
    );

    let blacklist_id = env.register(MockNft, ());
    let blacklist = MockNftClient::new(env, &blacklist_id);
    blacklist.initialize(
        &String::from_str(env, "Ban Mark"),
        &String::from_str(env, "BAN"),
    );

    let engine_id = env.register(RiskEngine, ());
    let engine = RiskEngineClient::new(env, &engine_id);
    engine.initialize(&admin, &oracle_id, &whitelist_id, &blacklist_id, &credit_limit);

    let market_a = env.register(StubMarket, ());
    let market_b = env.register(StubMarket, ());
    engine.support_market(&admin, &market_a);
    engine.support_market(&admin, &market_b);
    oracle.set_price(&market_a, &PRICE_2E18);
    oracle.set_price(&market_b, &PRICE_2E18);

    Setup {
        admin,
        engine,
        oracle,
        whitelist,
        blacklist,
        market_a,
        market_b,
    }
}

fn eligible_borrower(env: &Env, s: &Setup) -> Address {
    let borrower = Address::generate(env);
    s.whitelist.mint(&borrower);
    borrower
}

#[test]
fn initialize_sets_defaults() {
    let env = Env::default();
    let s = setup(&env, 1_000_000);
    assert_eq!(s.engine.get_admin(), s.admin);
    assert_eq!(s.engine.get_credit_limit(), 1_000_000);
    assert_eq!(s.engine.get_close_factor(), EXP_SCALE / 2);
    assert_eq!(s.engine.get_liquidation_incentive(), EXP_SCALE * 108 / 100);
    assert!(s.engine.is_risk_engine());
    assert!(s.engine.is_listed(&s.market_a));
    assert_eq!(s.engine.get_markets().len(), 2);
}

#[test]
#[should_panic(expected = "already initialized")]
fn reinitialize_rejected() {
    let env = Env::default();
    let s = setup(&env, 0);
    s.engine.initialize(
        &s.admin,
        &Address::generate(&env),
        &Address::generate(&env),
        &Address::generate(&env),
        &0u128,
    );
}

#[test]
#[should_panic(expected = "not admin")]
fn non_admin_cannot_configure() {
    let env = Env::default();
    let s = setup(&env, 0);
    let intruder = Address::generate(&env);
    s.engine.set_credit_limit(&intruder, &5u128);
}

#[test]
#[should_panic(expected = "market already listed")]
fn double_listing_rejected() {
    let env = Env::default();
    let s = setup(&env, 0);
    s.engine.support_market(&s.admin, &s.market_a);
}

#[test]
#[should_panic(expected = "invalid close factor")]
fn zero_close_factor_rejected() {
    let env = Env::default();
    let s = setup(&env, 0);
    s.engine.set_close_factor(&s.admin, &0u128);
}

#[test]
#[should_panic(expected = "invalid close factor")]
fn close_factor_above_one_rejected() {
    let env = Env::default();
    let s = setup(&env, 0);
    s.engine.set_close_factor(&s.admin, &(EXP_SCALE + 1));
}

#[test]
#[should_panic(expected = "invalid incentive")]
fn incentive_below_one_rejected() {
    let env = Env::default();
    let s = setup(&env, 0);
    s.engine.set_liquidation_incentive(&s.admin, &(EXP_SCALE - 1));
}

#[test]
#[should_panic(expected = "market not listed")]
fn mint_gate_requires_listing() {
    let env = Env::default();
    let s = setup(&env, 0);
    s.engine
        .mint_allowed(&Address::generate(&env), &Address::generate(&env), &1u128);
}

#[test]
#[should_panic(expected = "price unavailable")]
fn mint_gate_requires_price() {
    let env = Env::default();
    let s = setup(&env, 0);
    s.oracle.set_price(&s.market_a, &0u128);
    s.engine
        .mint_allowed(&s.market_a, &Address::generate(&env), &1u128);
}

#[test]
#[should_panic(expected = "zero whitelist nft balance")]
fn borrow_requires_whitelist_nft() {
    let env = Env::default();
    let s = setup(&env, 1_000_000);
    s.engine
        .borrow_allowed(&s.market_a, &Address::generate(&env), &1u128);
}

#[test]
#[should_panic(expected = "non zero blacklist nft balance")]
fn blacklist_nft_blocks_borrow() {
    let env = Env::default();
    let s = setup(&env, 1_000_000);
    let borrower = eligible_borrower(&env, &s);
    s.blacklist.mint(&borrower);
    s.engine.borrow_allowed(&s.market_a, &borrower, &1u128);
}

#[test]
fn borrow_within_limit_passes() {
    let env = Env::default();
    // price 2e18, so 100 units of debt is worth 200
    let s = setup(&env, 200);
    let borrower = eligible_borrower(&env, &s);
    s.engine.borrow_allowed(&s.market_a, &borrower, &99u128);
}

#[test]
fn borrow_at_exact_limit_passes() {
    let env = Env::default();
    let s = setup(&env, 200);
    let borrower = eligible_borrower(&env, &s);
    s.engine.borrow_allowed(&s.market_a, &borrower, &100u128);
}

#[test]
#[should_panic(expected = "credit limit exceeded")]
fn borrow_over_limit_rejected() {
    let env = Env::default();
    let s = setup(&env, 200);
    let borrower = eligible_borrower(&env, &s);
    s.engine.borrow_allowed(&s.market_a, &borrower, &101u128);
}

#[test]
#[should_panic(expected = "credit limit exceeded")]
fn limit_aggregates_across_markets() {
    let env = Env::default();
    let s = setup(&env, 200);
    let borrower = eligible_borrower(&env, &s);
    // 60 units already owed elsewhere leaves room for only 40 more
    StubMarketClient::new(&env, &s.market_b).set_debt(&borrower, &60u128);
    s.engine.borrow_allowed(&s.market_a, &borrower, &41u128);
}

#[test]
fn existing_debt_counts_against_headroom() {
    let env = Env::default();
    let s = setup(&env, 200);
    let borrower = eligible_borrower(&env, &s);
    StubMarketClient::new(&env, &s.market_b).set_debt(&borrower, &60u128);
    s.engine.borrow_allowed(&s.market_a, &borrower, &40u128);
}

#[test]
#[should_panic(expected = "price unavailable")]
fn unpriced_debt_blocks_borrow() {
    let env = Env::default();
    let s = setup(&env, 1_000_000);
    let borrower = eligible_borrower(&env, &s);
    s.oracle.set_price(&s.market_b, &0u128);
    StubMarketClient::new(&env, &s.market_b).set_debt(&borrower, &1u128);
    s.engine.borrow_allowed(&s.market_a, &borrower, &1u128);
}

#[test]
fn repay_gate_ignores_nft_standing() {
    let env = Env::default();
    let s = setup(&env, 0);
    // no whitelist token, blacklisted, zero limit: repaying is still allowed
    let borrower = Address::generate(&env);
    s.blacklist.mint(&borrower);
    s.engine
        .repay_allowed(&s.market_a, &borrower, &borrower, &1_000u128);
}

#[test]
fn setters_update_configuration() {
    let env = Env::default();
    let s = setup(&env, 0);
    let new_oracle = Address::generate(&env);
    s.engine.set_price_oracle(&s.admin, &new_oracle);
    assert_eq!(s.engine.get_oracle(), new_oracle);

    let wl = Address::generate(&env);
    s.engine.set_nft_whitelist(&s.admin, &wl);
    assert_eq!(s.engine.get_nft_whitelist(), wl);

    let bl = Address::generate(&env);
    s.engine.set_nft_blacklist(&s.admin, &bl);
    assert_eq!(s.engine.get_nft_blacklist(), bl);

    s.engine.set_credit_limit(&s.admin, &42u128);
    assert_eq!(s.engine.get_credit_limit(), 42);

    s.engine.set_close_factor(&s.admin, &(EXP_SCALE / 4));
    assert_eq!(s.engine.get_close_factor(), EXP_SCALE / 4);

    s.engine
        .set_liquidation_incentive(&s.admin, &(EXP_SCALE * 12 / 10));
    assert_eq!(s.engine.get_liquidation_incentive(), EXP_SCALE * 12 / 10);
}
