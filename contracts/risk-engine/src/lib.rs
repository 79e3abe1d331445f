#![no_std]
use fixed_point_math::EXP_SCALE;
use soroban_sdk::{contract, contractimpl, contracttype, Address, Env, IntoVal, Map, Symbol, Vec};

const TTL_THRESHOLD: u32 = 100_000_000;
const TTL_EXTEND_TO: u32 = 200_000_000;

// Defaults: 50% close factor, 1.08x liquidation incentive.
const DEFAULT_CLOSE_FACTOR: u128 = 500_000_000_000_000_000;
const DEFAULT_LIQUIDATION_INCENTIVE: u128 = 1_080_000_000_000_000_000;

#[contracttype]
pub enum DataKey {
    Admin,
    Markets,              // Map<Address, bool>
    MarketList,           // Vec<Address>, listing order
    Oracle,               // Address
    NftWhitelist,         // Address, collection gating borrowers in
    NftBlacklist,         // Address, collection gating borrowers out
    CreditLimit,          // u128, reference-currency value cap per borrower
    CloseFactor,          // u128 mantissa
    LiquidationIncentive, // u128 mantissa
}

/// Policy layer shared by every market: listing registry, NFT borrower
/// gating, and a portfolio-wide credit limit. Markets reach it through the
/// upgrade proxy, never directly.
#[contract]
pub struct RiskEngine;

#[contractimpl]
impl RiskEngine {
    pub fn initialize(
        env: Env,
        admin: Address,
        oracle: Address,
        nft_whitelist: Address,
        nft_blacklist: Address,
        credit_limit: u128,
    ) {
        if env
            .storage()
            .persistent()
            .get::<_, Address>(&DataKey::Admin)
            .is_some()
        {
            panic!("already initialized");
        }
        admin.require_auth();
        env.storage().persistent().set(&DataKey::Admin, &admin);
        env.storage().persistent().set(&DataKey::Oracle, &oracle);
        env.storage()
            .persistent()
            .set(&DataKey::NftWhitelist, &nft_whitelist);
        env.storage()
            .persistent()
            .set(&DataKey::NftBlacklist, &nft_blacklist);
        env.storage()
            .persistent()
            .set(&DataKey::CreditLimit, &credit_limit);
        env.storage()
            .persistent()
            .set(&DataKey::Markets, &Map::<Address, bool>::new(&env));
        env.storage()
            .persistent()
            .set(&DataKey::MarketList, &Vec::<Address>::new(&env));
        env.storage()
            .persistent()
            .set(&DataKey::CloseFactor, &DEFAULT_CLOSE_FACTOR);
        env.storage()
            .persistent()
            .set(&DataKey::LiquidationIncentive, &DEFAULT_LIQUIDATION_INCENTIVE);
        bump_ttl(&env);
        env.events().publish(
            (Symbol::new(&env, "engine_initialized"),),
            (admin, oracle, credit_limit),
        );
    }

    /// Complete the proxy's two-phase upgrade by attesting as ourselves.
    pub fn become_implementation(env: Env, caller: Address, proxy: Address) {
        require_admin(&env, &caller);
        env.invoke_contract::<()>(
            &proxy,
            &Symbol::new(&env, "accept_implementation"),
            (env.current_contract_address(),).into_val(&env),
        );
        env.events()
            .publish((Symbol::new(&env, "became_implementation"),), proxy);
    }

    pub fn support_market(env: Env, caller: Address, market: Address) {
        require_admin(&env, &caller);
        let mut markets: Map<Address, bool> = env
            .storage()
            .persistent()
            .get(&DataKey::Markets)
            .unwrap_or(Map::new(&env));
        if markets.get(market.clone()).unwrap_or(false) {
            panic!("market already listed");
        }
        markets.set(market.clone(), true);
        env.storage().persistent().set(&DataKey::Markets, &markets);
        let mut list: Vec<Address> = env
            .storage()
            .persistent()
            .get(&DataKey::MarketList)
            .unwrap_or(Vec::new(&env));
        list.push_back(market.clone());
        env.storage().persistent().set(&DataKey::MarketList, &list);
        bump_ttl(&env);
        env.events()
            .publish((Symbol::new(&env, "market_listed"),), market);
    }

    pub fn set_price_oracle(env: Env, caller: Address, oracle: Address) {
        require_admin(&env, &caller);
        env.storage().persistent().set(&DataKey::Oracle, &oracle);
        env.events()
            .publish((Symbol::new(&env, "new_price_oracle"),), oracle);
    }

    pub fn set_nft_whitelist(env: Env, caller: Address, collection: Address) {
        require_admin(&env, &caller);
        env.storage()
            .persistent()
            .set(&DataKey::NftWhitelist, &collection);
        env.events()
            .publish((Symbol::new(&env, "new_nft_whitelist"),), collection);
    }

    pub fn set_nft_blacklist(env: Env, caller: Address, collection: Address) {
        require_admin(&env, &caller);
        env.storage()
            .persistent()
            .set(&DataKey::NftBlacklist, &collection);
        env.events()
            .publish((Symbol::new(&env, "new_nft_blacklist"),), collection);
    }

    pub fn set_credit_limit(env: Env, caller: Address, limit: u128) {
        require_admin(&env, &caller);
        env.storage().persistent().set(&DataKey::CreditLimit, &limit);
        env.events()
            .publish((Symbol::new(&env, "new_credit_limit"),), limit);
    }

    pub fn set_close_factor(env: Env, caller: Address, close_factor: u128) {
        require_admin(&env, &caller);
        if close_factor == 0 || close_factor > EXP_SCALE {
            panic!("invalid close factor");
        }
        env.storage()
            .persistent()
            .set(&DataKey::CloseFactor, &close_factor);
        env.events()
            .publish((Symbol::new(&env, "new_close_factor"),), close_factor);
    }

    pub fn set_liquidation_incentive(env: Env, caller: Address, incentive: u128) {
        require_admin(&env, &caller);
        if incentive < EXP_SCALE {
            panic!("invalid incentive");
        }
        env.storage()
            .persistent()
            .set(&DataKey::LiquidationIncentive, &incentive);
        env.events()
            .publish((Symbol::new(&env, "new_liquidation_incentive"),), incentive);
    }

    /// Gate on a new borrow: listing, whitelist membership, blacklist absence,
    /// then the portfolio-wide value cap. `amount` is the borrower's total
    /// debt in the calling market after the requested borrow; the calling
    /// market cannot be re-entered for it, so it reports its own figure and
    /// only the other listed markets are queried.
    pub fn borrow_allowed(env: Env, market: Address, borrower: Address, amount: u128) {
        ensure_listed(&env, &market);
        bump_ttl(&env);

        let whitelist: Address = env
            .storage()
            .persistent()
            .get(&DataKey::NftWhitelist)
            .expect("not initialized");
        if nft_balance(&env, &whitelist, &borrower) == 0 {
            panic!("zero whitelist nft balance");
        }
        let blacklist: Address = env
            .storage()
            .persistent()
            .get(&DataKey::NftBlacklist)
            .expect("not initialized");
        if nft_balance(&env, &blacklist, &borrower) != 0 {
            panic!("non zero blacklist nft balance");
        }

        let total = hypothetical_debt_value(&env, &borrower, &market, amount);
        let limit: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::CreditLimit)
            .unwrap_or(0);
        if total > limit {
            panic!("credit limit exceeded");
        }
    }

    pub fn mint_allowed(env: Env, market: Address, _minter: Address, _amount: u128) {
        ensure_listed(&env, &market);
        ensure_priced(&env, &market);
        bump_ttl(&env);
    }

    pub fn redeem_allowed(env: Env, market: Address, _redeemer: Address, _amount: u128) {
        ensure_listed(&env, &market);
        ensure_priced(&env, &market);
        bump_ttl(&env);
    }

    pub fn repay_allowed(
        env: Env,
        market: Address,
        _payer: Address,
        _borrower: Address,
        _amount: u128,
    ) {
        ensure_listed(&env, &market);
        ensure_priced(&env, &market);
        bump_ttl(&env);
    }

    pub fn is_risk_engine(_env: Env) -> bool {
        true
    }

    pub fn is_listed(env: Env, market: Address) -> bool {
        let markets: Map<Address, bool> = env
            .storage()
            .persistent()
            .get(&DataKey::Markets)
            .unwrap_or(Map::new(&env));
        markets.get(market).unwrap_or(false)
    }

    pub fn get_markets(env: Env) -> Vec<Address> {
        env.storage()
            .persistent()
            .get(&DataKey::MarketList)
            .unwrap_or(Vec::new(&env))
    }

    pub fn get_admin(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::Admin)
            .expect("not initialized")
    }

    pub fn get_oracle(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::Oracle)
            .expect("not initialized")
    }

    pub fn get_nft_whitelist(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::NftWhitelist)
            .expect("not initialized")
    }

    pub fn get_nft_blacklist(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::NftBlacklist)
            .expect("not initialized")
    }

    pub fn get_credit_limit(env: Env) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::CreditLimit)
            .unwrap_or(0)
    }

    pub fn get_close_factor(env: Env) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::CloseFactor)
            .unwrap_or(DEFAULT_CLOSE_FACTOR)
    }

    pub fn get_liquidation_incentive(env: Env) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::LiquidationIncentive)
            .unwrap_or(DEFAULT_LIQUIDATION_INCENTIVE)
    }
}

/// Reference-currency value of the borrower's debt across every listed
/// market. The target market is never invoked (it is on the call stack);
/// its contribution is the caller-supplied `amount`.
fn hypothetical_debt_value(env: &Env, borrower: &Address, market: &Address, amount: u128) -> u128 {
    let oracle: Address = env
        .storage()
        .persistent()
        .get(&DataKey::Oracle)
        .expect("not initialized");
    let list: Vec<Address> = env
        .storage()
        .persistent()
        .get(&DataKey::MarketList)
        .unwrap_or(Vec::new(env));
    let mut total: u128 = 0;
    for m in list.iter() {
        let debt: u128 = if m == *market {
            amount
        } else {
            env.invoke_contract(
                &m,
                &Symbol::new(env, "get_user_borrow_balance"),
                (borrower.clone(),).into_val(env),
            )
        };
        if debt == 0 {
            continue;
        }
        let price: u128 = env.invoke_contract(
            &oracle,
            &Symbol::new(env, "price_of"),
            (m.clone(),).into_val(env),
        );
        if price == 0 {
            panic!("price unavailable");
        }
        let value = fixed_point_math::mul_scalar_truncate(price, debt).expect("math overflow");
        total = total.checked_add(value).expect("math overflow");
    }
    total
}

fn nft_balance(env: &Env, collection: &Address, holder: &Address) -> u128 {
    env.invoke_contract(
        collection,
        &Symbol::new(env, "balance_of"),
        (holder.clone(),).into_val(env),
    )
}

fn ensure_listed(env: &Env, market: &Address) {
    let markets: Map<Address, bool> = env
        .storage()
        .persistent()
        .get(&DataKey::Markets)
        .unwrap_or(Map::new(env));
    if !markets.get(market.clone()).unwrap_or(false) {
        panic!("market not listed");
    }
}

fn ensure_priced(env: &Env, market: &Address) {
    let oracle: Address = env
        .storage()
        .persistent()
        .get(&DataKey::Oracle)
        .expect("not initialized");
    let price: u128 = env.invoke_contract(
        &oracle,
        &Symbol::new(env, "price_of"),
        (market.clone(),).into_val(env),
    );
    if price == 0 {
        panic!("price unavailable");
    }
}

fn require_admin(env: &Env, caller: &Address) {
    let admin: Address = env
        .storage()
        .persistent()
        .get(&DataKey::Admin)
        .expect("not initialized");
    if *caller != admin {
        panic!("not admin");
    }
    caller.require_auth();
}

fn bump_ttl(env: &Env) {
    let persistent = env.storage().persistent();
    if persistent.has(&DataKey::Admin) {
        persistent.extend_ttl(&DataKey::Admin, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::Markets) {
        persistent.extend_ttl(&DataKey::Markets, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::MarketList) {
        persistent.extend_ttl(&DataKey::MarketList, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::Oracle) {
        persistent.extend_ttl(&DataKey::Oracle, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::CreditLimit) {
        persistent.extend_ttl(&DataKey::CreditLimit, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

#[cfg(test)]
mod test;
