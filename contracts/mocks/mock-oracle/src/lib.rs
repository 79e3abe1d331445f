#![no_std]

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env};

#[contracttype]
enum DataKey {
    Price(Address), // reference-currency mantissa per unit of the market's underlying
}

/// Settable price oracle: one reference-currency quote per market.
#[contract]
pub struct MockOracle;

#[contractimpl]
impl MockOracle {
    pub fn is_price_oracle(_env: Env) -> bool {
        true
    }

    pub fn set_price(env: Env, market: Address, price: u128) {
        env.storage()
            .persistent()
            .set(&DataKey::Price(market), &price);
    }

    /// Quote for a market; 0 when no price has been posted.
    pub fn price_of(env: Env, market: Address) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::Price(market))
            .unwrap_or(0u128)
    }
}
