#![no_std]

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env, String};

#[contracttype]
enum DataKey {
    Initialized,
    Name,
    Symbol,
    Decimals,
    TotalSupply,
    Balance(Address),
    Allowance(Address, Address), // (owner, spender)
}

/// SEP-41-shaped fungible token with a permissionless mint, for tests.
#[contract]
pub struct MockToken;

#[contractimpl]
impl MockToken {
    pub fn initialize(env: Env, name: String, symbol: String, decimals: u32) {
        if env
            .storage()
            .persistent()
            .get::<_, bool>(&DataKey::Initialized)
            .is_some()
        {
            panic!("already initialized");
        }
        env.storage().persistent().set(&DataKey::Name, &name);
        env.storage().persistent().set(&DataKey::Symbol, &symbol);
        env.storage().persistent().set(&DataKey::Decimals, &decimals);
        env.storage().persistent().set(&DataKey::TotalSupply, &0i128);
        env.storage().persistent().set(&DataKey::Initialized, &true);
    }

    pub fn name(env: Env) -> String {
        env.storage()
            .persistent()
            .get(&DataKey::Name)
            .expect("not initialized")
    }

    pub fn symbol(env: Env) -> String {
        env.storage()
            .persistent()
            .get(&DataKey::Symbol)
            .expect("not initialized")
    }

    pub fn decimals(env: Env) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::Decimals)
            .unwrap_or(7u32)
    }

    pub fn total_supply(env: Env) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::TotalSupply)
            .unwrap_or(0i128)
    }

    pub fn balance(env: Env, who: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::Balance(who))
            .unwrap_or(0i128)
    }

    pub fn balance_of(env: Env, who: Address) -> i128 {
        Self::balance(env, who)
    }

    pub fn allowance(env: Env, owner: Address, spender: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::Allowance(owner, spender))
            .unwrap_or(0i128)
    }

    pub fn approve(env: Env, owner: Address, spender: Address, amount: i128, _live_until: u32) {
        owner.require_auth();
        if amount < 0 {
            panic!("bad amount");
        }
        env.storage()
            .persistent()
            .set(&DataKey::Allowance(owner, spender), &amount);
    }

    pub fn transfer(env: Env, from: Address, to: Address, amount: i128) {
        from.require_auth();
        if amount <= 0 {
            panic!("bad amount");
        }
        move_balance(&env, &from, &to, amount);
    }

    pub fn transfer_from(env: Env, spender: Address, from: Address, to: Address, amount: i128) {
        spender.require_auth();
        if amount <= 0 {
            panic!("bad amount");
        }
        let allowed = Self::allowance(env.clone(), from.clone(), spender.clone());
        if allowed < amount {
            panic!("insufficient allowance");
        }
        env.storage()
            .persistent()
            .set(&DataKey::Allowance(from.clone(), spender), &(allowed - amount));
        move_balance(&env, &from, &to, amount);
    }

    pub fn mint(env: Env, to: Address, amount: i128) {
        if amount <= 0 {
            panic!("bad amount");
        }
        let bal = Self::balance(env.clone(), to.clone());
        env.storage()
            .persistent()
            .set(&DataKey::Balance(to), &(bal + amount));
        let supply = Self::total_supply(env.clone());
        env.storage()
            .persistent()
            .set(&DataKey::TotalSupply, &(supply + amount));
    }

    pub fn burn(env: Env, from: Address, amount: i128) {
        from.require_auth();
        if amount <= 0 {
            panic!("bad amount");
        }
        let bal = Self::balance(env.clone(), from.clone());
        if bal < amount {
            panic!("insufficient balance");
        }
        env.storage()
            .persistent()
            .set(&DataKey::Balance(from), &(bal - amount));
        let supply = Self::total_supply(env.clone());
        env.storage()
            .persistent()
            .set(&DataKey::TotalSupply, &(supply - amount));
    }
}

fn move_balance(env: &Env, from: &Address, to: &Address, amount: i128) {
    let from_bal: i128 = env
        .storage()
        .persistent()
        .get(&DataKey::Balance(from.clone()))
        .unwrap_or(0i128);
    if from_bal < amount {
        panic!("insufficient balance");
    }
    let to_bal: i128 = env
        .storage()
        .persistent()
        .get(&DataKey::Balance(to.clone()))
        .unwrap_or(0i128);
    env.storage()
        .persistent()
        .set(&DataKey::Balance(from.clone()), &(from_bal - amount));
    env.storage()
        .persistent()
        .set(&DataKey::Balance(to.clone()), &(to_bal + amount));
}
