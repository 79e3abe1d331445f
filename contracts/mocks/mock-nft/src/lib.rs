#![no_std]

use soroban_sdk::{contract, contractimpl, contracttype, Address, Env, String};

#[contracttype]
enum DataKey {
    Name,
    Symbol,
    Balance(Address),
}

/// Minimal NFT collection: only the per-holder balance matters to the
/// protocol, so tokens are counted rather than individually tracked.
#[contract]
pub struct MockNft;

#[contractimpl]
impl MockNft {
    pub fn initialize(env: Env, name: String, symbol: String) {
        if env
            .storage()
            .persistent()
            .get::<_, String>(&DataKey::Name)
            .is_some()
        {
            panic!("already initialized");
        }
        env.storage().persistent().set(&DataKey::Name, &name);
        env.storage().persistent().set(&DataKey::Symbol, &symbol);
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

    pub fn mint(env: Env, to: Address) {
        let bal: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::Balance(to.clone()))
            .unwrap_or(0u128);
        env.storage()
            .persistent()
            .set(&DataKey::Balance(to), &(bal + 1));
    }

    pub fn burn(env: Env, from: Address) {
        let bal: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::Balance(from.clone()))
            .unwrap_or(0u128);
        if bal == 0 {
            panic!("insufficient balance");
        }
        env.storage()
            .persistent()
            .set(&DataKey::Balance(from), &(bal - 1));
    }

    pub fn balance_of(env: Env, holder: Address) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::Balance(holder))
            .unwrap_or(0u128)
    }
}
