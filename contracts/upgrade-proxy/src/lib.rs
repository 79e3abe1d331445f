#![no_std]
use soroban_sdk::{contract, contractimpl, contracttype, vec, Address, Env, IntoVal, Symbol};

const TTL_THRESHOLD: u32 = 100_000_000;
const TTL_EXTEND_TO: u32 = 200_000_000;

#[contracttype]
pub enum DataKey {
    Admin,
    Implementation,
    PendingImplementation,
}

/// Stable address in front of the risk engine. Markets talk to the proxy;
/// the active implementation behind it can be swapped through a two-phase
/// propose/accept handshake.
#[contract]
pub struct UpgradeProxy;

#[contractimpl]
impl UpgradeProxy {
    pub fn initialize(env: Env, admin: Address) {
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
        bump_ttl(&env);
        env.events()
            .publish((Symbol::new(&env, "proxy_initialized"),), admin);
    }

    /// Propose a new implementation. Re-proposal before acceptance simply
    /// replaces the pending reference.
    pub fn set_pending_implementation(env: Env, caller: Address, new_implementation: Address) {
        require_admin(&env, &caller);
        let old: Option<Address> = env
            .storage()
            .persistent()
            .get(&DataKey::PendingImplementation);
        env.storage()
            .persistent()
            .set(&DataKey::PendingImplementation, &new_implementation);
        bump_ttl(&env);
        env.events().publish(
            (Symbol::new(&env, "new_pending_implementation"),),
            (old, new_implementation),
        );
    }

    /// Only the pending implementation itself may complete the transition,
    /// authorizing as its own contract address. The admin cannot force it.
    pub fn accept_implementation(env: Env, caller: Address) {
        caller.require_auth();
        let pending: Option<Address> = env
            .storage()
            .persistent()
            .get(&DataKey::PendingImplementation);
        if pending.as_ref() != Some(&caller) {
            panic!("pending implementation mismatch");
        }
        let old: Option<Address> = env.storage().persistent().get(&DataKey::Implementation);
        env.storage()
            .persistent()
            .set(&DataKey::Implementation, &caller);
        env.storage()
            .persistent()
            .remove(&DataKey::PendingImplementation);
        bump_ttl(&env);
        env.events()
            .publish((Symbol::new(&env, "new_implementation"),), (old, caller));
    }

    pub fn get_admin(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::Admin)
            .expect("not initialized")
    }

    pub fn get_implementation(env: Env) -> Option<Address> {
        env.storage().persistent().get(&DataKey::Implementation)
    }

    pub fn get_pending_implementation(env: Env) -> Option<Address> {
        env.storage()
            .persistent()
            .get(&DataKey::PendingImplementation)
    }

    pub fn is_risk_engine(env: Env) -> bool {
        let target = implementation(&env);
        env.invoke_contract(&target, &Symbol::new(&env, "is_risk_engine"), vec![&env])
    }

    pub fn borrow_allowed(env: Env, market: Address, borrower: Address, amount: u128) {
        let target = implementation(&env);
        env.invoke_contract::<()>(
            &target,
            &Symbol::new(&env, "borrow_allowed"),
            vec![
                &env,
                market.into_val(&env),
                borrower.into_val(&env),
                amount.into_val(&env),
            ],
        );
    }

    pub fn mint_allowed(env: Env, market: Address, minter: Address, amount: u128) {
        let target = implementation(&env);
        env.invoke_contract::<()>(
            &target,
            &Symbol::new(&env, "mint_allowed"),
            vec![
                &env,
                market.into_val(&env),
                minter.into_val(&env),
                amount.into_val(&env),
            ],
        );
    }

    pub fn redeem_allowed(env: Env, market: Address, redeemer: Address, amount: u128) {
        let target = implementation(&env);
        env.invoke_contract::<()>(
            &target,
            &Symbol::new(&env, "redeem_allowed"),
            vec![
                &env,
                market.into_val(&env),
                redeemer.into_val(&env),
                amount.into_val(&env),
            ],
        );
    }

    pub fn repay_allowed(env: Env, market: Address, payer: Address, borrower: Address, amount: u128) {
        let target = implementation(&env);
        env.invoke_contract::<()>(
            &target,
            &Symbol::new(&env, "repay_allowed"),
            vec![
                &env,
                market.into_val(&env),
                payer.into_val(&env),
                borrower.into_val(&env),
                amount.into_val(&env),
            ],
        );
    }
}

fn implementation(env: &Env) -> Address {
    env.storage()
        .persistent()
        .get(&DataKey::Implementation)
        .expect("no implementation set")
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
    if persistent.has(&DataKey::Implementation) {
        persistent.extend_ttl(&DataKey::Implementation, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::PendingImplementation) {
        persistent.extend_ttl(&DataKey::PendingImplementation, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

#[cfg(test)]
mod test;
