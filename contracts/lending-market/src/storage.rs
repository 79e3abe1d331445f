use soroban_sdk::{contracttype, Address, Env};

#[contracttype]
pub enum DataKey {
    UnderlyingToken,          // Address
    RiskEngine,               // Address, the upgrade proxy
    InterestModel,            // Address
    Admin,                    // Address
    TotalShares,              // u128
    Shares(Address),          // u128 per holder
    TotalBorrows,             // u128
    TotalReserves,            // u128
    ReserveFactor,            // u128 mantissa (1e18)
    BorrowIndex,              // u128 mantissa, starts at 1e18
    BorrowSnapshots(Address), // BorrowSnapshot per borrower
    InitialExchangeRate,      // u128 mantissa
    LastAccrualTime,          // u64
    Initialized,              // bool
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BorrowSnapshot {
    pub principal: u128,
    pub interest_index: u128,
}

const TTL_THRESHOLD: u32 = 100_000;
const TTL_EXTEND_TO: u32 = 200_000;

pub fn ensure_initialized(env: &Env) -> Address {
    bump_core_ttl(env);
    env.storage()
        .persistent()
        .get(&DataKey::UnderlyingToken)
        .expect("market not initialized")
}

pub fn bump_core_ttl(env: &Env) {
    let persistent = env.storage().persistent();
    if persistent.has(&DataKey::Admin) {
        persistent.extend_ttl(&DataKey::Admin, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::UnderlyingToken) {
        persistent.extend_ttl(&DataKey::UnderlyingToken, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::Initialized) {
        persistent.extend_ttl(&DataKey::Initialized, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

pub fn bump_borrow_state_ttl(env: &Env) {
    let persistent = env.storage().persistent();
    if persistent.has(&DataKey::TotalBorrows) {
        persistent.extend_ttl(&DataKey::TotalBorrows, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::TotalReserves) {
        persistent.extend_ttl(&DataKey::TotalReserves, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::BorrowIndex) {
        persistent.extend_ttl(&DataKey::BorrowIndex, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::LastAccrualTime) {
        persistent.extend_ttl(&DataKey::LastAccrualTime, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::TotalShares) {
        persistent.extend_ttl(&DataKey::TotalShares, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

pub fn bump_borrow_snapshot_ttl(env: &Env, user: &Address) {
    let persistent = env.storage().persistent();
    let key = DataKey::BorrowSnapshots(user.clone());
    if persistent.has(&key) {
        persistent.extend_ttl(&key, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

pub fn share_balance(env: &Env, holder: &Address) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::Shares(holder.clone()))
        .unwrap_or(0u128)
}

pub fn write_share_balance(env: &Env, holder: &Address, amount: u128) {
    if amount == 0 {
        env.storage()
            .persistent()
            .remove(&DataKey::Shares(holder.clone()));
    } else {
        env.storage()
            .persistent()
            .set(&DataKey::Shares(holder.clone()), &amount);
    }
}

pub fn total_shares(env: &Env) -> u128 {
    env.storage()
        .persistent()
        .get(&DataKey::TotalShares)
        .unwrap_or(0u128)
}

pub fn to_i128(amount: u128) -> i128 {
    if amount > i128::MAX as u128 {
        panic!("amount exceeds i128");
    }
    amount as i128
}
