use soroban_sdk::{contract, contractimpl, token, Address, Env, Symbol};

use fixed_point_math::EXP_SCALE;

use crate::helpers::*;
use crate::storage::*;

// Per-second borrow rate sanity cap, roughly 15_000% per year.
const MAX_BORROW_RATE_PER_SECOND: u128 = 5_000_000_000_000;

// Repay-all sentinel.
const REPAY_MAX: u128 = u128::MAX;

#[contract]
pub struct LendingMarket;

#[contractimpl]
impl LendingMarket {
    pub fn initialize(
        env: Env,
        underlying: Address,
        risk_engine: Address,
        interest_model: Address,
        initial_exchange_rate: u128,
        reserve_factor: u128,
        admin: Address,
    ) {
        let storage = env.storage().persistent();
        if storage
            .get::<_, bool>(&DataKey::Initialized)
            .unwrap_or(false)
        {
            panic!("already initialized");
        }
        admin.require_auth();
        if initial_exchange_rate == 0 {
            panic!("invalid exchange rate");
        }
        if reserve_factor > EXP_SCALE {
            panic!("invalid reserve factor");
        }
        storage.set(&DataKey::Initialized, &true);
        storage.set(&DataKey::UnderlyingToken, &underlying);
        storage.set(&DataKey::RiskEngine, &risk_engine);
        storage.set(&DataKey::InterestModel, &interest_model);
        storage.set(&DataKey::Admin, &admin);
        storage.set(&DataKey::InitialExchangeRate, &initial_exchange_rate);
        storage.set(&DataKey::ReserveFactor, &reserve_factor);
        storage.set(&DataKey::TotalShares, &0u128);
        storage.set(&DataKey::TotalBorrows, &0u128);
        storage.set(&DataKey::TotalReserves, &0u128);
        storage.set(&DataKey::BorrowIndex, &EXP_SCALE);
        let now = env.ledger().timestamp();
        storage.set(&DataKey::LastAccrualTime, &now);
        bump_core_ttl(&env);
        env.events().publish(
            (Symbol::new(&env, "market_initialized"),),
            (underlying, risk_engine, interest_model, admin),
        );
    }

    /// Roll interest forward to the current ledger timestamp. First effect of
    /// every state-mutating operation.
    pub fn accrue_interest(env: Env) {
        ensure_initialized(&env);
        bump_borrow_state_ttl(&env);
        let last: u64 = env
            .storage()
            .persistent()
            .get(&DataKey::LastAccrualTime)
            .expect("last accrual missing");
        let now = env.ledger().timestamp();
        if now <= last {
            return;
        }
        let elapsed = (now - last) as u128;

        let cash = Self::get_cash(env.clone());
        let borrows: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalBorrows)
            .unwrap_or(0u128);
        let reserves: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalReserves)
            .unwrap_or(0u128);

        let model: Address = env
            .storage()
            .persistent()
            .get(&DataKey::InterestModel)
            .expect("interest model missing");
        let rate: u128 =
            call_contract_or_panic(&env, &model, "get_borrow_rate", (cash, borrows, reserves));
        if rate > MAX_BORROW_RATE_PER_SECOND {
            panic!("interest rate out of bounds");
        }

        let factor = rate.checked_mul(elapsed).expect("math overflow");
        let interest =
            fixed_point_math::mul_scalar_truncate(factor, borrows).expect("math overflow");
        let new_borrows = borrows.checked_add(interest).expect("math overflow");
        let reserve_factor: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::ReserveFactor)
            .unwrap_or(0u128);
        let new_reserves = fixed_point_math::mul_scalar_truncate_add(
            reserve_factor,
            interest,
            reserves,
        )
        .expect("math overflow");
        let index: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::BorrowIndex)
            .expect("borrow index missing");
        let new_index =
            fixed_point_math::mul_scalar_truncate_add(factor, index, index).expect("math overflow");

        env.storage()
            .persistent()
            .set(&DataKey::TotalBorrows, &new_borrows);
        env.storage()
            .persistent()
            .set(&DataKey::TotalReserves, &new_reserves);
        env.storage()
            .persistent()
            .set(&DataKey::BorrowIndex, &new_index);
        env.storage()
            .persistent()
            .set(&DataKey::LastAccrualTime, &now);

        env.events().publish(
            (Symbol::new(&env, "accrue_interest"),),
            (interest, new_index, new_borrows),
        );
    }

    /// Supply underlying, receive shares at the pre-transfer exchange rate.
    pub fn mint(env: Env, user: Address, amount: u128) {
        let underlying = ensure_initialized(&env);
        Self::accrue_interest(env.clone());
        user.require_auth();
        let engine = risk_engine(&env);
        call_contract_or_panic::<(), _>(
            &env,
            &engine,
            "mint_allowed",
            (env.current_contract_address(), user.clone(), amount),
        );

        // Rate before cash moves, otherwise the deposit dilutes itself.
        let rate = Self::get_exchange_rate(env.clone());
        let shares = fixed_point_math::div_to_mantissa(amount, rate).expect("math overflow");
        if shares == 0 {
            panic!("amount below minimum");
        }

        let token_client = token::Client::new(&env, &underlying);
        token_client.transfer(&user, &env.current_contract_address(), &to_i128(amount));

        let bal = share_balance(&env, &user);
        write_share_balance(&env, &user, bal.checked_add(shares).expect("math overflow"));
        let total = total_shares(&env);
        env.storage().persistent().set(
            &DataKey::TotalShares,
            &total.checked_add(shares).expect("math overflow"),
        );

        env.events()
            .publish((Symbol::new(&env, "mint"), user), (amount, shares));
    }

    /// Burn an exact number of shares, receive underlying.
    pub fn redeem(env: Env, user: Address, share_amount: u128) {
        let underlying = ensure_initialized(&env);
        Self::accrue_interest(env.clone());
        user.require_auth();
        let engine = risk_engine(&env);
        call_contract_or_panic::<(), _>(
            &env,
            &engine,
            "redeem_allowed",
            (env.current_contract_address(), user.clone(), share_amount),
        );

        let rate = Self::get_exchange_rate(env.clone());
        let amount =
            fixed_point_math::mul_scalar_truncate(rate, share_amount).expect("math overflow");
        Self::pay_out(&env, &underlying, &user, share_amount, amount);
    }

    /// Withdraw an exact underlying amount, burning the equivalent shares.
    pub fn redeem_underlying(env: Env, user: Address, amount: u128) {
        let underlying = ensure_initialized(&env);
        Self::accrue_interest(env.clone());
        user.require_auth();
        let engine = risk_engine(&env);
        call_contract_or_panic::<(), _>(
            &env,
            &engine,
            "redeem_allowed",
            (env.current_contract_address(), user.clone(), amount),
        );

        let rate = Self::get_exchange_rate(env.clone());
        let share_amount = fixed_point_math::div_to_mantissa(amount, rate).expect("math overflow");
        Self::pay_out(&env, &underlying, &user, share_amount, amount);
    }

    fn pay_out(env: &Env, underlying: &Address, user: &Address, share_amount: u128, amount: u128) {
        let bal = share_balance(env, user);
        if bal < share_amount {
            panic!("insufficient shares");
        }
        if Self::get_cash(env.clone()) < amount {
            panic!("insufficient cash");
        }
        write_share_balance(env, user, bal - share_amount);
        let total = total_shares(env);
        env.storage()
            .persistent()
            .set(&DataKey::TotalShares, &(total - share_amount));

        let token_client = token::Client::new(env, underlying);
        token_client.transfer(&env.current_contract_address(), user, &to_i128(amount));

        env.events().publish(
            (Symbol::new(env, "redeem"), user.clone()),
            (amount, share_amount),
        );
    }

    /// Take out an uncollateralized loan, subject to the risk engine's gates.
    pub fn borrow(env: Env, user: Address, amount: u128) {
        let underlying = ensure_initialized(&env);
        Self::accrue_interest(env.clone());
        user.require_auth();
        let owed = Self::get_user_borrow_balance(env.clone(), user.clone());
        let new_principal = owed.checked_add(amount).expect("math overflow");
        // The engine cannot call back into a market already on the stack, so
        // this market's post-borrow debt travels with the hook.
        let engine = risk_engine(&env);
        call_contract_or_panic::<(), _>(
            &env,
            &engine,
            "borrow_allowed",
            (env.current_contract_address(), user.clone(), new_principal),
        );

        if Self::get_cash(env.clone()) < amount {
            panic!("insufficient cash");
        }

        write_borrow_snapshot(&env, &user, new_principal);
        let borrows: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalBorrows)
            .unwrap_or(0u128);
        env.storage().persistent().set(
            &DataKey::TotalBorrows,
            &borrows.checked_add(amount).expect("math overflow"),
        );

        let token_client = token::Client::new(&env, &underlying);
        token_client.transfer(&env.current_contract_address(), &user, &to_i128(amount));

        env.events().publish(
            (Symbol::new(&env, "borrow"), user),
            (amount, new_principal),
        );
    }

    /// Repay the caller's own debt. `u128::MAX` repays everything owed.
    pub fn repay_borrow(env: Env, user: Address, amount: u128) {
        Self::repay_internal(env, user.clone(), user, amount);
    }

    /// Repay someone else's debt; the payer funds it.
    pub fn repay_on_behalf(env: Env, payer: Address, borrower: Address, amount: u128) {
        Self::repay_internal(env, payer, borrower, amount);
    }

    fn repay_internal(env: Env, payer: Address, borrower: Address, amount: u128) {
        let underlying = ensure_initialized(&env);
        Self::accrue_interest(env.clone());
        payer.require_auth();
        let engine = risk_engine(&env);
        call_contract_or_panic::<(), _>(
            &env,
            &engine,
            "repay_allowed",
            (
                env.current_contract_address(),
                payer.clone(),
                borrower.clone(),
                amount,
            ),
        );

        let owed = Self::get_user_borrow_balance(env.clone(), borrower.clone());
        let effective = if amount == REPAY_MAX {
            owed
        } else {
            amount.min(owed)
        };
        if effective == 0 {
            return;
        }

        let token_client = token::Client::new(&env, &underlying);
        token_client.transfer(&payer, &env.current_contract_address(), &to_i128(effective));

        write_borrow_snapshot(&env, &borrower, owed - effective);
        let borrows: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalBorrows)
            .unwrap_or(0u128);
        env.storage()
            .persistent()
            .set(&DataKey::TotalBorrows, &borrows.saturating_sub(effective));

        env.events().publish(
            (Symbol::new(&env, "repay_borrow"), borrower),
            (payer, effective, owed - effective),
        );
    }

    pub fn set_reserve_factor(env: Env, caller: Address, reserve_factor: u128) {
        ensure_initialized(&env);
        require_admin(&env, &caller);
        Self::accrue_interest(env.clone());
        if reserve_factor > EXP_SCALE {
            panic!("invalid reserve factor");
        }
        env.storage()
            .persistent()
            .set(&DataKey::ReserveFactor, &reserve_factor);
        env.events()
            .publish((Symbol::new(&env, "new_reserve_factor"),), reserve_factor);
    }

    pub fn set_interest_model(env: Env, caller: Address, model: Address) {
        ensure_initialized(&env);
        require_admin(&env, &caller);
        Self::accrue_interest(env.clone());
        // Interface check before committing to the new model.
        let _: u128 =
            call_contract_or_panic(&env, &model, "get_borrow_rate", (0u128, 0u128, 0u128));
        env.storage()
            .persistent()
            .set(&DataKey::InterestModel, &model);
        env.events()
            .publish((Symbol::new(&env, "new_interest_model"),), model);
    }

    pub fn set_risk_engine(env: Env, caller: Address, engine: Address) {
        ensure_initialized(&env);
        require_admin(&env, &caller);
        let ok: bool = call_contract_or_panic(&env, &engine, "is_risk_engine", ());
        if !ok {
            panic!("invalid risk engine");
        }
        env.storage().persistent().set(&DataKey::RiskEngine, &engine);
        env.events()
            .publish((Symbol::new(&env, "new_risk_engine"),), engine);
    }

    /// Move accumulated reserves out to the admin.
    pub fn reduce_reserves(env: Env, caller: Address, amount: u128) {
        let underlying = ensure_initialized(&env);
        require_admin(&env, &caller);
        Self::accrue_interest(env.clone());
        let reserves: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalReserves)
            .unwrap_or(0u128);
        if amount > reserves {
            panic!("insufficient reserves");
        }
        if Self::get_cash(env.clone()) < amount {
            panic!("insufficient cash");
        }
        env.storage()
            .persistent()
            .set(&DataKey::TotalReserves, &(reserves - amount));
        let token_client = token::Client::new(&env, &underlying);
        token_client.transfer(&env.current_contract_address(), &caller, &to_i128(amount));
        env.events().publish(
            (Symbol::new(&env, "reserves_reduced"),),
            (amount, reserves - amount),
        );
    }

    /// Share price in underlying, as a 1e18 mantissa. Uses stored totals, so
    /// callers that need freshness accrue first.
    pub fn get_exchange_rate(env: Env) -> u128 {
        ensure_initialized(&env);
        let total = total_shares(&env);
        if total == 0 {
            return env
                .storage()
                .persistent()
                .get(&DataKey::InitialExchangeRate)
                .unwrap_or(EXP_SCALE);
        }
        let cash = Self::get_cash(env.clone());
        let borrows: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalBorrows)
            .unwrap_or(0u128);
        let reserves: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::TotalReserves)
            .unwrap_or(0u128);
        let pool = cash
            .checked_add(borrows)
            .expect("math overflow")
            .saturating_sub(reserves);
        fixed_point_math::div_to_mantissa(pool, total).expect("math overflow")
    }

    /// Underlying sitting in the contract.
    pub fn get_cash(env: Env) -> u128 {
        let underlying: Address = env
            .storage()
            .persistent()
            .get(&DataKey::UnderlyingToken)
            .expect("market not initialized");
        let bal = token::Client::new(&env, &underlying).balance(&env.current_contract_address());
        if bal < 0 {
            0u128
        } else {
            bal as u128
        }
    }

    /// Debt owed right now: snapshot principal scaled by index drift.
    pub fn get_user_borrow_balance(env: Env, user: Address) -> u128 {
        ensure_initialized(&env);
        bump_borrow_snapshot_ttl(&env, &user);
        let snap: Option<BorrowSnapshot> = env
            .storage()
            .persistent()
            .get(&DataKey::BorrowSnapshots(user));
        let Some(snapshot) = snap else {
            return 0u128;
        };
        if snapshot.principal == 0 {
            return 0u128;
        }
        let index: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::BorrowIndex)
            .expect("borrow index missing");
        snapshot
            .principal
            .checked_mul(index)
            .expect("math overflow")
            / snapshot.interest_index
    }

    pub fn get_share_balance(env: Env, user: Address) -> u128 {
        share_balance(&env, &user)
    }

    pub fn get_total_shares(env: Env) -> u128 {
        total_shares(&env)
    }

    pub fn get_total_borrows(env: Env) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::TotalBorrows)
            .unwrap_or(0u128)
    }

    pub fn get_total_reserves(env: Env) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::TotalReserves)
            .unwrap_or(0u128)
    }

    pub fn get_borrow_index(env: Env) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::BorrowIndex)
            .unwrap_or(EXP_SCALE)
    }

    pub fn get_reserve_factor(env: Env) -> u128 {
        env.storage()
            .persistent()
            .get(&DataKey::ReserveFactor)
            .unwrap_or(0u128)
    }

    pub fn get_underlying_token(env: Env) -> Address {
        ensure_initialized(&env)
    }

    pub fn get_risk_engine(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::RiskEngine)
            .expect("market not initialized")
    }

    pub fn get_interest_model(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::InterestModel)
            .expect("market not initialized")
    }

    pub fn get_admin(env: Env) -> Address {
        env.storage()
            .persistent()
            .get(&DataKey::Admin)
            .expect("market not initialized")
    }
}

fn risk_engine(env: &Env) -> Address {
    env.storage()
        .persistent()
        .get(&DataKey::RiskEngine)
        .expect("market not initialized")
}

fn write_borrow_snapshot(env: &Env, user: &Address, principal: u128) {
    if principal == 0 {
        env.storage()
            .persistent()
            .remove(&DataKey::BorrowSnapshots(user.clone()));
        return;
    }
    let index: u128 = env
        .storage()
        .persistent()
        .get(&DataKey::BorrowIndex)
        .expect("borrow index missing");
    let snap = BorrowSnapshot {
        principal,
        interest_index: index,
    };
    env.storage()
        .persistent()
        .set(&DataKey::BorrowSnapshots(user.clone()), &snap);
    bump_borrow_snapshot_ttl(env, user);
}

fn require_admin(env: &Env, caller: &Address) {
    let admin: Address = env
        .storage()
        .persistent()
        .get(&DataKey::Admin)
        .expect("market not initialized");
    if *caller != admin {
        panic!("not admin");
    }
    caller.require_auth();
}
