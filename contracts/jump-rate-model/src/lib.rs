#![no_std]
use fixed_point_math::EXP_SCALE;
use soroban_sdk::{contract, contractimpl, contracttype, Address, Env, Symbol};

const SECONDS_PER_YEAR: u128 = 31_536_000;
const TTL_THRESHOLD: u32 = 100_000_000;
const TTL_EXTEND_TO: u32 = 200_000_000;

#[contracttype]
pub enum DataKey {
    BaseRatePerYear,       // u128 mantissa (1e18)
    MultiplierPerYear,     // u128 mantissa, slope below the kink
    JumpMultiplierPerYear, // u128 mantissa, slope above the kink
    Kink,                  // u128 mantissa, utilization where the slope changes
    Admin,                 // Address
}

#[contract]
pub struct JumpRateModel;

#[contractimpl]
impl JumpRateModel {
    pub fn initialize(
        env: Env,
        base_rate_per_year: u128,
        multiplier_per_year: u128,
        jump_multiplier_per_year: u128,
        kink: u128,
        admin: Address,
    ) {
        if env
            .storage()
            .persistent()
            .get::<_, Address>(&DataKey::Admin)
            .is_some()
        {
            panic!("already initialized");
        }
        if kink > EXP_SCALE {
            panic!("invalid kink");
        }
        admin.require_auth();
        env.storage().persistent().set(&DataKey::Admin, &admin);
        env.storage()
            .persistent()
            .set(&DataKey::BaseRatePerYear, &base_rate_per_year);
        env.storage()
            .persistent()
            .set(&DataKey::MultiplierPerYear, &multiplier_per_year);
        env.storage()
            .persistent()
            .set(&DataKey::JumpMultiplierPerYear, &jump_multiplier_per_year);
        env.storage().persistent().set(&DataKey::Kink, &kink);
        bump_ttl(&env);
        env.events().publish(
            (Symbol::new(&env, "model_initialized"),),
            (
                base_rate_per_year,
                multiplier_per_year,
                jump_multiplier_per_year,
                kink,
            ),
        );
    }

    /// Pool utilization as a mantissa: borrows / (cash + borrows - reserves).
    pub fn get_utilization(_env: Env, cash: u128, borrows: u128, reserves: u128) -> u128 {
        utilization(cash, borrows, reserves)
    }

    /// Borrow rate per second (mantissa) at the pool's current utilization.
    pub fn get_borrow_rate(env: Env, cash: u128, borrows: u128, reserves: u128) -> u128 {
        ensure_initialized(&env);
        bump_ttl(&env);
        let util = utilization(cash, borrows, reserves);
        let base: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::BaseRatePerYear)
            .unwrap_or(0);
        let mult: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::MultiplierPerYear)
            .unwrap_or(0);
        let jump: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::JumpMultiplierPerYear)
            .unwrap_or(0);
        let kink: u128 = env
            .storage()
            .persistent()
            .get(&DataKey::Kink)
            .unwrap_or(EXP_SCALE * 8 / 10);
        let yearly = if util <= kink {
            fixed_point_math::mul_scalar_truncate_add(mult, util, base).expect("math overflow")
        } else {
            let normal =
                fixed_point_math::mul_scalar_truncate_add(mult, kink, base).expect("math overflow");
            let excess = util - kink;
            fixed_point_math::mul_scalar_truncate_add(jump, excess, normal).expect("math overflow")
        };
        yearly / SECONDS_PER_YEAR
    }

    /// Supply rate per second (mantissa): utilization * borrow_rate * (1 - reserve_factor).
    pub fn get_supply_rate(
        env: Env,
        cash: u128,
        borrows: u128,
        reserves: u128,
        reserve_factor: u128,
    ) -> u128 {
        ensure_initialized(&env);
        bump_ttl(&env);
        let one_minus_rf = EXP_SCALE.saturating_sub(reserve_factor);
        let borrow_rate = Self::get_borrow_rate(env.clone(), cash, borrows, reserves);
        let rate_to_pool =
            fixed_point_math::mul_mantissa(borrow_rate, one_minus_rf).expect("math overflow");
        let util = utilization(cash, borrows, reserves);
        fixed_point_math::mul_mantissa(util, rate_to_pool).expect("math overflow")
    }
}

fn utilization(cash: u128, borrows: u128, reserves: u128) -> u128 {
    if borrows == 0 {
        return 0;
    }
    let denom = cash.saturating_add(borrows).saturating_sub(reserves);
    if denom == 0 {
        return 0;
    }
    fixed_point_math::div_to_mantissa(borrows, denom).expect("math overflow")
}

fn ensure_initialized(env: &Env) {
    if env
        .storage()
        .persistent()
        .get::<_, Address>(&DataKey::Admin)
        .is_none()
    {
        panic!("model not initialized");
    }
}

fn bump_ttl(env: &Env) {
    let persistent = env.storage().persistent();
    if persistent.has(&DataKey::Admin) {
        persistent.extend_ttl(&DataKey::Admin, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::BaseRatePerYear) {
        persistent.extend_ttl(&DataKey::BaseRatePerYear, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::MultiplierPerYear) {
        persistent.extend_ttl(&DataKey::MultiplierPerYear, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::JumpMultiplierPerYear) {
        persistent.extend_ttl(&DataKey::JumpMultiplierPerYear, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
    if persistent.has(&DataKey::Kink) {
        persistent.extend_ttl(&DataKey::Kink, TTL_THRESHOLD, TTL_EXTEND_TO);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use soroban_sdk::{testutils::Address as _, Env};

    fn setup(env: &Env) -> JumpRateModelClient<'_> {
        env.mock_all_auths();
        let admin = Address::generate(env);
        let id = env.register(JumpRateModel, ());
        let client = JumpRateModelClient::new(env, &id);
        // base 0%, 20%/yr to the kink at 80%, 400%/yr beyond it
        client.initialize(
            &0u128,
            &(EXP_SCALE / 5),
            &(EXP_SCALE * 4),
            &(EXP_SCALE * 8 / 10),
            &admin,
        );
        client
    }

    #[test]
    fn zero_borrows_zero_rate() {
        let env = Env::default();
        let client = setup(&env);
        assert_eq!(client.get_utilization(&1_000u128, &0u128, &0u128), 0);
        assert_eq!(client.get_borrow_rate(&1_000u128, &0u128, &0u128), 0);
    }

    #[test]
    fn rate_below_kink() {
        let env = Env::default();
        let client = setup(&env);
        // utilization 40%: yearly = 0.4 * 0.2 = 8%
        let rate = client.get_borrow_rate(&600u128, &400u128, &0u128);
        assert_eq!(rate, (EXP_SCALE * 8 / 100) / SECONDS_PER_YEAR);
    }

    #[test]
    fn slope_changes_at_kink() {
        let env = Env::default();
        let client = setup(&env);
        // utilization 90%: yearly = 0.8*0.2 + 0.1*4.0 = 0.56
        let rate = client.get_borrow_rate(&100u128, &900u128, &0u128);
        assert_eq!(rate, (EXP_SCALE * 56 / 100) / SECONDS_PER_YEAR);
        // above-kink rate dominates the below-kink one
        let low = client.get_borrow_rate(&600u128, &400u128, &0u128);
        assert!(rate > low);
    }

    #[test]
    fn supply_rate_discounts_reserve_factor() {
        let env = Env::default();
        let client = setup(&env);
        let rf = EXP_SCALE / 10; // 10%
        let with_rf = client.get_supply_rate(&500u128, &500u128, &0u128, &rf);
        let without = client.get_supply_rate(&500u128, &500u128, &0u128, &0u128);
        assert!(with_rf < without);
        assert!(with_rf > 0);
    }

    #[test]
    #[should_panic(expected = "already initialized")]
    fn reinitialize_rejected() {
        let env = Env::default();
        env.mock_all_auths();
        let admin = Address::generate(&env);
        let id = env.register(JumpRateModel, ());
        let client = JumpRateModelClient::new(&env, &id);
        client.initialize(&0u128, &0u128, &0u128, &0u128, &admin);
        client.initialize(&0u128, &0u128, &0u128, &0u128, &admin);
    }

    #[test]
    #[should_panic(expected = "invalid kink")]
    fn kink_above_one_rejected() {
        let env = Env::default();
        env.mock_all_auths();
        let admin = Address::generate(&env);
        let id = env.register(JumpRateModel, ());
        let client = JumpRateModelClient::new(&env, &id);
        client.initialize(&0u128, &0u128, &0u128, &(EXP_SCALE + 1), &admin);
    }
}
