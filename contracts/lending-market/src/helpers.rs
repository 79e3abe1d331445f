use soroban_sdk::{Address, Env, IntoVal};

pub fn call_contract_or_panic<T, A>(env: &Env, contract: &Address, func: &str, args: A) -> T
where
    T: soroban_sdk::TryFromVal<Env, soroban_sdk::Val>,
    A: IntoVal<Env, soroban_sdk::Vec<soroban_sdk::Val>>,
{
    use soroban_sdk::{Symbol, Val, Vec};
    let symbol = Symbol::new(env, func);
    let args_val: Vec<Val> = args.into_val(env);
    env.invoke_contract(contract, &symbol, args_val)
}
