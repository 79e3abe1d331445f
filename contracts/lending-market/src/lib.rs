#![no_std]

mod contract;
mod helpers;
mod storage;

pub use contract::{LendingMarket, LendingMarketClient};
