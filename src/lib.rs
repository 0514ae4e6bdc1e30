//! Cross-venue arbitrage scanner and two-leg executor for binary
//! prediction-market contracts.
//!
//! Two independent exchanges list YES/NO contracts paying 100¢ on
//! resolution. When the same real-world event is quoted on both at prices
//! where buying YES on one and NO on the other sums to less than 100¢, the
//! difference is locked profit per share. This crate discovers such pairs,
//! reprices them continuously on a two-speed loop, and - when credentials
//! are present - executes both legs with partial-fill and unwind handling.

pub mod config;
pub mod error;
pub mod executor;
pub mod finder;
pub mod guard;
pub mod kalshi;
pub mod matcher;
pub mod normalize;
pub mod polymarket;
pub mod polymarket_clob;
pub mod quotes;
pub mod runner;
pub mod storage;
pub mod types;
