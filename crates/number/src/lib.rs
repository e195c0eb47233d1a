//! Numeric helpers for token amounts held as [`alloy::primitives::U256`]
//! in their smallest unit.

pub mod conversions;
pub mod u256_ext;
