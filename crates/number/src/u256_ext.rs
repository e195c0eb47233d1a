//! Extension trait for U256 arithmetic on token amounts.

use alloy::primitives::U256;

pub trait U256Ext: Sized {
    /// Computes `self * numerator / denominator`, rounding down. Returns
    /// `None` on overflow or a zero denominator.
    fn checked_mul_div(&self, numerator: u64, denominator: u64) -> Option<Self>;
}

impl U256Ext for U256 {
    fn checked_mul_div(&self, numerator: u64, denominator: u64) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        self.checked_mul(U256::from(numerator))?
            .checked_div(U256::from(denominator))
    }
}
