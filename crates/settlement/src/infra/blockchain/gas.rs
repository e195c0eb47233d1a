//! Gas price and gas limit policy applied to every transaction an operator
//! sends.

use crate::domain::eth::{Gas, GasPrice, OperationKind};

/// Default gas price above which the smaller markup is applied.
pub const DEFAULT_HIGH_WATER_MARK: GasPrice = GasPrice(20_000_000_000);

#[derive(Debug, Clone, Copy)]
pub struct Policy {
    high_water_mark: GasPrice,
}

impl Default for Policy {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER_MARK)
    }
}

impl Policy {
    pub fn new(high_water_mark: GasPrice) -> Self {
        Self { high_water_mark }
    }

    /// The gas price to submit with given the network's current gas price.
    /// Markup is 5% above the high-water mark and 10% at or below it.
    pub fn price(&self, current: GasPrice) -> GasPrice {
        let markup = if current > self.high_water_mark {
            105
        } else {
            110
        };
        GasPrice(current.0.saturating_mul(markup) / 100)
    }

    /// The gas limit to submit with. Estimates get a 20% buffer, without
    /// one the ceiling for the kind of operation is used.
    pub fn limit(&self, estimate: Option<Gas>, kind: OperationKind) -> Gas {
        match estimate {
            Some(estimate) => Gas(estimate.0.saturating_mul(120) / 100),
            None => ceiling(kind),
        }
    }
}

/// Conservative gas limit for an operation that was not estimated.
pub fn ceiling(kind: OperationKind) -> Gas {
    match kind {
        OperationKind::Approve => Gas(100_000),
        OperationKind::Transfer => Gas(100_000),
        OperationKind::Burn => Gas(150_000),
        OperationKind::Swap => Gas(600_000),
        OperationKind::EndAuction => Gas(300_000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u128 = 1_000_000_000;

    #[test]
    fn marks_up_gas_price_relative_to_high_water_mark() {
        let policy = Policy::default();

        assert_eq!(policy.price(GasPrice(15 * GWEI)), GasPrice(16_500_000_000));
        assert_eq!(policy.price(GasPrice(25 * GWEI)), GasPrice(26_250_000_000));
        // The high-water mark itself is not above the mark.
        assert_eq!(policy.price(GasPrice(20 * GWEI)), GasPrice(22 * GWEI));
    }

    #[test]
    fn buffers_estimates_and_falls_back_to_ceilings() {
        let policy = Policy::default();

        assert_eq!(
            policy.limit(Some(Gas(200_000)), OperationKind::Swap),
            Gas(240_000)
        );
        assert_eq!(policy.limit(None, OperationKind::Swap), Gas(600_000));
        assert_eq!(policy.limit(None, OperationKind::Burn), Gas(150_000));
        assert_eq!(policy.limit(None, OperationKind::EndAuction), Gas(300_000));
    }
}
