//! Splitting settlement proceeds between the stakeholder buckets.

use {
    crate::domain::eth::U256,
    number::u256_ext::U256Ext,
    serde::{Deserialize, Serialize},
};

/// A recipient of a share of the proceeds.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    #[display("treasury")]
    Treasury,
    #[display("dev")]
    Dev,
    #[display("buyback")]
    Buyback,
    #[display("staking")]
    Staking,
}

/// Fixed ratios the proceeds are split by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RatioScheme {
    /// Treasury 3/8, dev 3/8, buyback gets the remaining 2/8.
    ThreeEighths,
    /// Buyback 1/4, staking 1/8, treasury gets the remaining 5/8.
    QuarterEighth,
}

impl RatioScheme {
    /// Buckets with a fixed ratio `(numerator, denominator)`, in order,
    /// followed by the bucket receiving the remainder.
    fn layout(&self) -> (&'static [(Bucket, u64, u64)], Bucket) {
        match self {
            Self::ThreeEighths => (
                &[(Bucket::Treasury, 3, 8), (Bucket::Dev, 3, 8)],
                Bucket::Buyback,
            ),
            Self::QuarterEighth => (
                &[(Bucket::Buyback, 1, 4), (Bucket::Staking, 1, 8)],
                Bucket::Treasury,
            ),
        }
    }

    /// All buckets of the scheme in distribution order.
    pub fn buckets(&self) -> Vec<Bucket> {
        let (fixed, remainder) = self.layout();
        fixed
            .iter()
            .map(|(bucket, ..)| *bucket)
            .chain(std::iter::once(remainder))
            .collect()
    }

    /// Splits `total` in integer arithmetic. Every fixed share is rounded
    /// down and the last bucket receives whatever is left, so the shares
    /// always add up to `total` exactly.
    pub fn split(&self, total: U256) -> Result<Distribution, Overflow> {
        let (fixed, remainder) = self.layout();
        let mut shares = Vec::with_capacity(fixed.len() + 1);
        let mut left = total;
        for (bucket, numerator, denominator) in fixed {
            let amount = total
                .checked_mul_div(*numerator, *denominator)
                .ok_or(Overflow)?;
            left = left.checked_sub(amount).ok_or(Overflow)?;
            shares.push(Share {
                bucket: *bucket,
                amount,
            });
        }
        shares.push(Share {
            bucket: remainder,
            amount: left,
        });
        Ok(Distribution { shares })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Share {
    pub bucket: Bucket,
    pub amount: U256,
}

/// The split of a settlement's proceeds, in distribution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    shares: Vec<Share>,
}

impl Distribution {
    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    /// The amount assigned to the bucket, zero if the scheme has no such
    /// bucket.
    pub fn amount(&self, bucket: Bucket) -> U256 {
        self.shares
            .iter()
            .find(|share| share.bucket == bucket)
            .map(|share| share.amount)
            .unwrap_or_default()
    }

    pub fn total(&self) -> U256 {
        self.shares
            .iter()
            .fold(U256::ZERO, |total, share| total.saturating_add(share.amount))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("share computation overflowed")]
pub struct Overflow;

#[cfg(test)]
mod tests {
    use {super::*, proptest::prelude::*};

    #[test]
    fn three_eighths_of_a_million() {
        let distribution = RatioScheme::ThreeEighths
            .split(U256::from(1_000_000))
            .unwrap();
        assert_eq!(distribution.amount(Bucket::Treasury), U256::from(375_000));
        assert_eq!(distribution.amount(Bucket::Dev), U256::from(375_000));
        assert_eq!(distribution.amount(Bucket::Buyback), U256::from(250_000));
        assert_eq!(distribution.amount(Bucket::Staking), U256::ZERO);
    }

    #[test]
    fn remainder_absorbs_rounding() {
        let distribution = RatioScheme::QuarterEighth.split(U256::from(7)).unwrap();
        assert_eq!(
            distribution.shares(),
            [
                Share {
                    bucket: Bucket::Buyback,
                    amount: U256::from(1)
                },
                Share {
                    bucket: Bucket::Staking,
                    amount: U256::ZERO
                },
                Share {
                    bucket: Bucket::Treasury,
                    amount: U256::from(6)
                },
            ]
        );
    }

    #[test]
    fn huge_totals_overflow_instead_of_wrapping() {
        assert!(RatioScheme::ThreeEighths.split(U256::MAX).is_err());
    }

    proptest! {
        #[test]
        fn shares_add_up_to_total(
            limbs in any::<[u64; 3]>(),
            quarter in any::<bool>(),
        ) {
            let total = U256::from_limbs([limbs[0], limbs[1], limbs[2], 0]);
            let scheme = if quarter {
                RatioScheme::QuarterEighth
            } else {
                RatioScheme::ThreeEighths
            };
            let distribution = scheme.split(total).unwrap();
            prop_assert_eq!(distribution.total(), total);

            let shares = distribution.shares();
            let prior = shares[..shares.len() - 1]
                .iter()
                .fold(U256::ZERO, |sum, share| sum + share.amount);
            prop_assert_eq!(shares[shares.len() - 1].amount, total - prior);
        }
    }
}
