//! Token prices in the settlement currency, which is a USD stablecoin.

use {
    crate::{
        domain::{
            eth::{TokenAddress, U256},
            swap,
        },
        infra::{
            aggregator::{self, Aggregator},
            blockchain,
            tokens::Tokens,
        },
    },
    bigdecimal::{BigDecimal, Zero},
    std::sync::Arc,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PriceEstimating: Send + Sync {
    /// USD price of one whole token.
    async fn usd_price(&self, token: TokenAddress) -> Result<BigDecimal, Error>;
}

/// Prices a token by asking the aggregator how much of the settlement
/// currency one whole token sells for.
pub struct AggregatorPrices {
    aggregator: Arc<dyn Aggregator>,
    tokens: Arc<Tokens>,
    usd: TokenAddress,
}

impl AggregatorPrices {
    pub fn new(aggregator: Arc<dyn Aggregator>, tokens: Arc<Tokens>, usd: TokenAddress) -> Self {
        Self {
            aggregator,
            tokens,
            usd,
        }
    }
}

#[async_trait::async_trait]
impl PriceEstimating for AggregatorPrices {
    async fn usd_price(&self, token: TokenAddress) -> Result<BigDecimal, Error> {
        if token == self.usd {
            return Ok(BigDecimal::from(1));
        }
        let decimals = self.tokens.decimals(token).await?;
        let usd_decimals = self.tokens.decimals(self.usd).await?;
        let order = swap::Order {
            sell: token,
            buy: self.usd,
            amount: U256::from(10u64).pow(U256::from(decimals)),
            taker: self.tokens.operator(),
        };
        let quote = self.aggregator.price(&order).await?;
        let price = number::conversions::atoms_to_decimal(&quote.buy_amount, usd_decimals);
        if price.is_zero() {
            return Err(Error::Zero(token));
        }
        Ok(price)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Chain(#[from] blockchain::Error),
    #[error(transparent)]
    QuoteUnavailable(#[from] aggregator::Error),
    #[error("token {0} has no price")]
    Zero(TokenAddress),
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::infra::{aggregator::MockAggregator, blockchain::MockChain},
        alloy::primitives::address,
        std::{str::FromStr, time::Instant},
    };

    #[tokio::test]
    async fn prices_one_whole_token() {
        let target = TokenAddress(address!("0x2222222222222222222222222222222222222222"));
        let usdc = TokenAddress(address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));

        let mut chain = MockChain::new();
        chain.expect_operator().return_const(address!("0x1111111111111111111111111111111111111111"));
        chain
            .expect_decimals()
            .returning(move |token| Ok(if token == usdc { 6 } else { 18 }));
        let mut aggregator = MockAggregator::new();
        aggregator
            .expect_price()
            .withf(move |order| {
                order.sell == target
                    && order.amount == U256::from(1_000_000_000_000_000_000u128)
            })
            .returning(|order| {
                Ok(swap::Quote {
                    order: order.clone(),
                    buy_amount: U256::from(50_000),
                    allowance_target: None,
                    transaction: None,
                    fetched_at: Instant::now(),
                })
            });

        let prices = AggregatorPrices::new(
            Arc::new(aggregator),
            Arc::new(Tokens::new(Arc::new(chain))),
            usdc,
        );
        assert_eq!(
            prices.usd_price(target).await.unwrap(),
            BigDecimal::from_str("0.05").unwrap()
        );
    }
}
