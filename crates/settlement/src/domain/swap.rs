//! Token swaps through the DEX aggregator: price, approve, quote, execute.

use {
    crate::{
        domain::eth::{self, Address, Bytes, Gas, OperationKind, TokenAddress, U256},
        infra::{
            aggregator::{self, Aggregator},
            blockchain,
            observe,
            tokens::Tokens,
        },
    },
    std::{
        sync::Arc,
        time::{Duration, Instant},
    },
};

/// Default time after which a firm quote is considered too old to execute.
pub const DEFAULT_QUOTE_TTL: Duration = Duration::from_secs(30);

/// Sell an exact amount of one token for another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub sell: TokenAddress,
    pub buy: TokenAddress,
    /// Amount of the sell token, in atoms.
    pub amount: U256,
    /// The account that executes the swap.
    pub taker: Address,
}

/// A swap quote. Firm quotes carry the transaction that executes the swap,
/// indicative ones don't.
#[derive(Debug, Clone)]
pub struct Quote {
    pub order: Order,
    pub buy_amount: U256,
    /// Contract that needs an allowance on the sell token for the swap to
    /// succeed, if the taker hasn't granted it yet.
    pub allowance_target: Option<Address>,
    pub transaction: Option<Transaction>,
    pub fetched_at: Instant,
}

impl Quote {
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() > ttl
    }
}

/// Router call executing a swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas: Option<Gas>,
}

/// An executed swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swap {
    pub receipt: eth::Receipt,
    /// Amount the firm quote promised, before slippage.
    pub buy_amount: U256,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    QuoteUnavailable(#[from] aggregator::Error),
    #[error(transparent)]
    Transaction(#[from] blockchain::Error),
}

pub struct Swapper {
    aggregator: Arc<dyn Aggregator>,
    tokens: Arc<Tokens>,
    quote_ttl: Duration,
}

impl Swapper {
    pub fn new(aggregator: Arc<dyn Aggregator>, tokens: Arc<Tokens>, quote_ttl: Duration) -> Self {
        Self {
            aggregator,
            tokens,
            quote_ttl,
        }
    }

    /// Sells `amount` of `sell` for `buy` from the operator account.
    pub async fn swap(
        &self,
        sell: TokenAddress,
        buy: TokenAddress,
        amount: U256,
    ) -> Result<Swap, Error> {
        let order = Order {
            sell,
            buy,
            amount,
            taker: self.tokens.operator(),
        };

        let price = self.aggregator.price(&order).await?;
        if let Some(spender) = price.allowance_target {
            self.tokens.approve(sell, spender, U256::MAX).await?;
        }

        let mut quote = self.aggregator.quote(&order).await?;
        if let Some(spender) = quote.allowance_target
            && Some(spender) != price.allowance_target
        {
            self.tokens.ensure_allowance(sell, spender, amount).await?;
        }
        if quote.is_stale(self.quote_ttl) {
            observe::stale_quote(&order, quote.fetched_at.elapsed());
            quote = self.aggregator.quote(&order).await?;
        }

        let transaction = quote
            .transaction
            .ok_or(aggregator::Error::MissingField("transaction"))?;
        let receipt = self
            .tokens
            .chain()
            .send(eth::Tx {
                to: transaction.to,
                input: transaction.data,
                value: transaction.value,
                gas: transaction.gas,
                kind: OperationKind::Swap,
            })
            .await?;
        observe::swapped(&order, quote.buy_amount, &receipt);
        Ok(Swap {
            receipt,
            buy_amount: quote.buy_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::infra::{aggregator::MockAggregator, blockchain::MockChain},
        alloy::primitives::{B256, address},
        mockall::Sequence,
    };

    const OPERATOR: Address = address!("0x1111111111111111111111111111111111111111");
    const SELL: TokenAddress = TokenAddress(address!("0x2222222222222222222222222222222222222222"));
    const BUY: TokenAddress = TokenAddress(address!("0x3333333333333333333333333333333333333333"));
    const ROUTER: Address = address!("0x4444444444444444444444444444444444444444");

    fn quote(order: &Order, allowance_target: Option<Address>, firm: bool) -> Quote {
        Quote {
            order: order.clone(),
            buy_amount: U256::from(990),
            allowance_target,
            transaction: firm.then(|| Transaction {
                to: ROUTER,
                data: Bytes::from_static(&[0xde, 0xad]),
                value: U256::ZERO,
                gas: Some(Gas(200_000)),
            }),
            fetched_at: Instant::now(),
        }
    }

    #[tokio::test]
    async fn approves_before_fetching_firm_quote_and_executes() {
        let mut seq = Sequence::new();
        let mut aggregator = MockAggregator::new();
        let mut chain = MockChain::new();
        chain.expect_operator().return_const(OPERATOR);

        aggregator
            .expect_price()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|order| Ok(quote(order, Some(ROUTER), false)));
        chain
            .expect_send()
            .withf(|tx| tx.kind == OperationKind::Approve && tx.to == SELL.0)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(eth::Receipt {
                    hash: B256::repeat_byte(1),
                    gas_used: Gas(40_000),
                })
            });
        aggregator
            .expect_quote()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|order| Ok(quote(order, Some(ROUTER), true)));
        chain
            .expect_send()
            .withf(|tx| {
                tx.kind == OperationKind::Swap && tx.to == ROUTER && tx.gas == Some(Gas(200_000))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(eth::Receipt {
                    hash: B256::repeat_byte(2),
                    gas_used: Gas(150_000),
                })
            });

        let swapper = Swapper::new(
            Arc::new(aggregator),
            Arc::new(Tokens::new(Arc::new(chain))),
            DEFAULT_QUOTE_TTL,
        );
        let swap = swapper.swap(SELL, BUY, U256::from(1_000)).await.unwrap();
        assert_eq!(swap.receipt.hash, B256::repeat_byte(2));
        assert_eq!(swap.buy_amount, U256::from(990));
    }

    #[tokio::test]
    async fn refetches_stale_firm_quotes() {
        let mut aggregator = MockAggregator::new();
        let mut chain = MockChain::new();
        chain.expect_operator().return_const(OPERATOR);

        aggregator
            .expect_price()
            .returning(|order| Ok(quote(order, None, false)));
        let mut seq = Sequence::new();
        aggregator
            .expect_quote()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|order| {
                let mut quote = quote(order, None, true);
                quote.fetched_at = Instant::now() - Duration::from_secs(60);
                Ok(quote)
            });
        aggregator
            .expect_quote()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|order| Ok(quote(order, None, true)));
        chain
            .expect_send()
            .withf(|tx| tx.kind == OperationKind::Swap)
            .times(1)
            .returning(|_| {
                Ok(eth::Receipt {
                    hash: B256::repeat_byte(3),
                    gas_used: Gas(150_000),
                })
            });

        let swapper = Swapper::new(
            Arc::new(aggregator),
            Arc::new(Tokens::new(Arc::new(chain))),
            DEFAULT_QUOTE_TTL,
        );
        swapper.swap(SELL, BUY, U256::from(1_000)).await.unwrap();
    }

    #[tokio::test]
    async fn surfaces_unavailable_quotes() {
        let mut aggregator = MockAggregator::new();
        let mut chain = MockChain::new();
        chain.expect_operator().return_const(OPERATOR);
        chain.expect_send().never();
        aggregator
            .expect_price()
            .returning(|_| Err(aggregator::Error::NoLiquidity));

        let swapper = Swapper::new(
            Arc::new(aggregator),
            Arc::new(Tokens::new(Arc::new(chain))),
            DEFAULT_QUOTE_TTL,
        );
        let err = swapper
            .swap(SELL, BUY, U256::from(1_000))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::QuoteUnavailable(aggregator::Error::NoLiquidity)
        ));
    }
}
