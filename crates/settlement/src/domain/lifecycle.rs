//! Closing of ended auctions: the auction is ended on-chain, its final
//! bidders are reconciled with the web application's database and its
//! proceeds are settled. Reconciliation and settlement are independent, a
//! failure in one doesn't hold up the other.

use {
    crate::{
        domain::{
            auction,
            eth::{TokenAddress, TxHash},
            settlement::{self, AuctionSettlement},
        },
        infra::{
            blockchain::{self, AuctionChain},
            observe,
            queue,
            reconciliation::{self, Reconciler},
        },
        util::retry,
    },
    std::{sync::Arc, time::Duration},
};

pub const DEFAULT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

pub struct Worker {
    auctions: Arc<dyn AuctionChain>,
    reconciler: Arc<dyn Reconciler>,
    settlement: Arc<settlement::Orchestrator>,
    retry: retry::Policy,
}

/// What closing an auction achieved.
#[derive(Debug)]
pub struct Closed {
    /// `None` if the auction had already been ended.
    pub end_tx: Option<TxHash>,
    pub reconciliation: Result<Vec<auction::Bidder>, Error>,
    pub settlement: Result<AuctionSettlement, settlement::Error>,
}

impl Worker {
    pub fn new(
        auctions: Arc<dyn AuctionChain>,
        reconciler: Arc<dyn Reconciler>,
        settlement: Arc<settlement::Orchestrator>,
        retry: retry::Policy,
    ) -> Self {
        Self {
            auctions,
            reconciler,
            settlement,
            retry,
        }
    }

    /// Ends the auction and processes its outcome. Safe to call again for an
    /// auction that was already ended.
    pub async fn close(
        &self,
        id: auction::Id,
        proceeds_token: Option<TokenAddress>,
    ) -> Result<Closed, Error> {
        let end_tx = self.end(id).await?;
        let proceeds_token = match proceeds_token {
            Some(token) => token,
            None => self.auctions.meta(id).await?.proceeds_token,
        };

        let (reconciliation, settlement) =
            tokio::join!(self.reconcile(id), self.settle(id, proceeds_token));
        Ok(Closed {
            end_tx,
            reconciliation,
            settlement,
        })
    }

    async fn end(&self, id: auction::Id) -> Result<Option<TxHash>, Error> {
        match self.auctions.end_auction(id).await {
            Ok(receipt) => {
                observe::auction_ended(id, &receipt);
                Ok(Some(receipt.hash))
            }
            Err(err) => {
                // The contract rejects ending an auction twice.
                let meta = self.auctions.meta(id).await?;
                if !meta.ended {
                    return Err(Error::End(id, err));
                }
                observe::auction_already_ended(id, &err);
                Ok(None)
            }
        }
    }

    /// Reads the final bidders and hands them to the reconciliation endpoint.
    async fn reconcile(&self, id: auction::Id) -> Result<Vec<auction::Bidder>, Error> {
        let result = self
            .retry
            .run("reconciliation", |_| true, || async {
                let bidders = self.auctions.bidders(id).await?;
                self.reconciler.reconcile(id, &bidders).await?;
                Ok::<_, Error>(bidders)
            })
            .await;
        observe::reconciled(id, &result);
        result
    }

    pub async fn settle(
        &self,
        id: auction::Id,
        proceeds_token: TokenAddress,
    ) -> Result<AuctionSettlement, settlement::Error> {
        self.retry
            .run("settlement", settlement::Error::is_retryable, || {
                self.settlement.settle(id, proceeds_token)
            })
            .await
    }
}

#[async_trait::async_trait]
impl queue::Handler for Worker {
    async fn handle(&self, job: queue::Job) {
        match job {
            queue::Job::Close {
                auction,
                proceeds_token,
            } => {
                let result = self.close(auction, proceeds_token).await;
                observe::closed(auction, &result);
            }
            queue::Job::Settle {
                auction,
                proceeds_token,
                reply,
            } => {
                let result = self.settle(auction, proceeds_token).await;
                // The requester may have gone away, the record is still kept.
                let _ = reply.send(result);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ending auction {0} failed: {1}")]
    End(auction::Id, #[source] blockchain::Error),
    #[error(transparent)]
    Chain(#[from] blockchain::Error),
    #[error(transparent)]
    Reconciliation(#[from] reconciliation::Error),
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            domain::{
                eth::{self, Address, Gas, U256},
                settlement::{Bucket, Destinations, RatioScheme, Registry},
                swap::Swapper,
            },
            infra::{
                aggregator::MockAggregator,
                blockchain::{MockChain, auction::MockAuctionChain},
                reconciliation::MockReconciler,
                tokens::{BurnMethod, Tokens},
            },
        },
        alloy::primitives::{B256, address},
        std::{
            collections::HashMap,
            sync::atomic::{AtomicUsize, Ordering},
        },
    };

    const USDC: TokenAddress = TokenAddress(address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"));

    /// An orchestrator whose operator holds nothing, counting balance reads.
    fn empty_orchestrator(reads: Arc<AtomicUsize>) -> Arc<settlement::Orchestrator> {
        let mut chain = MockChain::new();
        chain
            .expect_operator()
            .return_const(address!("0x1111111111111111111111111111111111111111"));
        chain.expect_balance_of().returning(move |_, _| {
            reads.fetch_add(1, Ordering::SeqCst);
            Ok(U256::ZERO)
        });
        let tokens = Arc::new(Tokens::new(Arc::new(chain)));
        let swapper = Swapper::new(
            Arc::new(MockAggregator::new()),
            tokens.clone(),
            Duration::from_secs(30),
        );
        let config = settlement::Config {
            settlement_currency: USDC,
            target_token: TokenAddress(Address::repeat_byte(2)),
            scheme: RatioScheme::ThreeEighths,
            destinations: Destinations::new(HashMap::from([
                (Bucket::Treasury, Address::repeat_byte(5)),
                (Bucket::Dev, Address::repeat_byte(6)),
            ])),
            burn: BurnMethod::Burn,
        };
        Arc::new(settlement::Orchestrator::new(
            tokens,
            swapper,
            config,
            Registry::default(),
        ))
    }

    fn meta(ended: bool) -> auction::Meta {
        auction::Meta {
            proceeds_token: USDC,
            end_time: 1_700_000_000,
            highest_bidder: Address::repeat_byte(7),
            highest_bid: U256::from(100),
            ended,
        }
    }

    fn bidders() -> Vec<auction::Bidder> {
        vec![auction::Bidder {
            wallet: Address::repeat_byte(7),
            amount: U256::from(100),
            identity: "fid:1".to_owned(),
        }]
    }

    fn retry() -> retry::Policy {
        retry::Policy::exponential(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn continues_when_auction_was_already_ended() {
        let mut auctions = MockAuctionChain::new();
        auctions
            .expect_end_auction()
            .times(1)
            .returning(|_| Err(blockchain::Error::Reverted(B256::repeat_byte(1))));
        auctions.expect_meta().returning(|_| Ok(meta(true)));
        auctions.expect_bidders().returning(|_| Ok(bidders()));
        let mut reconciler = MockReconciler::new();
        reconciler
            .expect_reconcile()
            .withf(|id, bidders| *id == auction::Id(9) && bidders.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let worker = Worker::new(
            Arc::new(auctions),
            Arc::new(reconciler),
            empty_orchestrator(Default::default()),
            retry(),
        );
        let closed = worker.close(auction::Id(9), None).await.unwrap();

        assert_eq!(closed.end_tx, None);
        assert_eq!(closed.reconciliation.unwrap(), bidders());
        // Nothing to settle, which is not worth retrying.
        assert_eq!(closed.settlement.unwrap_err().kind(), "NoFundsToSettle");
    }

    #[tokio::test]
    async fn fails_when_auction_cannot_be_ended() {
        let mut auctions = MockAuctionChain::new();
        auctions
            .expect_end_auction()
            .returning(|_| Err(blockchain::Error::Reverted(B256::repeat_byte(1))));
        auctions.expect_meta().returning(|_| Ok(meta(false)));
        auctions.expect_bidders().never();
        let mut reconciler = MockReconciler::new();
        reconciler.expect_reconcile().never();

        let worker = Worker::new(
            Arc::new(auctions),
            Arc::new(reconciler),
            empty_orchestrator(Default::default()),
            retry(),
        );
        let err = worker.close(auction::Id(9), Some(USDC)).await.unwrap_err();
        assert!(matches!(err, Error::End(auction::Id(9), _)));
    }

    #[tokio::test]
    async fn failed_reconciliation_does_not_block_settlement() {
        let mut auctions = MockAuctionChain::new();
        auctions.expect_end_auction().returning(|_| {
            Ok(eth::Receipt {
                hash: B256::repeat_byte(3),
                gas_used: Gas(80_000),
            })
        });
        auctions.expect_bidders().returning(|_| Ok(bidders()));
        let mut reconciler = MockReconciler::new();
        reconciler
            .expect_reconcile()
            .times(3)
            .returning(|_, _| Err(reconciliation::Error::Rejected("database down".to_owned())));

        let reads = Arc::new(AtomicUsize::new(0));
        let worker = Worker::new(
            Arc::new(auctions),
            Arc::new(reconciler),
            empty_orchestrator(reads.clone()),
            retry(),
        );
        let closed = worker.close(auction::Id(4), Some(USDC)).await.unwrap();

        assert_eq!(closed.end_tx, Some(B256::repeat_byte(3)));
        assert!(matches!(
            closed.reconciliation,
            Err(Error::Reconciliation(reconciliation::Error::Rejected(_)))
        ));
        assert!(closed.settlement.is_err());
        assert!(reads.load(Ordering::SeqCst) > 0);
    }
}
