//! The auction contract, called from the auction operator account.

use {
    super::{Chain, Error, Ethereum, contracts::IAuction},
    crate::domain::{
        auction,
        eth::{self, Address, OperationKind},
    },
    alloy::sol_types::SolCall,
    std::sync::Arc,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuctionChain: Send + Sync {
    /// Closes the auction on-chain and waits for confirmation.
    async fn end_auction(&self, id: auction::Id) -> Result<eth::Receipt, Error>;

    async fn bidders(&self, id: auction::Id) -> Result<Vec<auction::Bidder>, Error>;

    async fn meta(&self, id: auction::Id) -> Result<auction::Meta, Error>;
}

pub struct OnchainAuctions {
    eth: Arc<Ethereum>,
    contract: Address,
}

impl OnchainAuctions {
    pub fn new(eth: Arc<Ethereum>, contract: Address) -> Self {
        Self { eth, contract }
    }

    fn instance(&self) -> IAuction::IAuctionInstance<alloy::providers::DynProvider> {
        IAuction::new(self.contract, self.eth.provider().clone())
    }
}

#[async_trait::async_trait]
impl AuctionChain for OnchainAuctions {
    async fn end_auction(&self, id: auction::Id) -> Result<eth::Receipt, Error> {
        let call = IAuction::endAuctionCall {
            auctionId: id.into(),
        };
        self.eth
            .send(eth::Tx::call(
                self.contract,
                call.abi_encode(),
                OperationKind::EndAuction,
            ))
            .await
    }

    async fn bidders(&self, id: auction::Id) -> Result<Vec<auction::Bidder>, Error> {
        let bidders = self.instance().getBidders(id.into()).call().await?;
        Ok(bidders
            .into_iter()
            .map(|bidder| auction::Bidder {
                wallet: bidder.bidder,
                amount: bidder.bidAmount,
                identity: bidder.fid,
            })
            .collect())
    }

    async fn meta(&self, id: auction::Id) -> Result<auction::Meta, Error> {
        let meta = self.instance().getAuctionMeta(id.into()).call().await?;
        Ok(auction::Meta {
            proceeds_token: meta.tokenAddress.into(),
            end_time: meta.endTime.saturating_to(),
            highest_bidder: meta.highestBidder,
            highest_bid: meta.highestBid,
            ended: meta.ended,
        })
    }
}
