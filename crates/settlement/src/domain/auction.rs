use {
    super::eth,
    serde::{Deserialize, Serialize},
};

/// Identifier of an auction in the auction contract.
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
    derive_more::From,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Id(pub u64);

impl From<Id> for eth::U256 {
    fn from(value: Id) -> Self {
        eth::U256::from(value.0)
    }
}

/// A bid as recorded by the auction contract when the auction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bidder {
    pub wallet: eth::Address,
    pub amount: eth::U256,
    /// Off-chain identity the bidder attached to the bid.
    pub identity: String,
}

/// On-chain metadata of an auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Token the bids were placed in.
    pub proceeds_token: eth::TokenAddress,
    pub end_time: u64,
    pub highest_bidder: eth::Address,
    pub highest_bid: eth::U256,
    pub ended: bool,
}
