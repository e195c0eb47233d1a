//! DTOs for the 0x swap API v2, allowance holder flavour. Documentation can
//! be found [here](https://0x.org/docs/api#tag/Swap).

use {
    crate::domain::{
        eth::{self, Address, Bytes, U256},
        swap,
    },
    serde::{Deserialize, Serialize},
    serde_with::{DisplayFromStr, serde_as},
    std::time::Instant,
};

/// Query parameters shared by the price and the quote endpoints.
#[serde_as]
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub chain_id: u64,

    /// Contract address of the token to sell.
    pub sell_token: Address,

    /// Contract address of the token to buy.
    pub buy_token: Address,

    /// Amount of the sell token, in atoms.
    #[serde_as(as = "DisplayFromStr")]
    pub sell_amount: U256,

    /// The account that executes the swap.
    pub taker: Address,

    /// Maximum acceptable slippage in basis points.
    pub slippage_bps: u32,

    /// Signals that the quote will be executed, which unlocks RFQ liquidity.
    pub intent_on_filling: bool,

    /// Requests routes that protect against high slippage and MEV.
    pub enable_slippage_protection: bool,
}

impl Query {
    pub fn new(chain_id: eth::ChainId, slippage_bps: u32, order: &swap::Order) -> Self {
        Self {
            chain_id: chain_id.0,
            sell_token: order.sell.0,
            buy_token: order.buy.0,
            sell_amount: order.amount,
            taker: order.taker,
            slippage_bps,
            intent_on_filling: true,
            enable_slippage_protection: true,
        }
    }
}

/// Response of both the price and the quote endpoint. The price endpoint
/// never includes a transaction.
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub liquidity_available: bool,

    /// Amount of the buy token, in atoms. Missing when there is no liquidity.
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub buy_amount: Option<U256>,

    #[serde(default)]
    pub issues: Issues,

    pub transaction: Option<Transaction>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Issues {
    /// Present when the taker hasn't approved the spender for the sell amount.
    pub allowance: Option<Allowance>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Allowance {
    pub spender: Address,
}

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Transaction {
    pub to: Address,
    pub data: Bytes,
    #[serde_as(as = "DisplayFromStr")]
    pub value: U256,
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub gas: Option<u64>,
}

impl Quote {
    pub fn into_domain(self, order: &swap::Order) -> Result<swap::Quote, super::Error> {
        if !self.liquidity_available {
            return Err(super::Error::NoLiquidity);
        }
        let buy_amount = self
            .buy_amount
            .ok_or(super::Error::MissingField("buyAmount"))?;
        Ok(swap::Quote {
            order: order.clone(),
            buy_amount,
            allowance_target: self.issues.allowance.map(|allowance| allowance.spender),
            transaction: self.transaction.map(|transaction| swap::Transaction {
                to: transaction.to,
                data: transaction.data,
                value: transaction.value,
                gas: transaction.gas.map(eth::Gas),
            }),
            fetched_at: Instant::now(),
        })
    }
}

/// A 0x API error response.
#[derive(Clone, Debug, Deserialize)]
pub struct Error {
    pub name: String,
    pub message: String,
}
