//! Rank based rewards, paid in the target token at its current price.

use {
    super::Snapshot,
    crate::{
        domain::eth::{Address, TokenAddress, TxHash, U256},
        infra::{
            blockchain,
            observe,
            prices::{self, PriceEstimating},
            tokens::Tokens,
        },
    },
    bigdecimal::{BigDecimal, Signed},
    std::sync::Arc,
};

/// USD reward per rank, starting at rank 1.
pub const REWARD_TABLE_USD: [u32; 10] = [500, 350, 100, 50, 50, 50, 50, 50, 50, 50];

/// USD reward for a 1-based rank.
pub fn usd_reward(rank: usize) -> Option<u32> {
    REWARD_TABLE_USD.get(rank.checked_sub(1)?).copied()
}

/// Converts a USD value into atoms of a token with the given price and
/// decimals. Truncates below one atom.
pub fn token_amount(usd: u32, price: &BigDecimal, decimals: u8) -> Option<U256> {
    if !price.is_positive() {
        return None;
    }
    number::conversions::decimal_to_atoms(&(BigDecimal::from(usd) / price), decimals)
}

/// The reward of one snapshot entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub rank: usize,
    pub wallet: Address,
    pub usd_value: u32,
    /// Known once the token price was fetched.
    pub token_amount: Option<U256>,
    pub tx_hash: Option<TxHash>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub rank: usize,
    pub wallet: Address,
    pub error: String,
}

/// Outcome of a distribution. Failures of single recipients don't stop the
/// distribution and end up in here instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Tokens transferred, in atoms.
    pub total_distributed: U256,
    pub total_distributed_usd: u64,
    pub successes: usize,
    pub failures: Vec<Failure>,
    pub allocations: Vec<Allocation>,
}

impl Report {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

pub struct Distributor {
    tokens: Arc<Tokens>,
    prices: Arc<dyn PriceEstimating>,
    token: TokenAddress,
}

impl Distributor {
    /// `tokens` operates the rewards wallet, `token` is the token rewards are
    /// paid in.
    pub fn new(tokens: Arc<Tokens>, prices: Arc<dyn PriceEstimating>, token: TokenAddress) -> Self {
        Self {
            tokens,
            prices,
            token,
        }
    }

    /// Pays every snapshot entry its reward, one after the other.
    pub async fn distribute(&self, snapshot: &Snapshot) -> Result<Report, Error> {
        let decimals = self.tokens.decimals(self.token).await?;
        let mut report = Report::default();
        for (rank, standing) in snapshot.ranked() {
            let Some(usd_value) = usd_reward(rank) else {
                continue;
            };
            let mut allocation = Allocation {
                rank,
                wallet: standing.wallet,
                usd_value,
                token_amount: None,
                tx_hash: None,
                error: None,
            };
            match self.pay(&mut allocation, decimals).await {
                Ok(()) => {
                    report.successes += 1;
                    report.total_distributed_usd += u64::from(usd_value);
                    report.total_distributed = report
                        .total_distributed
                        .saturating_add(allocation.token_amount.unwrap_or_default());
                }
                Err(err) => {
                    observe::reward_failed(rank, standing.wallet, &err);
                    allocation.error = Some(err.to_string());
                    report.failures.push(Failure {
                        rank,
                        wallet: standing.wallet,
                        error: err.to_string(),
                    });
                }
            }
            report.allocations.push(allocation);
        }
        observe::rewards_distributed(&report);
        Ok(report)
    }

    async fn pay(&self, allocation: &mut Allocation, decimals: u8) -> Result<(), RewardError> {
        let price = self.prices.usd_price(self.token).await?;
        let amount = token_amount(allocation.usd_value, &price, decimals)
            .filter(|amount| !amount.is_zero())
            .ok_or(RewardError::Amount(price))?;
        allocation.token_amount = Some(amount);

        let receipt = self
            .tokens
            .transfer(self.token, allocation.wallet, amount)
            .await?;
        observe::reward_paid(allocation.rank, allocation.wallet, amount, &receipt);
        allocation.tx_hash = Some(receipt.hash);
        Ok(())
    }
}

/// The distribution could not start at all.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Chain(#[from] blockchain::Error),
}

/// Paying a single recipient failed.
#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("price unavailable: {0}")]
    Price(#[from] prices::Error),
    #[error("no token amount for price {0}")]
    Amount(BigDecimal),
    #[error("transfer failed: {0}")]
    Transfer(#[from] blockchain::Error),
}
