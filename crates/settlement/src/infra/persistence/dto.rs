//! JSON representation of a season's reward payout as it is stored in the
//! `season_payouts` table.

use {
    crate::domain::{
        eth::{Address, TxHash, U256},
        season::{self, Snapshot, Standing, rewards},
    },
    serde::{Deserialize, Serialize},
    serde_with::{DisplayFromStr, serde_as},
};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Payout {
    snapshot: Vec<Entry>,
    outcome: Outcome,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Entry {
    wallet: Address,
    season_xp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum Outcome {
    Started,
    Finished { report: Report },
    Failed { error: String },
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Report {
    #[serde_as(as = "DisplayFromStr")]
    total_distributed: U256,
    total_distributed_usd: u64,
    successes: usize,
    failures: Vec<Failure>,
    allocations: Vec<Allocation>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Failure {
    rank: usize,
    wallet: Address,
    error: String,
}

#[serde_as]
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Allocation {
    rank: usize,
    wallet: Address,
    usd_value: u32,
    #[serde_as(as = "Option<DisplayFromStr>")]
    token_amount: Option<U256>,
    tx_hash: Option<TxHash>,
    error: Option<String>,
}

impl From<&season::Payout> for Payout {
    fn from(payout: &season::Payout) -> Self {
        Self {
            snapshot: payout
                .snapshot
                .standings()
                .iter()
                .map(|standing| Entry {
                    wallet: standing.wallet,
                    season_xp: standing.season_xp,
                })
                .collect(),
            outcome: match &payout.outcome {
                season::Outcome::Started => Outcome::Started,
                season::Outcome::Finished(report) => Outcome::Finished {
                    report: report.into(),
                },
                season::Outcome::Failed(error) => Outcome::Failed {
                    error: error.clone(),
                },
            },
        }
    }
}

impl From<Payout> for season::Payout {
    fn from(payout: Payout) -> Self {
        Self {
            snapshot: Snapshot::new(
                payout
                    .snapshot
                    .into_iter()
                    .map(|entry| Standing {
                        wallet: entry.wallet,
                        season_xp: entry.season_xp,
                    })
                    .collect(),
            ),
            outcome: match payout.outcome {
                Outcome::Started => season::Outcome::Started,
                Outcome::Finished { report } => season::Outcome::Finished(report.into()),
                Outcome::Failed { error } => season::Outcome::Failed(error),
            },
        }
    }
}

impl From<&rewards::Report> for Report {
    fn from(report: &rewards::Report) -> Self {
        Self {
            total_distributed: report.total_distributed,
            total_distributed_usd: report.total_distributed_usd,
            successes: report.successes,
            failures: report
                .failures
                .iter()
                .map(|failure| Failure {
                    rank: failure.rank,
                    wallet: failure.wallet,
                    error: failure.error.clone(),
                })
                .collect(),
            allocations: report
                .allocations
                .iter()
                .map(|allocation| Allocation {
                    rank: allocation.rank,
                    wallet: allocation.wallet,
                    usd_value: allocation.usd_value,
                    token_amount: allocation.token_amount,
                    tx_hash: allocation.tx_hash,
                    error: allocation.error.clone(),
                })
                .collect(),
        }
    }
}

impl From<Report> for rewards::Report {
    fn from(report: Report) -> Self {
        Self {
            total_distributed: report.total_distributed,
            total_distributed_usd: report.total_distributed_usd,
            successes: report.successes,
            failures: report
                .failures
                .into_iter()
                .map(|failure| rewards::Failure {
                    rank: failure.rank,
                    wallet: failure.wallet,
                    error: failure.error,
                })
                .collect(),
            allocations: report
                .allocations
                .into_iter()
                .map(|allocation| rewards::Allocation {
                    rank: allocation.rank,
                    wallet: allocation.wallet,
                    usd_value: allocation.usd_value,
                    token_amount: allocation.token_amount,
                    tx_hash: allocation.tx_hash,
                    error: allocation.error,
                })
                .collect(),
        }
    }
}
