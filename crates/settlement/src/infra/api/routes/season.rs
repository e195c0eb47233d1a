use {
    crate::{
        domain::{
            eth::{Address, TxHash, U256},
            season::{self, rewards, rollover::Rollover},
        },
        infra::api::{
            State,
            error::Kind,
            response::{Reply, Response},
        },
    },
    axum::http::StatusCode,
    chrono::NaiveDate,
    serde::{Deserialize, Serialize},
    serde_with::{DisplayFromStr, serde_as},
    std::time::Instant,
};

pub(in crate::infra::api) fn rollover(router: axum::Router<State>) -> axum::Router<State> {
    router.route("/season/rollover", axum::routing::post(route))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Query {
    /// Roll over even if the active season hasn't ended yet.
    force: bool,
}

async fn route(
    state: axum::extract::State<State>,
    query: axum::extract::Query<Query>,
) -> Reply<SeasonRollover> {
    let start = Instant::now();
    let result = if query.force {
        state.seasons().rollover().await.map(Some)
    } else {
        state
            .seasons()
            .rollover_if_due(chrono::Utc::now().date_naive())
            .await
    };

    match result {
        Ok(None) => {
            Response::ok(start, "the active season has not ended yet").reply(StatusCode::OK)
        }
        Ok(Some(rollover)) => {
            let message = format!(
                "season {} ended, season {} started",
                rollover.finished.number, rollover.next.number
            );
            let partial = rollover
                .report
                .as_ref()
                .is_none_or(rewards::Report::is_partial);
            let response = Response::ok(start, message).with_data(SeasonRollover::from(&rollover));
            let response = if partial {
                response.with_warning(Kind::PartialDistributionFailure)
            } else {
                response
            };
            response.reply(StatusCode::OK)
        }
        Err(err) => {
            let kind = Kind::from(&err);
            Response::failed(start, kind, err.to_string()).reply(kind.status())
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::infra::api) struct SeasonRollover {
    finished_season: Season,
    next_season: Season,
    snapshot: Vec<Standing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rewards: Option<Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distribution_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Season {
    number: u32,
    start_date: NaiveDate,
    end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Standing {
    rank: usize,
    wallet: Address,
    season_xp: u64,
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde_as(as = "DisplayFromStr")]
    total_distributed: U256,
    total_distributed_usd: u64,
    successes: usize,
    failures: Vec<Failure>,
    allocations: Vec<Allocation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Failure {
    rank: usize,
    wallet: Address,
    error: String,
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Allocation {
    rank: usize,
    wallet: Address,
    usd_value: u32,
    #[serde_as(as = "Option<DisplayFromStr>")]
    token_amount: Option<U256>,
    tx_hash: Option<TxHash>,
    error: Option<String>,
}

impl From<&season::Season> for Season {
    fn from(season: &season::Season) -> Self {
        Self {
            number: season.number,
            start_date: season.start,
            end_date: season.end,
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

impl From<&Rollover> for SeasonRollover {
    fn from(rollover: &Rollover) -> Self {
        Self {
            finished_season: (&rollover.finished).into(),
            next_season: (&rollover.next).into(),
            snapshot: rollover
                .snapshot
                .ranked()
                .map(|(rank, standing)| Standing {
                    rank,
                    wallet: standing.wallet,
                    season_xp: standing.season_xp,
                })
                .collect(),
            rewards: rollover.report.as_ref().map(Into::into),
            distribution_error: rollover.distribution_error.clone(),
        }
    }
}
