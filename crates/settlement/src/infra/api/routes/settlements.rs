use {
    crate::{
        domain::{
            auction,
            eth::{Address, TokenAddress, TxHash, U256},
            settlement::{AuctionSettlement, Bucket, Status},
        },
        infra::{
            api::{
                State,
                error::Kind,
                response::{Reply, Response},
            },
            queue::{Job, Rejected},
        },
    },
    axum::http::StatusCode,
    serde::{Deserialize, Serialize},
    serde_with::{DisplayFromStr, serde_as},
    std::{collections::BTreeMap, time::Instant},
    tokio::sync::oneshot,
    tracing::Instrument,
};

pub(in crate::infra::api) fn settle(router: axum::Router<State>) -> axum::Router<State> {
    router.route("/settlements", axum::routing::post(settle_route))
}

pub(in crate::infra::api) fn settlement(router: axum::Router<State>) -> axum::Router<State> {
    router.route("/settlements/{id}", axum::routing::get(settlement_route))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SettleRequest {
    auction_id: u64,
    proceeds_token: Address,
}

async fn settle_route(
    state: axum::extract::State<State>,
    request: axum::Json<SettleRequest>,
) -> Reply<Settlement> {
    let start = Instant::now();
    let auction = auction::Id(request.auction_id);
    let handle_request = async {
        let (reply, receiver) = oneshot::channel();
        let job = Job::Settle {
            auction,
            proceeds_token: TokenAddress(request.proceeds_token),
            reply,
        };
        if let Err(rejected) = state.queue().enqueue(job) {
            let kind = match rejected {
                Rejected::InFlight(_) => Kind::AuctionInFlight,
                Rejected::Full | Rejected::Closed => Kind::QueueUnavailable,
            };
            return Response::failed(start, kind, rejected.to_string()).reply(kind.status());
        }

        match receiver.await {
            Ok(Ok(record)) => Response::ok(start, format!("settled auction {auction}"))
                .with_data(Settlement::from(&record))
                .reply(StatusCode::OK),
            Ok(Err(err)) => {
                let kind = Kind::from(&err);
                let response = Response::failed(start, kind, err.to_string());
                // Whatever the failed run achieved is still reported.
                let response = match state.registry().get(auction) {
                    Some(record) => response.with_data(Settlement::from(&record)),
                    None => response,
                };
                response.reply(kind.status())
            }
            Err(_) => Response::failed(start, Kind::Internal, "settlement job was dropped")
                .reply(StatusCode::INTERNAL_SERVER_ERROR),
        }
    };

    handle_request
        .instrument(tracing::info_span!("/settlements", %auction))
        .await
}

async fn settlement_route(
    state: axum::extract::State<State>,
    id: axum::extract::Path<u64>,
) -> Reply<Settlement> {
    let start = Instant::now();
    let auction = auction::Id(id.0);
    match state.registry().get(auction) {
        Some(record) => Response::ok(start, format!("settlement of auction {auction}"))
            .with_data(Settlement::from(&record))
            .reply(StatusCode::OK),
        None => Response::failed(
            start,
            Kind::NotFound,
            format!("no settlement for auction {auction}"),
        )
        .reply(StatusCode::NOT_FOUND),
    }
}

#[serde_as]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::infra::api) struct Settlement {
    auction_id: u64,
    proceeds_token: Address,
    #[serde_as(as = "DisplayFromStr")]
    total_proceeds: U256,
    swap_tx_hash: Option<TxHash>,
    #[serde_as(as = "Option<BTreeMap<_, DisplayFromStr>>")]
    distribution_shares: Option<BTreeMap<Bucket, U256>>,
    transfer_tx_hashes: BTreeMap<Bucket, TxHash>,
    buyback_tx_hash: Option<TxHash>,
    burn_tx_hash: Option<TxHash>,
    #[serde_as(as = "DisplayFromStr")]
    burn_amount: U256,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Failure {
    stage: String,
    reason: String,
}

impl From<&AuctionSettlement> for Settlement {
    fn from(record: &AuctionSettlement) -> Self {
        let (status, failure) = match &record.status {
            Status::Pending => ("pending", None),
            Status::Swapped => ("swapped", None),
            Status::Split => ("split", None),
            Status::Distributed => ("distributed", None),
            Status::BoughtBack => ("boughtBack", None),
            Status::Completed => ("completed", None),
            Status::NoFunds => ("noFunds", None),
            Status::Failed { stage, reason } => (
                "failed",
                Some(Failure {
                    stage: stage.clone(),
                    reason: reason.clone(),
                }),
            ),
        };
        Self {
            auction_id: record.auction.0,
            proceeds_token: record.proceeds_token.0,
            total_proceeds: record.total_proceeds,
            swap_tx_hash: record.swap_tx,
            distribution_shares: record.distribution.as_ref().map(|distribution| {
                distribution
                    .shares()
                    .iter()
                    .map(|share| (share.bucket, share.amount))
                    .collect()
            }),
            transfer_tx_hashes: record.transfers.clone(),
            buyback_tx_hash: record.buyback_tx,
            burn_tx_hash: record.burn_tx,
            burn_amount: record.burn_amount,
            status,
            failure,
        }
    }
}
