use {
    crate::{
        domain::{auction, eth::{Address, TokenAddress}},
        infra::{
            api::{
                State,
                error::Kind,
                response::{Reply, Response},
            },
            queue::{Job, Rejected},
        },
    },
    axum::{body::Bytes, http::StatusCode},
    serde::Deserialize,
    std::time::Instant,
};

pub(in crate::infra::api) fn end_auction(router: axum::Router<State>) -> axum::Router<State> {
    router.route("/auctions/{id}/end", axum::routing::post(route))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EndRequest {
    /// Read from the auction contract when missing.
    proceeds_token: Option<Address>,
}

async fn route(
    state: axum::extract::State<State>,
    id: axum::extract::Path<u64>,
    body: Bytes,
) -> Reply<()> {
    let start = Instant::now();
    let auction = auction::Id(id.0);

    // The body is optional.
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        EndRequest::default()
    } else {
        match serde_json::from_slice::<EndRequest>(&body) {
            Ok(request) => request,
            Err(err) => {
                return Response::failed(start, Kind::InvalidRequest, err.to_string())
                    .reply(StatusCode::BAD_REQUEST);
            }
        }
    };

    let job = Job::Close {
        auction,
        proceeds_token: request.proceeds_token.map(TokenAddress),
    };
    match state.queue().enqueue(job) {
        Ok(()) => Response::ok(start, format!("closing auction {auction}"))
            .reply(StatusCode::ACCEPTED),
        Err(rejected) => {
            let kind = match rejected {
                Rejected::InFlight(_) => Kind::AuctionInFlight,
                Rejected::Full | Rejected::Closed => Kind::QueueUnavailable,
            };
            Response::failed(start, kind, rejected.to_string()).reply(kind.status())
        }
    }
}
