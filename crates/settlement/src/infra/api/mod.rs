use {
    crate::{
        domain::{season, settlement},
        infra::{observe, queue::Queue},
    },
    axum::{
        extract::Request,
        http::{StatusCode, header},
        middleware::Next,
        response::IntoResponse,
    },
    error::Kind,
    response::Response,
    std::{future::Future, net::SocketAddr, sync::Arc, time::Instant},
    tokio::sync::oneshot,
};

mod error;
mod response;
mod routes;

pub struct Api {
    pub queue: Queue,
    pub registry: settlement::Registry,
    pub seasons: Arc<season::Controller>,
    /// Bearer token every `/api` request has to present.
    pub secret: String,
    pub addr: SocketAddr,
    /// If this channel is specified, the bound address will be sent to it. This
    /// allows binding to port 0 during testing.
    pub addr_sender: Option<oneshot::Sender<SocketAddr>>,
}

impl Api {
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let state = State(Arc::new(Inner {
            queue: self.queue,
            registry: self.registry,
            seasons: self.seasons,
            secret: self.secret,
        }));

        let mut app = axum::Router::new();
        app = routes::metrics(app);
        app = routes::healthz(app);

        let api = axum::Router::new();
        let api = routes::end_auction(api);
        let api = routes::settle(api);
        let api = routes::settlement(api);
        let api = routes::rollover(api);
        let api = api
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                authorize,
            ))
            .with_state(state);

        let app = app.nest("/api", api).layer(
            tower::ServiceBuilder::new().layer(tower_http::trace::TraceLayer::new_for_http()),
        );

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        observe::listening(local_addr);
        if let Some(addr_sender) = self.addr_sender {
            // The receiver only goes away when the caller lost interest.
            let _ = addr_sender.send(local_addr);
        }
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

#[derive(Clone)]
struct State(Arc<Inner>);

impl State {
    fn queue(&self) -> &Queue {
        &self.0.queue
    }

    fn registry(&self) -> &settlement::Registry {
        &self.0.registry
    }

    fn seasons(&self) -> &season::Controller {
        &self.0.seasons
    }

    fn is_authorized(&self, authorization: Option<&str>) -> bool {
        authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| token == self.0.secret)
    }
}

struct Inner {
    queue: Queue,
    registry: settlement::Registry,
    seasons: Arc<season::Controller>,
    secret: String,
}

async fn authorize(
    state: axum::extract::State<State>,
    request: Request,
    next: Next,
) -> axum::response::Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if !state.is_authorized(authorization) {
        observe::unauthorized(request.uri().path());
        return Response::<()>::failed(
            Instant::now(),
            Kind::Unauthorized,
            "missing or invalid bearer token",
        )
        .reply(StatusCode::UNAUTHORIZED)
        .into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            domain::{
                eth::{Address, TokenAddress},
                season::{Season, rewards::Distributor},
                settlement::{AuctionSettlement, Status},
            },
            infra::{
                blockchain::MockChain,
                persistence::MockSeasonStore,
                prices::MockPriceEstimating,
                queue::{self, Job},
                tokens::Tokens,
            },
        },
        serde_json::{Value, json},
    };

    const SECRET: &str = "worker-secret";

    /// Keeps close jobs running forever and settles instantly.
    struct Handler;

    #[async_trait::async_trait]
    impl queue::Handler for Handler {
        async fn handle(&self, job: Job) {
            match job {
                Job::Close { .. } => std::future::pending().await,
                Job::Settle {
                    auction,
                    proceeds_token,
                    reply,
                } => {
                    let mut record = AuctionSettlement::new(auction, proceeds_token);
                    record.status = Status::Completed;
                    let _ = reply.send(Ok(record));
                }
            }
        }
    }

    async fn serve() -> url::Url {
        let mut store = MockSeasonStore::new();
        store.expect_active_season().returning(|| {
            let today = chrono::Utc::now().date_naive();
            Ok(Season {
                number: 1,
                start: today,
                end: today + chrono::Days::new(10),
            })
        });
        let distributor = Distributor::new(
            Arc::new(Tokens::new(Arc::new(MockChain::new()))),
            Arc::new(MockPriceEstimating::new()),
            TokenAddress(Address::repeat_byte(1)),
        );

        let (addr_sender, addr_receiver) = oneshot::channel();
        let api = Api {
            queue: Queue::spawn(queue::DEFAULT_CAPACITY, Arc::new(Handler)),
            registry: settlement::Registry::default(),
            seasons: Arc::new(season::Controller::new(Arc::new(store), distributor, 30)),
            secret: SECRET.to_owned(),
            addr: "127.0.0.1:0".parse().unwrap(),
            addr_sender: Some(addr_sender),
        };
        tokio::spawn(api.serve(std::future::pending()));
        let addr = addr_receiver.await.unwrap();
        format!("http://{addr}/").parse().unwrap()
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let url = serve().await;
        let client = reqwest::Client::new();

        let health = client.get(url.join("healthz").unwrap()).send().await.unwrap();
        assert_eq!(health.status(), reqwest::StatusCode::OK);

        let response = client
            .get(url.join("api/settlements/1").unwrap())
            .bearer_auth("wrong")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Unauthorized");
        assert!(body["executionTimeMs"].is_u64());
    }

    #[tokio::test]
    async fn ending_an_auction_twice_conflicts() {
        let url = serve().await;
        let client = reqwest::Client::new();
        let end = url.join("api/auctions/7/end").unwrap();

        let response = client.post(end.clone()).bearer_auth(SECRET).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        let response = client
            .post(end)
            .bearer_auth(SECRET)
            .json(&json!({ "proceedsToken": Address::repeat_byte(2) }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "AuctionInFlight");
    }

    #[tokio::test]
    async fn settles_through_the_queue() {
        let url = serve().await;
        let client = reqwest::Client::new();

        let response = client
            .post(url.join("api/settlements").unwrap())
            .bearer_auth(SECRET)
            .json(&json!({ "auctionId": 3, "proceedsToken": Address::repeat_byte(2) }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert!(body.get("error").is_none());
        assert_eq!(body["data"]["auctionId"], 3);
        assert_eq!(body["data"]["status"], "completed");
        assert_eq!(body["data"]["burnAmount"], "0");

        let response = client
            .get(url.join("api/settlements/4").unwrap())
            .bearer_auth(SECRET)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rollover_waits_for_the_season_to_end() {
        let url = serve().await;
        let response = reqwest::Client::new()
            .post(url.join("api/season/rollover").unwrap())
            .bearer_auth(SECRET)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "the active season has not ended yet");
        assert!(body.get("data").is_none());
    }
}
