//! Client for the 0x swap API.

use {
    crate::{
        domain::{eth, swap},
        infra::observe,
        util::{self, http::RoundtripError, retry},
    },
    reqwest::{
        Url,
        header::{HeaderMap, HeaderValue},
    },
    std::time::Duration,
};

mod dto;

pub const DEFAULT_URL: &str = "https://api.0x.org/";
pub const DEFAULT_SLIPPAGE_BPS: u32 = 50;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// A DEX aggregator quoting sell orders.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Aggregator: Send + Sync {
    /// Indicative price for the order, without a transaction.
    async fn price(&self, order: &swap::Order) -> Result<swap::Quote, Error>;

    /// Firm quote for the order, bound to an executable transaction.
    async fn quote(&self, order: &swap::Order) -> Result<swap::Quote, Error>;
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Price,
    Quote,
}

impl Endpoint {
    fn path(&self) -> &'static str {
        match self {
            Self::Price => "swap/allowance-holder/price",
            Self::Quote => "swap/allowance-holder/quote",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Quote => "quote",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the 0x API.
    pub endpoint: Url,
    pub api_key: String,
    pub chain_id: eth::ChainId,
    pub slippage_bps: u32,
    /// Timeout of every single request.
    pub timeout: Duration,
    pub retry: retry::Policy,
}

/// Bindings to the 0x swap API.
pub struct ZeroEx {
    client: reqwest::Client,
    price_url: Url,
    quote_url: Url,
    chain_id: eth::ChainId,
    slippage_bps: u32,
    retry: retry::Policy,
}

impl ZeroEx {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(&config.api_key)?;
        api_key.set_sensitive(true);
        headers.insert("0x-api-key", api_key);
        headers.insert("0x-version", HeaderValue::from_static("v2"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            price_url: util::url::join(&config.endpoint, Endpoint::Price.path())?,
            quote_url: util::url::join(&config.endpoint, Endpoint::Quote.path())?,
            chain_id: config.chain_id,
            slippage_bps: config.slippage_bps,
            retry: config.retry,
        })
    }

    async fn request(
        &self,
        endpoint: Endpoint,
        order: &swap::Order,
    ) -> Result<swap::Quote, Error> {
        let url = match endpoint {
            Endpoint::Price => &self.price_url,
            Endpoint::Quote => &self.quote_url,
        };
        let query = dto::Query::new(self.chain_id, self.slippage_bps, order);
        let result = self
            .retry
            .run(endpoint.name(), |_| true, || async {
                let quote = util::http::roundtrip!(
                    <dto::Quote, dto::Error>;
                    self.client.get(url.clone()).query(&query)
                )
                .await?;
                let quote = quote.into_domain(order)?;
                if matches!(endpoint, Endpoint::Quote) && quote.transaction.is_none() {
                    return Err(Error::MissingField("transaction"));
                }
                Ok::<_, Error>(quote)
            })
            .await;
        if let Err(err) = &result {
            observe::quote_unavailable(endpoint.name(), order, self.retry.attempts, err);
        }
        result
    }
}

#[async_trait::async_trait]
impl Aggregator for ZeroEx {
    async fn price(&self, order: &swap::Order) -> Result<swap::Quote, Error> {
        let mut quote = self.request(Endpoint::Price, order).await?;
        // The indicative price must never be executed.
        quote.transaction = None;
        Ok(quote)
    }

    async fn quote(&self, order: &swap::Order) -> Result<swap::Quote, Error> {
        self.request(Endpoint::Quote, order).await
    }
}

/// The aggregator has no usable quote for the order. Always worth retrying
/// later.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no liquidity available")]
    NoLiquidity,
    #[error("quote is missing {0}")]
    MissingField(&'static str),
    #[error("api error {name}: {message}")]
    Api { name: String, message: String },
    #[error(transparent)]
    Http(util::http::Error),
}

impl From<RoundtripError<dto::Error>> for Error {
    fn from(err: RoundtripError<dto::Error>) -> Self {
        match err {
            RoundtripError::Http(err) => Self::Http(err),
            RoundtripError::Api(err) => Self::Api {
                name: err.name,
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            domain::eth::{Address, TokenAddress, U256},
            tests::mock::http::{Expectation, setup},
        },
        alloy::primitives::address,
        axum::http::StatusCode,
        serde_json::json,
    };

    const SPENDER: Address = address!("0x0000000000001fF3684f28c67538d4D072C22734");

    fn order() -> swap::Order {
        swap::Order {
            sell: TokenAddress(address!("0x4200000000000000000000000000000000000006")),
            buy: TokenAddress(address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913")),
            amount: U256::from(1_000_000_000_000_000_000u128),
            taker: address!("0x1111111111111111111111111111111111111111"),
        }
    }

    fn zeroex(url: Url) -> ZeroEx {
        ZeroEx::new(Config {
            endpoint: url,
            api_key: "secret".to_owned(),
            chain_id: eth::ChainId(8453),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            timeout: DEFAULT_TIMEOUT,
            retry: retry::Policy::fixed(3, Duration::ZERO),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_price_with_allowance_issue() {
        let server = setup(vec![Expectation::get(
            "/swap/allowance-holder/price",
            json!({
                "liquidityAvailable": true,
                "buyAmount": "2500000000",
                "sellAmount": "1000000000000000000",
                "issues": {
                    "allowance": { "actual": "0", "spender": SPENDER },
                    "balance": null,
                },
            }),
        )])
        .await;

        let quote = zeroex(server.url()).price(&order()).await.unwrap();
        assert_eq!(quote.buy_amount, U256::from(2_500_000_000u64));
        assert_eq!(quote.allowance_target, Some(SPENDER));
        assert!(quote.transaction.is_none());

        let request = &server.requests()[0];
        assert_eq!(request.headers["0x-api-key"], "secret");
        assert_eq!(request.headers["0x-version"], "v2");
        let query = request.query.clone().unwrap();
        for param in [
            "chainId=8453",
            "sellAmount=1000000000000000000",
            "slippageBps=50",
            "intentOnFilling=true",
            "enableSlippageProtection=true",
        ] {
            assert!(query.contains(param), "{param} missing from {query}");
        }
        server.assert_done();
    }

    #[tokio::test]
    async fn retries_failed_quotes() {
        let server = setup(vec![
            Expectation::get(
                "/swap/allowance-holder/quote",
                json!({ "name": "INTERNAL_SERVER_ERROR", "message": "try again" }),
            )
            .with_status(StatusCode::SERVICE_UNAVAILABLE),
            Expectation::get(
                "/swap/allowance-holder/quote",
                json!({
                    "liquidityAvailable": true,
                    "buyAmount": "2500000000",
                    "issues": { "allowance": null },
                    "transaction": {
                        "to": SPENDER,
                        "data": "0xdeadbeef",
                        "gas": "210000",
                        "gasPrice": "1000000",
                        "value": "0",
                    },
                }),
            ),
        ])
        .await;

        let quote = zeroex(server.url()).quote(&order()).await.unwrap();
        let transaction = quote.transaction.unwrap();
        assert_eq!(transaction.to, SPENDER);
        assert_eq!(transaction.data.as_ref(), [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(transaction.gas, Some(eth::Gas(210_000)));
        assert_eq!(quote.allowance_target, None);
        server.assert_done();
    }

    #[tokio::test]
    async fn no_liquidity_is_unavailable_after_retries() {
        let no_liquidity = json!({ "liquidityAvailable": false, "zid": "0x1" });
        let server = setup(vec![
            Expectation::get("/swap/allowance-holder/quote", no_liquidity.clone()),
            Expectation::get("/swap/allowance-holder/quote", no_liquidity.clone()),
            Expectation::get("/swap/allowance-holder/quote", no_liquidity),
        ])
        .await;

        let err = zeroex(server.url()).quote(&order()).await.unwrap_err();
        assert!(matches!(err, Error::NoLiquidity));
        server.assert_done();
    }
}
