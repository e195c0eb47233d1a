//! Client of the web application's internal endpoint that records the final
//! state of an ended auction in its database.

use {
    crate::{
        domain::{auction, eth},
        util::{self, http::Never},
    },
    serde::{Deserialize, Serialize},
    serde_with::{DisplayFromStr, serde_as},
    std::time::Duration,
    url::Url,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync {
    /// Marks the auction as ended and records its final bidders.
    async fn reconcile(&self, id: auction::Id, bidders: &[auction::Bidder]) -> Result<(), Error>;
}

pub struct HttpReconciler {
    client: reqwest::Client,
    url: Url,
    secret: String,
}

impl HttpReconciler {
    pub fn new(url: Url, secret: String, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            url,
            secret,
        })
    }
}

#[async_trait::async_trait]
impl Reconciler for HttpReconciler {
    async fn reconcile(&self, id: auction::Id, bidders: &[auction::Bidder]) -> Result<(), Error> {
        let body = dto::Request::new(id, bidders);
        let response: dto::Response = util::http::roundtrip!(
            <dto::Response, Never>;
            self.client
                .post(self.url.clone())
                .bearer_auth(&self.secret)
                .json(&body)
        )
        .await
        .map_err(util::http::Error::from)?;
        if !response.success {
            return Err(Error::Rejected(response.message.unwrap_or_default()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reconciliation rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Http(#[from] util::http::Error),
}

mod dto {
    use super::*;

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Request {
        pub auction_id: auction::Id,
        pub bidders: Vec<Bidder>,
    }

    #[serde_as]
    #[derive(Debug, Serialize)]
    pub struct Bidder {
        pub wallet: eth::Address,
        #[serde_as(as = "DisplayFromStr")]
        pub amount: eth::U256,
        pub identity: String,
    }

    impl Request {
        pub fn new(id: auction::Id, bidders: &[auction::Bidder]) -> Self {
            Self {
                auction_id: id,
                bidders: bidders
                    .iter()
                    .map(|bidder| Bidder {
                        wallet: bidder.wallet,
                        amount: bidder.amount,
                        identity: bidder.identity.clone(),
                    })
                    .collect(),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct Response {
        pub success: bool,
        pub message: Option<String>,
    }
}
