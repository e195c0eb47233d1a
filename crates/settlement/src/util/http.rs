//! Module containing utilities for round-tripping HTTP requests.
//!
//! The helper is a macro so that the log events keep the module path of the
//! callsite instead of all HTTP requests appearing to come from this module.

use {
    reqwest::{Method, RequestBuilder, StatusCode, Url},
    serde::{Deserialize, de::DeserializeOwned},
    std::str,
};

/// Roundtrip an HTTP request. This will `TRACE` log the request and responses.
///
/// Thin wrapper around [`roundtrip_internal`] so that logs are attributed to
/// the callsite, which allows filtering per client module.
macro_rules! roundtrip {
    (<$t:ty, $e:ty>; $request:expr) => {
        $crate::util::http::roundtrip_internal::<$t, $e>(
            $request,
            |method, url, body, message| {
                if let Some(body) = body {
                    tracing::trace!(%method, %url, %body, "{message}");
                } else {
                    tracing::trace!(%method, %url, "{message}");
                }
            },
            |status, body, message| {
                tracing::trace!(%status, %body, "{message}");
            },
        )
    };
    ($request:expr) => {
        $crate::util::http::roundtrip!(<_, _>; $request)
    };
}
pub(crate) use roundtrip;

#[doc(hidden)]
pub async fn roundtrip_internal<T, E>(
    request: RequestBuilder,
    log_request: impl FnOnce(&Method, &Url, Option<&str>, &str),
    log_response: impl FnOnce(StatusCode, &str, &str),
) -> Result<T, RoundtripError<E>>
where
    T: DeserializeOwned,
    E: DeserializeOwned,
{
    let (client, request) = request.build_split();
    let request = request.map_err(Error::from)?;

    let body = request
        .body()
        .and_then(|body| str::from_utf8(body.as_bytes()?).ok());

    log_request(
        request.method(),
        request.url(),
        body,
        "sending HTTP request",
    );
    let response = client.execute(request).await.map_err(Error::from)?;

    let status = response.status();
    let body = response.text().await.map_err(Error::from)?;
    log_response(status, &body, "received HTTP response");

    if !status.is_success() {
        return Err(match serde_json::from_str(&body) {
            Ok(err) => RoundtripError::Api(err),
            Err(_) => RoundtripError::Http(Error::Status(status, body)),
        });
    }
    match serde_json::from_str::<T>(&body) {
        Ok(data) => Ok(data),
        // A success status with a body that is not the expected data, the
        // API may still have returned a well-formed error.
        Err(err) => Err(serde_json::from_str(&body)
            .map(RoundtripError::Api)
            .unwrap_or(RoundtripError::Http(Error::Json(err)))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The response body could not be parsed into the expected type.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Protocol level failure: networking issue, timeout or a misbehaving
    /// server.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// The response has a non-2xx status and no recognizable error body.
    #[error("HTTP {0}: {1}")]
    Status(StatusCode, String),
}

impl From<RoundtripError<Never>> for Error {
    fn from(value: RoundtripError<Never>) -> Self {
        match value {
            RoundtripError::Http(err) => err,
            RoundtripError::Api(never) => match never {},
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoundtripError<E> {
    #[error(transparent)]
    Http(#[from] Error),
    #[error("API error")]
    Api(E),
}

/// Error body type for APIs that have no structured errors.
#[derive(Debug, Deserialize)]
pub enum Never {}
