//! A mock HTTP server serving a fixed list of expected requests in order.
//! Used to test the clients of external APIs.

use {
    axum::{
        extract::State,
        http::{HeaderMap, Method, StatusCode, Uri},
        response::Json,
    },
    std::{
        collections::VecDeque,
        net::SocketAddr,
        sync::{Arc, Mutex},
    },
};

#[derive(Debug, Clone)]
pub enum Expectation {
    Get {
        path: String,
        status: StatusCode,
        res: serde_json::Value,
    },
    Post {
        path: String,
        req: serde_json::Value,
        status: StatusCode,
        res: serde_json::Value,
    },
}

impl Expectation {
    pub fn get(path: &str, res: serde_json::Value) -> Self {
        Self::Get {
            path: path.to_owned(),
            status: StatusCode::OK,
            res,
        }
    }

    pub fn post(path: &str, req: serde_json::Value, res: serde_json::Value) -> Self {
        Self::Post {
            path: path.to_owned(),
            req,
            status: StatusCode::OK,
            res,
        }
    }

    pub fn with_status(mut self, code: StatusCode) -> Self {
        match &mut self {
            Self::Get { status, .. } | Self::Post { status, .. } => *status = code,
        }
        self
    }
}

/// A request the server received.
#[derive(Debug, Clone)]
pub struct Request {
    pub query: Option<String>,
    pub headers: HeaderMap,
}

pub struct Server {
    pub addr: SocketAddr,
    state: Shared,
}

impl Server {
    pub fn url(&self) -> url::Url {
        format!("http://{}/", self.addr).parse().unwrap()
    }

    /// The requests received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.state.0.lock().unwrap().received.clone()
    }

    /// Asserts that every expectation was served.
    pub fn assert_done(&self) {
        let state = self.state.0.lock().unwrap();
        assert!(
            state.expected.is_empty(),
            "unserved expectations: {:?}",
            state.expected
        );
    }
}

#[derive(Debug, Default)]
struct Inner {
    expected: VecDeque<Expectation>,
    received: Vec<Request>,
}

#[derive(Debug, Clone, Default)]
struct Shared(Arc<Mutex<Inner>>);

/// Set up a mock external API.
pub async fn setup(expectations: Vec<Expectation>) -> Server {
    let state = Shared::default();
    state.0.lock().unwrap().expected = expectations.into();

    let app = axum::Router::new()
        .route("/{*path}", axum::routing::any(handle))
        .route("/", axum::routing::any(handle))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    Server { addr, state }
}

async fn handle(
    State(state): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<serde_json::Value>) {
    let mut state = state.0.lock().unwrap();
    state.received.push(Request {
        query: uri.query().map(str::to_owned),
        headers,
    });
    let expectation = state
        .expected
        .pop_front()
        .unwrap_or_else(|| panic!("got another {method} request, but didn't expect any more"));

    match expectation {
        Expectation::Get { path, status, res } => {
            assert_eq!(method, Method::GET, "expected GET request");
            assert_eq!(uri.path(), path, "GET request has unexpected path");
            (status, Json(res))
        }
        Expectation::Post {
            path,
            req,
            status,
            res,
        } => {
            assert_eq!(method, Method::POST, "expected POST request");
            assert_eq!(uri.path(), path, "POST request has unexpected path");
            let body: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(body, req, "POST request has unexpected body");
            (status, Json(res))
        }
    }
}
