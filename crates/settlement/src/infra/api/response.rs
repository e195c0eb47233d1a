//! The envelope every API response is wrapped in.

use {
    super::error::Kind,
    axum::{Json, http::StatusCode},
    serde::Serialize,
    std::time::Instant,
};

pub type Reply<T> = (StatusCode, Json<Response<T>>);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response<T> {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Kind>,
    execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T> Response<T> {
    pub fn ok(start: Instant, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            execution_time_ms: elapsed_ms(start),
            data: None,
        }
    }

    pub fn failed(start: Instant, kind: Kind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(kind),
            execution_time_ms: elapsed_ms(start),
            data: None,
        }
    }

    pub fn with_data(mut self, data: T) -> Self {
        self.data = Some(data);
        self
    }

    /// Flags a success that didn't go entirely to plan.
    pub fn with_warning(mut self, kind: Kind) -> Self {
        self.error = Some(kind);
        self
    }

    /// Responds with the status of the error kind, or `status` on success.
    pub fn reply(self, status: StatusCode) -> Reply<T> {
        let status = match (self.success, self.error) {
            (false, Some(kind)) => kind.status(),
            _ => status,
        };
        (status, Json(self))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
