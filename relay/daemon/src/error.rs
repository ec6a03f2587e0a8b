//! HTTP error mapping
//!
//! Every relay failure leaves the daemon as a status code plus a JSON body of
//! the form `{"error": "..."}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, info, warn};

use relay_core::RelayError;

/// Non-standard status used when the caller gave up on the request
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Error returned by request handlers
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub RelayError);

impl ApiError {
    /// Status code for the wrapped error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::UpstreamRequestFailed { .. } => StatusCode::BAD_GATEWAY,
            RelayError::StreamAborted => {
                StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
            }
            RelayError::MalformedPersistedState(_)
            | RelayError::ExportFailed(_)
            | RelayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(RelayError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            RelayError::Validation(_) | RelayError::StreamAborted => {
                info!(status = status.as_u16(), error = %self.0, "Request rejected");
            }
            RelayError::UpstreamRequestFailed { .. } | RelayError::ExportFailed(_) => {
                warn!(status = status.as_u16(), error = %self.0, "Upstream failure");
            }
            RelayError::MalformedPersistedState(_) | RelayError::Config(_) => {
                error!(status = status.as_u16(), error = %self.0, "Relay misconfigured");
            }
        }

        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
