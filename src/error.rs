use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::envelope::Envelope;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
pub const NO_AUTH_HEADER_MESSAGE: &str = "No authorization header";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Upstream answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Upstream { status: StatusCode, message: String },
    /// Network, decode or other transport failure talking to upstream.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("no authorization header")]
    AuthMissing,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upstream { status, .. } => *status,
            Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::AuthMissing => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn envelope(&self) -> Envelope {
        match self {
            Self::Upstream { message, .. } => Envelope::failure(message.clone()),
            Self::Transport(_) => Envelope::failure(INTERNAL_ERROR_MESSAGE),
            Self::AuthMissing => Envelope::failure(NO_AUTH_HEADER_MESSAGE),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Transport(format!("connection failed: {}", err))
        } else if err.is_decode() {
            Self::Transport(format!("malformed upstream body: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Transport(detail) => error!(%status, error = %detail, "request failed"),
            other => warn!(%status, error = %other, "request rejected"),
        }
        (status, Json(self.envelope())).into_response()
    }
}
