//! HTTP error responses.
//!
//! Every failure leaves the server as [`ApiError`], which renders a JSON body
//! of the form `{"error": "..."}`. A missing tag format additionally carries
//! `"needsConfiguration": true` so clients can send the user to the tag
//! format page instead of showing a generic failure.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tagseq::{Error, policy::Capability};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error("organisation not found for the current user")]
    OrganisationNotFound,

    #[error("insufficient permissions: {0:?} required")]
    Forbidden(Capability),

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error(transparent)]
    Tag(#[from] Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_configuration: Option<bool>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::OrganisationNotFound => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Tag(err) => match err {
                Error::NotConfigured(_) => StatusCode::NOT_FOUND,
                Error::AlreadyConfigured(_)
                | Error::DuplicateTag { .. }
                | Error::CollisionsExhausted { .. }
                | Error::InvalidTransition { .. } => StatusCode::CONFLICT,
                Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                Error::CounterOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn body(&self) -> ErrorBody {
        let needs_configuration =
            matches!(self, Self::Tag(Error::NotConfigured(_))).then_some(true);
        let error = if self.status().is_server_error() {
            // Backend details stay in the logs.
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        ErrorBody {
            error,
            needs_configuration,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest {
            reason: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
