//! Error types for the webhook handler and the record backend.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{Category, ParentId};

/// Errors returned by the record backend.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// Transport failure (connect, timeout, TLS, ...).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status.
    #[error("backend returned status {status}")]
    Status { status: u16, body: String },

    /// Response body was not the expected JSON.
    #[error("failed to decode backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RecordStoreError {
    /// HTTP status reported by the backend, when there was one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Decode(_) => None,
        }
    }

    /// Response body reported by the backend, when there was one.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

/// Errors surfaced by the webhook handler.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,

    #[error("No parent_id provided in the webhook event")]
    MissingParentId,

    #[error("parent_id contains control characters")]
    InvalidParentId(ParentId),

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),

    #[error("search request for {category} failed: {source}")]
    SearchFailed {
        category: Category,
        #[source]
        source: RecordStoreError,
    },

    #[error("update request for parent {parent_id} failed: {source}")]
    UpdateFailed {
        parent_id: ParentId,
        #[source]
        source: RecordStoreError,
    },

    #[error("unexpected failure: {0}")]
    UnexpectedFailure(String),
}

impl WebhookError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingParentId | Self::InvalidParentId(_) => StatusCode::BAD_REQUEST,
            Self::MalformedPayload(_)
            | Self::SearchFailed { .. }
            | Self::UpdateFailed { .. }
            | Self::UnexpectedFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status == StatusCode::INTERNAL_SERVER_ERROR {
            json!({
                "error": "Internal Server Error",
                "detail": self.to_string(),
            })
        } else {
            json!({ "error": self.to_string() })
        };
        (status, Json(body)).into_response()
    }
}
