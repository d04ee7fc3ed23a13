//! HTTP server for work order webhooks.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::RecordsClient;
use crate::config::{Config, MissingParentPolicy};
use crate::error::WebhookError;
use crate::models::WebhookEvent;
use crate::reconcile::Reconciler;

/// Path the record backend posts change notifications to.
pub const WEBHOOK_PATH: &str = "/api/webhook-listener";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Reconciliation engine bound to the record backend.
    pub reconciler: Reconciler,
}

impl AppState {
    #[must_use]
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// State backed by a [`RecordsClient`] built from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = RecordsClient::from_config(config)?;
        Ok(Self::new(Reconciler::new(Arc::new(client), config.policy)))
    }
}

/// Build the HTTP router for the service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            WEBHOOK_PATH,
            post(webhook_handler).fallback(method_not_allowed),
        )
        // Health check
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Readiness check endpoint.
async fn readiness_check() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}

async fn method_not_allowed() -> WebhookError {
    WebhookError::MethodNotAllowed
}

/// Handle an incoming record change notification.
///
/// This handler:
/// 1. Parses the JSON body (parse failures are internal errors)
/// 2. Applies the missing-parent policy when `parent_id` is absent
///    and rejects ids that cannot be placed in a query
/// 3. Reconciles the parent's due dates and reports them back
pub async fn webhook_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, WebhookError> {
    let request_id = Uuid::new_v4();
    let span = info_span!("webhook", %request_id);

    async move {
        let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
            error!(error = %e, "Failed to parse webhook payload");
            WebhookError::MalformedPayload(e)
        })?;

        let Some(parent_id) = event.parent_id() else {
            return match state.reconciler.policy().missing_parent {
                MissingParentPolicy::Reject => {
                    warn!("Webhook event has no parent_id");
                    Err(WebhookError::MissingParentId)
                }
                MissingParentPolicy::Acknowledge => {
                    info!("Webhook event has no parent_id, nothing to do");
                    Ok((
                        StatusCode::OK,
                        Json(json!({ "message": WebhookError::MissingParentId.to_string() })),
                    )
                        .into_response())
                }
            };
        };

        if parent_id.has_control_chars() {
            warn!(parent_id = ?parent_id.as_str(), "Rejecting parent_id with control characters");
            return Err(WebhookError::InvalidParentId(parent_id));
        }

        info!(%parent_id, "Received webhook event");

        let summary = state.reconciler.reconcile(&parent_id).await.map_err(|e| {
            error!(%parent_id, error = %e, "Error handling webhook event");
            e
        })?;

        Ok(Json(summary).into_response())
    }
    .instrument(span)
    .await
}
