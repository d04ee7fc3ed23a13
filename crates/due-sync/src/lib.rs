//! Work-order due date reconciliation service.
//!
//! This crate provides:
//! - Webhook handler that receives parent record change notifications
//! - Record backend client (search + partial update) with bearer auth
//! - Nearest-date reduction policies for maintenance, calibration and
//!   requalification work orders
//! - HTTP server wiring (standalone service)

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Most async backend calls can fail

pub mod client;
pub mod config;
pub mod dates;
pub mod error;
pub mod models;
pub mod query;
pub mod reconcile;
pub mod server;

pub use client::{RecordStore, RecordsClient};
pub use config::{
    Config, ConfigError, MissingParentPolicy, NearestDatePolicy, PatchMode, ReconcilePolicy,
    SearchFailurePolicy,
};
pub use error::{RecordStoreError, WebhookError};
pub use models::*;
pub use reconcile::Reconciler;
