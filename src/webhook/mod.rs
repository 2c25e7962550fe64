//! Mutating admission webhook boundary
//!
//! This module provides the HTTP surface that intercepts Pod create/update
//! operations and injects the configured environment variables and
//! scheduling settings.
//!
//! The split of responsibilities:
//! - Gate: decides whether a pod is eligible for mutation at all
//! - Patch synthesis: builds the JSON patch document for eligible pods
//! - Handler (here): decodes the admission review and assembles the response
//!
//! Handlers hold no per-request state; everything they need is the
//! immutable injection config loaded at startup.

pub mod pod;

use std::sync::Arc;

use axum::{routing::post, Router};

use crate::config::Config;

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Injection configuration loaded once at startup
    pub config: Arc<Config>,
}

impl WebhookState {
    /// Create a new webhook state around the loaded injection config
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

/// Create the webhook router with all mutation endpoints
///
/// Currently supports:
/// - POST /mutate - Mutate Pods with the configured injection fields
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(pod::mutate_handler))
        .with_state(state)
}
