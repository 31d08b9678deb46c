pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod services;

use std::sync::Arc;

use config::Config;
use services::{IntentManager, ReconciliationSync, WebhookProcessor};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub intent_manager: Arc<IntentManager>,
    pub webhook_processor: Arc<WebhookProcessor>,
    pub reconciliation: Arc<ReconciliationSync>,
}

impl AppState {
    pub fn new(
        config: Config,
        intent_manager: IntentManager,
        webhook_processor: WebhookProcessor,
        reconciliation: ReconciliationSync,
    ) -> Self {
        Self {
            config: Arc::new(config),
            intent_manager: Arc::new(intent_manager),
            webhook_processor: Arc::new(webhook_processor),
            reconciliation: Arc::new(reconciliation),
        }
    }
}
