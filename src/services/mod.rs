pub mod intent_manager;
pub mod notifications;
pub mod reconciliation;
pub mod transition;
pub mod webhook_processor;

pub use intent_manager::IntentManager;
pub use notifications::{LogNotifier, NotificationDispatcher, Notifier};
pub use reconciliation::ReconciliationSync;
pub use transition::{Outcome, TransitionEngine, TransitionResult};
pub use webhook_processor::{WebhookDisposition, WebhookProcessor};
