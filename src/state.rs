use std::sync::Arc;

use crate::{config::CommerceConfig, notify::Notifier, repository::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub notifier: Arc<dyn Notifier>,
    pub commerce: Arc<CommerceConfig>,
    /// Shared secret expected in `x-webhook-secret`; the webhook is refused when unset.
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(store: Store, notifier: Arc<dyn Notifier>, commerce: CommerceConfig) -> Self {
        Self {
            store,
            notifier,
            commerce: Arc::new(commerce),
            webhook_secret: None,
        }
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.map(Arc::from);
        self
    }
}
