use crate::keystore::KeystoreService;
use crate::provider::ProviderFactory;
use std::sync::Arc;
use tracing::Span;

/// Shared application state
pub struct AppState {
    pub keystores: Arc<dyn KeystoreService>,
    pub providers: Arc<ProviderFactory>,
    /// Host used in Location headers when a request carries none
    pub public_host: String,
    /// Parent of every request span
    pub span: Span,
}

impl AppState {
    pub fn new(
        keystores: Arc<dyn KeystoreService>,
        providers: Arc<ProviderFactory>,
        public_host: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            keystores,
            providers,
            public_host: public_host.into(),
            span,
        }
    }
}
