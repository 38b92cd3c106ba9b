use std::sync::Arc;

use edonations_config::AppConfig;
use edonations_db::SponsorStore;

/// Shared application state accessible from all request handlers.
pub struct AppState {
    pub config: AppConfig,
    pub sponsors: Arc<SponsorStore>,
}

impl AppState {
    pub fn new(config: AppConfig, sponsors: Arc<SponsorStore>) -> Self {
        Self { config, sponsors }
    }
}

pub type SharedState = Arc<AppState>;
