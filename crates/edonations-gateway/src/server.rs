use std::sync::Arc;

use edonations_apps::AppRegistry;
use edonations_common::{Error, Result};
use edonations_config::AppConfig;
use edonations_db::{OrganizationSet, SponsorStore};
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// The main gateway server that binds to a port and serves the API.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Apply migrations and serve. A migration failure aborts startup: a
    /// partially migrated schema must never take traffic.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);

        let store = self.open_sponsor_store()?;
        let state = Arc::new(AppState::new(self.config, store));
        let app = build_router(state)?;

        let listener = TcpListener::bind(&addr).await?;
        info!("E-Donations gateway listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Gateway(format!("server error: {e}")))?;

        Ok(())
    }

    fn open_sponsor_store(&self) -> Result<Arc<SponsorStore>> {
        let registry = AppRegistry::with_installed_apps()?;
        for app in registry.installed() {
            info!("installed app: {} ({})", app.name, app.verbose_name);
        }
        let plan = registry.migration_plan()?;

        let db_path = self.config.resolved_database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = SponsorStore::open(&db_path, &plan, OrganizationSet::current())?;
        Ok(Arc::new(store))
    }
}
