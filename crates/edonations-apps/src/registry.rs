use edonations_common::{Error, Result};
use edonations_db::migrations::{Migration, MigrationPlan};
use edonations_db::schema;
use tracing::info;

/// Declaration of a pluggable application unit: a name the framework knows it
/// by, a label for display, and the schema history it contributes.
#[derive(Debug, Clone, Copy)]
pub struct AppDescriptor {
    pub name: &'static str,
    pub verbose_name: &'static str,
    pub migrations: &'static [Migration],
}

/// The donations app.
pub fn donations_app() -> AppDescriptor {
    AppDescriptor {
        name: "donations",
        verbose_name: "Donations",
        migrations: schema::SPONSOR_MIGRATIONS,
    }
}

/// Ordered registry of installed apps.
///
/// Registration order is the order apps are reported in; the combined
/// migration plan is still sorted by explicit dependency, so registration
/// order never decides schema ordering.
#[derive(Debug, Default)]
pub struct AppRegistry {
    apps: Vec<AppDescriptor>,
}

impl AppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the apps this deployment installs.
    pub fn with_installed_apps() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(donations_app())?;
        Ok(registry)
    }

    pub fn register(&mut self, app: AppDescriptor) -> Result<()> {
        if self.apps.iter().any(|a| a.name == app.name) {
            return Err(Error::Config(format!(
                "app {} is already registered",
                app.name
            )));
        }
        info!("registered app {} ({})", app.name, app.verbose_name);
        self.apps.push(app);
        Ok(())
    }

    pub fn installed(&self) -> &[AppDescriptor] {
        &self.apps
    }

    pub fn get(&self, name: &str) -> Option<&AppDescriptor> {
        self.apps.iter().find(|a| a.name == name)
    }

    /// The combined schema evolution log across every installed app.
    pub fn migration_plan(&self) -> Result<MigrationPlan> {
        let mut plan = MigrationPlan::new(&[])?;
        for app in &self.apps {
            plan = plan.chain(&MigrationPlan::new(app.migrations)?)?;
        }
        Ok(plan)
    }
}
