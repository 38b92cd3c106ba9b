use std::path::{Path, PathBuf};

use edonations_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

const CONFIG_PATH_VAR: &str = "EDONATIONS_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "edonations.toml";

/// Loads settings from an optional TOML file, then applies `EDONATIONS_*`
/// environment overrides on top. Secrets stay out of the file and come in
/// through the environment, `.env` included.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<AppConfig> {
        // Best-effort: a missing .env file is not an error.
        let _ = dotenvy::dotenv();

        let path = std::env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<AppConfig> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
            let config = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
            info!("loaded config from {}", path.display());
            config
        } else {
            debug!("no config file at {}, using defaults", path.display());
            AppConfig::default()
        };

        apply_overrides(&mut config, |key| std::env::var(key).ok())?;
        Ok(config)
    }
}

/// Apply `EDONATIONS_*` overrides from `lookup`. Split out from the process
/// environment so it can be tested without mutating global state.
fn apply_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("EDONATIONS_DEBUG") {
        config.debug = parse_bool("EDONATIONS_DEBUG", &v)?;
    }
    if let Some(v) = lookup("EDONATIONS_ALLOWED_HOSTS") {
        config.allowed_hosts = v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(v) = lookup("EDONATIONS_ADMIN_URL") {
        config.admin_url = v;
    }
    if let Some(v) = lookup("EDONATIONS_ADMIN_TOKEN") {
        config.admin_token = Some(v);
    }
    if let Some(v) = lookup("EDONATIONS_DATA_DIR") {
        config.data_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("EDONATIONS_DATABASE_PATH") {
        config.database.path = Some(PathBuf::from(v));
    }
    if let Some(v) = lookup("EDONATIONS_GATEWAY_HOST") {
        config.gateway.host = v;
    }
    if let Some(v) = lookup("EDONATIONS_GATEWAY_PORT") {
        config.gateway.port = v
            .parse()
            .map_err(|_| Error::Config(format!("EDONATIONS_GATEWAY_PORT is not a port: {v:?}")))?;
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key} is not a boolean: {other:?}"))),
    }
}
