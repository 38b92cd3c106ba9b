use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Deployment settings for the whole application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub debug: bool,
    /// Host headers the gateway will serve. Empty means any.
    pub allowed_hosts: Vec<String>,
    /// URL segment the admin routes are mounted under.
    pub admin_url: String,
    /// Bearer token guarding the admin routes. Unset disables them.
    pub admin_token: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Explicit database file. Defaults to `donations.db` under the data dir.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            allowed_hosts: Vec::new(),
            admin_url: "admin".to_string(),
            admin_token: None,
            data_dir: None,
            database: DatabaseConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl AppConfig {
    /// Directory for locally persisted data, created on demand by the caller.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".edonations").join("data")
        })
    }

    pub fn resolved_database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| self.resolved_data_dir().join("donations.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_local_dev_setup() {
        let config = AppConfig::default();
        assert!(!config.debug);
        assert!(config.allowed_hosts.is_empty());
        assert_eq!(config.admin_url, "admin");
        assert!(config.admin_token.is_none());
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn explicit_database_path_wins() {
        let mut config = AppConfig::default();
        config.database.path = Some(PathBuf::from("/var/lib/edonations/db.sqlite3"));
        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/var/lib/edonations/db.sqlite3")
        );
    }

    #[test]
    fn database_path_falls_back_to_data_dir() {
        let mut config = AppConfig::default();
        config.data_dir = Some(PathBuf::from("/tmp/edon"));
        assert_eq!(
            config.resolved_database_path(),
            PathBuf::from("/tmp/edon/donations.db")
        );
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            debug = true
            allowed_hosts = ["donations.example.org"]

            [gateway]
            port = 9000
            "#,
        )
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.allowed_hosts, vec!["donations.example.org"]);
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.admin_url, "admin");
    }
}
