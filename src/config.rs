use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// sqlite url, or `memory` for a volatile in-process store
    pub database: String,
    pub certificate_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_dir: Option<PathBuf>,
    pub session_days: i64,
    /// Compare-and-swap attempts on a student record before giving up.
    pub max_save_retries: usize,
    /// Accounts registered with these emails become admins.
    pub admin_emails: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "sqlite://database/learn.db?mode=rwc".to_string(),
            certificate_dir: PathBuf::from("certificates"),
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_dir: None,
            session_days: 5,
            max_save_retries: 8,
            admin_emails: Vec::new(),
        }
    }
}

impl Config {
    /// Read a TOML config file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        Ok(config)
    }
}
