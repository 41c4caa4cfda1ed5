use std::{env, fs, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::pagination::PageLimits;

pub const DEFAULT_PIN_LIMIT: u32 = 9;
pub const DEFAULT_PAGE_SIZE: u32 = 24;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    /// Maximum number of sites a single user may keep pinned.
    #[serde(default = "default_pin_limit")]
    pub pin_limit: u32,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// User ids that can see and manage every site.
    #[serde(default)]
    pub super_admin_ids: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            database_path: default_database_path(),
            database_max_connections: default_database_max_connections(),
            pin_limit: default_pin_limit(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            super_admin_ids: Vec::new(),
        }
    }
}

impl AppConfig {
    const CONFIG_ENV: &'static str = "STATWELL_CONFIG_FILE";
    const BIND_ADDRESS_ENV: &'static str = "STATWELL_BIND_ADDRESS";
    const DATABASE_PATH_ENV: &'static str = "STATWELL_DATABASE_PATH";
    const DATABASE_MAX_CONNECTIONS_ENV: &'static str = "STATWELL_DATABASE_MAX_CONNECTIONS";
    const PIN_LIMIT_ENV: &'static str = "STATWELL_PIN_LIMIT";
    const SUPER_ADMIN_IDS_ENV: &'static str = "STATWELL_SUPER_ADMIN_IDS";

    /// Load configuration from defaults layered with optional config files and
    /// environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    pub fn load_with(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::resolve_config_path(config_path)? {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            config = Self::from_toml(&contents)
                .with_context(|| format!("invalid config file: {}", path.display()))?;
        }

        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|err| anyhow!(err))
    }

    pub fn is_super_admin(&self, user_id: &str) -> bool {
        self.super_admin_ids.iter().any(|id| id == user_id)
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = env::var(Self::BIND_ADDRESS_ENV) {
            self.bind_address = addr
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::BIND_ADDRESS_ENV))?;
        }

        if let Ok(path) = env::var(Self::DATABASE_PATH_ENV) {
            self.database_path = path;
        }

        if let Ok(value) = env::var(Self::DATABASE_MAX_CONNECTIONS_ENV) {
            self.database_max_connections = value.trim().parse().with_context(|| {
                format!("invalid {name}", name = Self::DATABASE_MAX_CONNECTIONS_ENV)
            })?;
        }

        if let Ok(value) = env::var(Self::PIN_LIMIT_ENV) {
            self.pin_limit = value
                .trim()
                .parse()
                .with_context(|| format!("invalid {name}", name = Self::PIN_LIMIT_ENV))?;
        }

        if let Ok(value) = env::var(Self::SUPER_ADMIN_IDS_ENV) {
            self.super_admin_ids = parse_id_list(&value);
        }

        Ok(())
    }

    fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            return Self::validate_path(path);
        }

        if let Ok(path) = env::var(Self::CONFIG_ENV) {
            return Self::validate_path(PathBuf::from(path));
        }

        let mut candidates = vec![PathBuf::from("statwell.toml")];
        if let Some(dir) = Self::default_config_dir() {
            candidates.push(dir.join("config.toml"));
        }

        for candidate in candidates {
            if candidate.exists() {
                return Ok(Some(candidate));
            }
        }

        Ok(None)
    }

    fn validate_path(path: PathBuf) -> Result<Option<PathBuf>> {
        if path.exists() {
            Ok(Some(path))
        } else {
            Err(anyhow!(
                "configuration file does not exist: {}",
                path.display()
            ))
        }
    }

    fn default_config_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".statwell"))
    }
}

fn parse_id_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8082))
}

fn default_database_path() -> String {
    "./data/statwell.db".to_owned()
}

fn default_database_max_connections() -> u32 {
    4
}

fn default_pin_limit() -> u32 {
    DEFAULT_PIN_LIMIT
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    DEFAULT_MAX_PAGE_SIZE
}

fn home_dir() -> Option<PathBuf> {
    if let Some(path) = env::var_os("HOME") {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = env::var_os("USERPROFILE") {
        return Some(PathBuf::from(path));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_directory_contract() {
        let config = AppConfig::default();
        assert_eq!(config.pin_limit, 9);
        assert_eq!(config.default_page_size, 24);
        assert_eq!(config.max_page_size, 100);
        assert!(config.super_admin_ids.is_empty());
    }

    #[test]
    fn toml_overrides_only_listed_fields() {
        let config = AppConfig::from_toml(
            r#"
            database_path = "/tmp/statwell.db"
            pin_limit = 3
            super_admin_ids = ["root"]
            "#,
        )
        .expect("parse config");

        assert_eq!(config.database_path, "/tmp/statwell.db");
        assert_eq!(config.pin_limit, 3);
        assert_eq!(config.default_page_size, DEFAULT_PAGE_SIZE);
        assert!(config.is_super_admin("root"));
        assert!(!config.is_super_admin("someone"));
    }

    #[test]
    fn id_list_skips_blank_entries() {
        assert_eq!(parse_id_list(" a, ,b ,,"), vec!["a", "b"]);
    }
}
