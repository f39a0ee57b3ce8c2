//! Connection configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, Result};

/// Connection settings for a PostgreSQL-compatible store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// Connection pool size (default: 8).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_pool_size() -> usize {
    8
}

impl ConnectionConfig {
    /// Load and validate a configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: ConnectionConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(AdapterError::Config("host is required".into()));
        }
        if self.database.is_empty() {
            return Err(AdapterError::Config("database is required".into()));
        }
        if self.user.is_empty() {
            return Err(AdapterError::Config("user is required".into()));
        }
        if self.pool_size == 0 {
            return Err(AdapterError::Config("pool_size must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            host: "localhost".into(),
            port: 5432,
            database: "app".into(),
            user: "app".into(),
            password: "secret".into(),
            pool_size: 8,
        }
    }

    #[test]
    fn test_defaults_from_yaml() {
        let parsed: ConnectionConfig =
            serde_yaml::from_str("database: app\nuser: app\n").unwrap();
        assert_eq!(parsed.host, "localhost");
        assert_eq!(parsed.port, 5432);
        assert_eq!(parsed.pool_size, 8);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_fields() {
        let mut bad = config();
        bad.database = String::new();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.pool_size = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_password_not_serialized() {
        let json = serde_json::to_string(&config()).unwrap();
        assert!(!json.contains("secret"), "password was serialized: {}", json);
    }
}
