use crate::error::{ConfigError, CoreError};
use serde::Deserialize;
use std::path::Path;

fn default_database_url() -> String {
    "sqlite://banter.db".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8001".to_string()
}

fn default_user_agent() -> String {
    "banter/0.1".to_string()
}

fn default_polling_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_polling_interval")]
    pub polling_interval_minutes: u64,
    pub platform: PlatformConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    pub bearer_token: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl AppConfig {
    /// Environment-first configuration; TWITTER_BEARER_TOKEN is the only
    /// required variable.
    pub fn from_env() -> Result<Self, CoreError> {
        let bearer_token = std::env::var("TWITTER_BEARER_TOKEN").map_err(|_| {
            ConfigError::MissingEnvironmentVariable {
                var_name: "TWITTER_BEARER_TOKEN".to_string(),
            }
        })?;

        let polling_interval_minutes = match std::env::var("BANTER_POLL_INTERVAL_MINUTES") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                field: "BANTER_POLL_INTERVAL_MINUTES".to_string(),
                value: raw,
            })?,
            Err(_) => default_polling_interval(),
        };

        let config = Self {
            database_url: std::env::var("BANTER_DATABASE_URL")
                .unwrap_or_else(|_| default_database_url()),
            bind_addr: std::env::var("BANTER_BIND_ADDR").unwrap_or_else(|_| default_bind_addr()),
            polling_interval_minutes,
            platform: PlatformConfig {
                bearer_token,
                user_agent: std::env::var("BANTER_USER_AGENT")
                    .unwrap_or_else(|_| default_user_agent()),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        let config: Self = toml::from_str(&raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.platform.bearer_token.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "platform.bearer_token".to_string(),
            });
        }
        if self.polling_interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "polling_interval_minutes".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_round_trip_with_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [platform]
            bearer_token = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.database_url, "sqlite://banter.db");
        assert_eq!(config.bind_addr, "127.0.0.1:8001");
        assert_eq!(config.polling_interval_minutes, 5);
        assert_eq!(config.platform.user_agent, "banter/0.1");
    }

    #[test]
    fn test_validation_rejects_blank_token() {
        let config: AppConfig = toml::from_str(
            r#"
            [platform]
            bearer_token = "  "
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config: AppConfig = toml::from_str(
            r#"
            polling_interval_minutes = 0

            [platform]
            bearer_token = "secret"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
