//! Server Configuration

use std::fmt;
use std::str::FromStr;

use platform::config::{ConfigError, env_bool, env_list, env_parse, env_required, env_string};
use platform::crypto::verify_secret;
use store::MongoConfig;

/// Run mode from `ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Debug,
    Test,
    Release,
}

impl RunMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RunMode::Debug => "debug",
            RunMode::Test => "test",
            RunMode::Release => "release",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(RunMode::Debug),
            "test" => Ok(RunMode::Test),
            "release" => Ok(RunMode::Release),
            other => Err(ConfigError::Invalid {
                key: "ENV".to_string(),
                reason: format!("expected debug, test or release, got {other}"),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_name: String,
    pub version: String,
    pub port: u16,
    pub run_mode: RunMode,
    pub log_level: String,
    pub enable_pg: bool,
    pub database_url: Option<String>,
    pub enable_mongodb: bool,
    pub mongo: MongoConfig,
    pub secret_key: Option<String>,
    pub cipher_key: Option<String>,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let enable_pg = env_bool("ENABLE_PG", false);
        let database_url = if enable_pg {
            Some(env_required("DATABASE_URL")?)
        } else {
            None
        };

        let secret_key = optional("SECRET_KEY");
        let cipher_key = optional("CIPHER_KEY");

        Ok(Self {
            service_name: env_string("API_SERVICE_NAME", "mini_crm"),
            version: env_string("API_VERSION", "v1.0"),
            port: env_parse("API_PORT", 8000),
            run_mode: env_string("ENV", "debug").parse()?,
            log_level: env_string("LOG_LEVEL", "info"),
            enable_pg,
            database_url,
            enable_mongodb: env_bool("ENABLE_MONGODB", false),
            mongo: MongoConfig::from_env(),
            secret_key,
            cipher_key,
            cors_origins: env_list("CORS_ORIGINS", &["*"]),
        })
    }

    /// A configured `SECRET_KEY` must be `CIPHER_KEY` sealed under itself
    pub fn verify_secret(&self) -> Result<(), ConfigError> {
        let Some(secret) = &self.secret_key else {
            return Ok(());
        };
        let key = self
            .cipher_key
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("CIPHER_KEY".to_string()))?;

        match verify_secret(key.as_bytes(), secret) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ConfigError::Invalid {
                key: "SECRET_KEY".to_string(),
                reason: "secret key was incorrect".to_string(),
            }),
            Err(e) => Err(ConfigError::Invalid {
                key: "SECRET_KEY".to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Default `tracing` filter for this binary and its crates
    pub fn default_log_filter(&self) -> String {
        let level = &self.log_level;
        ["api", "users", "store", "push", "platform", "tower_http"]
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn optional(key: &str) -> Option<String> {
    Some(env_string(key, "")).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::crypto::encrypt_secret;

    fn config() -> AppConfig {
        AppConfig {
            service_name: "mini_crm".to_string(),
            version: "v1.0".to_string(),
            port: 8000,
            run_mode: RunMode::Debug,
            log_level: "debug".to_string(),
            enable_pg: false,
            database_url: None,
            enable_mongodb: false,
            mongo: MongoConfig::default(),
            secret_key: None,
            cipher_key: None,
            cors_origins: vec!["*".to_string()],
        }
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("release".parse::<RunMode>().unwrap(), RunMode::Release);
        assert!(matches!(
            "production".parse::<RunMode>(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_verify_secret() {
        let key = "0123456789ABCDEF";
        let mut cfg = config();
        assert!(cfg.verify_secret().is_ok());

        cfg.secret_key = Some(encrypt_secret(key.as_bytes(), key.as_bytes()).unwrap());
        assert!(matches!(cfg.verify_secret(), Err(ConfigError::Missing(_))));

        cfg.cipher_key = Some(key.to_string());
        assert!(cfg.verify_secret().is_ok());

        cfg.secret_key = Some(encrypt_secret(key.as_bytes(), b"something else").unwrap());
        assert!(cfg.verify_secret().is_err());

        cfg.cipher_key = Some("FEDCBA9876543210".to_string());
        assert!(cfg.verify_secret().is_err());
    }

    #[test]
    fn test_default_log_filter() {
        let filter = config().default_log_filter();
        assert!(filter.starts_with("api=debug,"));
        assert!(filter.contains("tower_http=debug"));
    }
}
