//! MongoDB Configuration

use std::time::Duration;

use platform::config::{env_bool, env_duration, env_parse, env_string};

/// MongoDB connection configuration
#[derive(Debug, Clone)]
pub struct MongoConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Database holding the user credentials (`authSource`)
    pub auth_database: String,
    pub ssl: bool,
    pub connect_timeout: Duration,
    pub app_name: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 27017,
            database: "fcm".to_string(),
            username: String::new(),
            password: String::new(),
            auth_database: "admin".to_string(),
            ssl: false,
            connect_timeout: Duration::from_secs(10),
            app_name: "mini_crm".to_string(),
        }
    }
}

impl MongoConfig {
    /// Read `MONGODB_*` variables, falling back to [`Default`]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: env_string("MONGODB_HOST", &d.host),
            port: env_parse("MONGODB_PORT", d.port),
            database: env_string("MONGODB_DATABASE", &d.database),
            username: env_string("MONGODB_USERNAME", &d.username),
            password: env_string("MONGODB_PASSWORD", &d.password),
            auth_database: env_string("MONGODB_DEFAULT_AUTH_DB", &d.auth_database),
            ssl: env_bool("MONGODB_SSL", d.ssl),
            connect_timeout: env_duration("MONGODB_CONNECT_TIMEOUT", d.connect_timeout),
            app_name: env_string("API_SERVICE_NAME", &d.app_name),
        }
    }

    /// Connection string without credentials; those are set on the options
    pub fn connection_uri(&self) -> String {
        format!(
            "mongodb://{}:{}/{}?authSource={}&readPreference=primary&ssl={}&directConnection=true",
            self.host, self.port, self.database, self.auth_database, self.ssl
        )
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uri() {
        let uri = MongoConfig::default().connection_uri();
        assert_eq!(
            uri,
            "mongodb://localhost:27017/fcm?authSource=admin&readPreference=primary&ssl=false&directConnection=true"
        );
    }

    #[test]
    fn test_credentials_flag() {
        let mut config = MongoConfig::default();
        assert!(!config.has_credentials());
        config.username = "crm".to_string();
        assert!(config.has_credentials());
    }
}
