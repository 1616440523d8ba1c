//! Environment Configuration
//!
//! Typed readers for environment variables. Every reader takes a default;
//! a missing or empty variable yields the default, and a value that fails to
//! parse yields the default plus a warning so a typo never aborts startup.
//! Use [`env_required`] for values with no sensible default.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is required")]
    Missing(String),

    #[error("environment variable {key} is invalid: {reason}")]
    Invalid { key: String, reason: String },
}

/// Raw value, `None` when unset or empty
fn raw(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn env_string(key: &str, default: &str) -> String {
    raw(key).unwrap_or_else(|| default.to_string())
}

pub fn env_required(key: &str) -> Result<String, ConfigError> {
    raw(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

/// Parse any `FromStr` value
///
/// ```
/// use platform::config::env_parse;
/// let port: u16 = env_parse("PLATFORM_DOCTEST_UNSET_PORT", 8000);
/// assert_eq!(port, 8000);
/// ```
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw(key) {
        None => default,
        Some(value) => match value.trim().parse::<T>() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(key = %key, value = %value, error = %e, "Invalid env value, using default");
                default
            }
        },
    }
}

/// Accepts `1/t/true/0/f/false` in any case
pub fn env_bool(key: &str, default: bool) -> bool {
    match raw(key) {
        None => default,
        Some(value) => parse_bool(&value).unwrap_or_else(|| {
            tracing::warn!(key = %key, value = %value, "Invalid boolean env value, using default");
            default
        }),
    }
}

/// Durations such as `500ms`, `1s`, `5m`, `1h`; a bare number means seconds
pub fn env_duration(key: &str, default: Duration) -> Duration {
    match raw(key) {
        None => default,
        Some(value) => parse_duration(&value).unwrap_or_else(|| {
            tracing::warn!(key = %key, value = %value, "Invalid duration env value, using default");
            default
        }),
    }
}

/// Comma-separated list; blank items are skipped
pub fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match raw(key) {
        None => default.iter().map(|s| s.to_string()).collect(),
        Some(value) => value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);
    let amount: u64 = digits.parse().ok()?;

    match unit.trim() {
        "" | "s" => Some(Duration::from_secs(amount)),
        "ms" => Some(Duration::from_millis(amount)),
        "m" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(amount.checked_mul(3600)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(key: &str, value: &str) {
        // SAFETY: each test uses its own variable names
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    fn test_string_default_when_unset_or_empty() {
        assert_eq!(env_string("PLATFORM_TEST_STR_UNSET", "fallback"), "fallback");
        set("PLATFORM_TEST_STR_EMPTY", "  ");
        assert_eq!(env_string("PLATFORM_TEST_STR_EMPTY", "fallback"), "fallback");
        set("PLATFORM_TEST_STR_SET", "mini_crm");
        assert_eq!(env_string("PLATFORM_TEST_STR_SET", "fallback"), "mini_crm");
    }

    #[test]
    fn test_required() {
        assert!(matches!(
            env_required("PLATFORM_TEST_REQ_UNSET"),
            Err(ConfigError::Missing(_))
        ));
        set("PLATFORM_TEST_REQ_SET", "postgres://localhost/crm");
        assert_eq!(
            env_required("PLATFORM_TEST_REQ_SET").unwrap(),
            "postgres://localhost/crm"
        );
    }

    #[test]
    fn test_parse_falls_back_on_garbage() {
        set("PLATFORM_TEST_PORT", "not-a-port");
        assert_eq!(env_parse::<u16>("PLATFORM_TEST_PORT", 8000), 8000);
        set("PLATFORM_TEST_PORT_OK", " 9000 ");
        assert_eq!(env_parse::<u16>("PLATFORM_TEST_PORT_OK", 8000), 9000);
    }

    #[test]
    fn test_bool_forms() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("t"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("False"), Some(false));
        assert_eq!(parse_bool("yes"), None);

        set("PLATFORM_TEST_BOOL", "maybe");
        assert!(env_bool("PLATFORM_TEST_BOOL", true));
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("1s"), Some(Duration::from_secs(1)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("1d"), None);
        assert_eq!(parse_duration("ms"), None);
    }

    #[test]
    fn test_list() {
        assert_eq!(env_list("PLATFORM_TEST_LIST_UNSET", &["a"]), vec!["a"]);
        set("PLATFORM_TEST_LIST", "openid, email,,profile");
        assert_eq!(
            env_list("PLATFORM_TEST_LIST", &[]),
            vec!["openid", "email", "profile"]
        );
    }
}
