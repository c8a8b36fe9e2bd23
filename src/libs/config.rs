use std::env;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_DB_PATH: &str = "chat_friends.db";
pub const DEFAULT_POOL_SIZE: u32 = 4;
pub const DEFAULT_LOG_FILTER: &str = "chat_friends_lib=info";

const DB_PATH_VAR: &str = "CHAT_FRIENDS_DB_PATH";
const POOL_SIZE_VAR: &str = "CHAT_FRIENDS_POOL_SIZE";
const LOG_VAR: &str = "CHAT_FRIENDS_LOG";
const DEDUPE_VAR: &str = "CHAT_FRIENDS_DEDUPE_ON_OPEN";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub database_path: PathBuf,
    pub pool_size: u32,
    pub log_filter: String,
    /// Run the duplicate-entry cleanup every time a client opens.
    pub dedupe_on_open: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            pool_size: DEFAULT_POOL_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            dedupe_on_open: false,
        }
    }
}

impl ClientConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_path = non_blank(lookup(DB_PATH_VAR))
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let pool_size = match non_blank(lookup(POOL_SIZE_VAR)) {
            Some(raw) => match raw.parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: POOL_SIZE_VAR,
                        value: raw,
                    })
                }
            },
            None => defaults.pool_size,
        };

        let log_filter = non_blank(lookup(LOG_VAR)).unwrap_or(defaults.log_filter);

        let dedupe_on_open = match non_blank(lookup(DEDUPE_VAR)) {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidValue {
                name: DEDUPE_VAR,
                value: raw,
            })?,
            None => defaults.dedupe_on_open,
        };

        Ok(Self {
            database_path,
            pool_size,
            log_filter,
            dedupe_on_open,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn reads_all_variables() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHAT_FRIENDS_DB_PATH", "/tmp/friends.db"),
            ("CHAT_FRIENDS_POOL_SIZE", "8"),
            ("CHAT_FRIENDS_LOG", "debug"),
            ("CHAT_FRIENDS_DEDUPE_ON_OPEN", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/friends.db"));
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.log_filter, "debug");
        assert!(config.dedupe_on_open);
    }

    #[test]
    fn blank_values_fall_back() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CHAT_FRIENDS_DB_PATH", "  "),
            ("CHAT_FRIENDS_POOL_SIZE", ""),
        ]))
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn rejects_bad_numbers_and_flags() {
        assert_eq!(
            ClientConfig::from_lookup(lookup_from(&[("CHAT_FRIENDS_POOL_SIZE", "0")])),
            Err(ConfigError::InvalidValue {
                name: "CHAT_FRIENDS_POOL_SIZE",
                value: "0".to_string(),
            })
        );
        assert!(ClientConfig::from_lookup(lookup_from(&[("CHAT_FRIENDS_POOL_SIZE", "many")])).is_err());
        assert!(ClientConfig::from_lookup(lookup_from(&[("CHAT_FRIENDS_DEDUPE_ON_OPEN", "maybe")])).is_err());
    }
}
