//! Relay configuration, read from the environment once at startup.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const ENV_PORT: &str = "PORT";
pub const ENV_API_KEY: &str = "GOOGLE_GENERATIVE_AI_API_KEY";
pub const ENV_MODEL: &str = "CHAT_MODEL";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_TIMEOUT: &str = "UPSTREAM_TIMEOUT_SECS";
pub const ENV_RELAY_KEY: &str = "RELAY_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set; the relay cannot reach the model provider without it")]
    MissingApiKey(&'static str),

    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// `None` keeps the upstream call unbounded.
    pub upstream_timeout: Option<Duration>,
    /// When set, `/api/chat` requires a matching `x-api-key` header.
    pub relay_api_key: Option<String>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("relay_api_key", &self.relay_api_key.as_ref().map(|_| "<set>"))
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load `.env.local` then `.env` (first value wins) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::from_filename(".env.local").ok();
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::MissingApiKey(ENV_API_KEY))?;

        let port = match get(ENV_PORT) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: ENV_PORT, value: raw })?,
            None => DEFAULT_PORT,
        };

        let upstream_timeout = match get(ENV_TIMEOUT) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => return Err(ConfigError::Invalid { name: ENV_TIMEOUT, value: raw }),
            },
            None => None,
        };

        Ok(Self {
            port,
            api_key,
            model: get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get(ENV_BASE_URL)
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            upstream_timeout,
            relay_api_key: get(ENV_RELAY_KEY),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[(ENV_API_KEY, "key")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.base_url, DEFAULT_GEMINI_BASE_URL);
        assert_eq!(config.upstream_timeout, None);
        assert_eq!(config.relay_api_key, None);
    }

    #[test]
    fn missing_or_blank_key_fails_fast() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::MissingApiKey(ENV_API_KEY));
        assert_eq!(load(&[(ENV_API_KEY, "  ")]).unwrap_err(), ConfigError::MissingApiKey(ENV_API_KEY));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            (ENV_API_KEY, "key"),
            (ENV_PORT, "8080"),
            (ENV_MODEL, "gemini-2.0-flash"),
            (ENV_BASE_URL, "http://127.0.0.1:9999/"),
            (ENV_TIMEOUT, "30"),
            (ENV_RELAY_KEY, "secret"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.upstream_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.relay_api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        assert!(matches!(
            load(&[(ENV_API_KEY, "key"), (ENV_PORT, "http")]),
            Err(ConfigError::Invalid { name: ENV_PORT, .. })
        ));
        assert!(matches!(
            load(&[(ENV_API_KEY, "key"), (ENV_TIMEOUT, "0")]),
            Err(ConfigError::Invalid { name: ENV_TIMEOUT, .. })
        ));
    }

    #[test]
    fn debug_hides_secrets() {
        let config = load(&[(ENV_API_KEY, "super-secret"), (ENV_RELAY_KEY, "relay-secret")]).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("relay-secret"));
    }
}
