//! Environment-driven configuration loading.

use std::collections::HashMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use crate::models::{Config, DEFAULT_JWT_SECRET};
use crate::validation::{ConfigWarning, ConfigWarnings};

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("environment variable {key} holds a non-unicode value")]
    NotUnicode { key: String },
}

/// A loaded configuration plus everything worth telling the operator.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

enum Source {
    Env,
    Map(HashMap<String, String>),
}

/// Reads [`Config`] from the process environment, falling back to
/// defaults (with a warning) for anything malformed.
pub struct ConfigLoader {
    source: Source,
}

impl std::fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigLoader").finish_non_exhaustive()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            source: Source::Env,
        }
    }

    /// Load from a fixed map instead of the process environment. Tests
    /// use this to avoid mutating shared env state.
    pub fn with_source(map: HashMap<String, String>) -> Self {
        Self {
            source: Source::Map(map),
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>, ConfigLoadError> {
        match &self.source {
            Source::Env => match env::var(key) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(env::VarError::NotUnicode(_)) => Err(ConfigLoadError::NotUnicode {
                    key: key.to_string(),
                }),
            },
            Source::Map(map) => Ok(map.get(key).cloned()),
        }
    }

    fn parse<T>(
        &self,
        key: &str,
        default: T,
        warnings: &mut ConfigWarnings,
    ) -> Result<T, ConfigLoadError>
    where
        T: FromStr + Display,
    {
        match self.get(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(value) => Ok(value),
                Err(_) => {
                    warnings.push(ConfigWarning::with_hint(
                        format!("{key}={raw} is not a valid value, using default {default}"),
                        format!("unset {key} or provide a value parseable as the expected type"),
                    ));
                    Ok(default)
                }
            },
        }
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let mut config = Config::default();
        let mut warnings = ConfigWarnings::default();

        if let Some(host) = self.get("SERVER_HOST")? {
            config.server.host = host;
        }
        config.server.port = self.parse("SERVER_PORT", config.server.port, &mut warnings)?;

        config.database.url = self.get("DATABASE_URL")?;

        match self.get("JWT_SECRET")? {
            Some(secret) if !secret.trim().is_empty() => config.auth.jwt_secret = secret,
            _ => {
                warnings.push(ConfigWarning::with_hint(
                    "JWT_SECRET is not set, using the built-in development secret",
                    "set JWT_SECRET before exposing this service",
                ));
                config.auth.jwt_secret = DEFAULT_JWT_SECRET.to_string();
            }
        }
        config.auth.token_ttl_secs =
            self.parse("TOKEN_TTL_SECS", config.auth.token_ttl_secs, &mut warnings)?;

        if let Some(base_url) = self.get("URLSCAN_API_URL")? {
            config.provider.base_url = base_url;
        }
        match self.get("URLSCAN_API_KEY")? {
            Some(key) if !key.trim().is_empty() => config.provider.api_key = key,
            _ => warnings.push(ConfigWarning::with_hint(
                "URLSCAN_API_KEY is not set, provider submissions will be rejected",
                "obtain an API key from the scanning provider and set URLSCAN_API_KEY",
            )),
        }
        config.provider.max_retries = self.parse(
            "URLSCAN_MAX_RETRIES",
            config.provider.max_retries,
            &mut warnings,
        )?;
        config.provider.retry_initial_delay_ms = self.parse(
            "URLSCAN_RETRY_INITIAL_DELAY_MS",
            config.provider.retry_initial_delay_ms,
            &mut warnings,
        )?;
        config.provider.connect_timeout_secs = self.parse(
            "URLSCAN_CONNECT_TIMEOUT_SECS",
            config.provider.connect_timeout_secs,
            &mut warnings,
        )?;
        config.provider.request_timeout_secs = self.parse(
            "URLSCAN_REQUEST_TIMEOUT_SECS",
            config.provider.request_timeout_secs,
            &mut warnings,
        )?;

        config.cache.ttl_hours =
            self.parse("CACHE_TTL_HOURS", config.cache.ttl_hours, &mut warnings)?;

        config.worker.submission_delay_ms = self.parse(
            "WORKER_SUBMISSION_DELAY_MS",
            config.worker.submission_delay_ms,
            &mut warnings,
        )?;
        config.worker.result_delay_ms = self.parse(
            "WORKER_RESULT_DELAY_MS",
            config.worker.result_delay_ms,
            &mut warnings,
        )?;
        config.worker.submission_batch_size = self.parse(
            "WORKER_SUBMISSION_BATCH_SIZE",
            config.worker.submission_batch_size,
            &mut warnings,
        )?;
        config.worker.result_batch_size = self.parse(
            "WORKER_RESULT_BATCH_SIZE",
            config.worker.result_batch_size,
            &mut warnings,
        )?;
        config.worker.per_user_batch_size = self.parse(
            "WORKER_PER_USER_BATCH_SIZE",
            config.worker.per_user_batch_size,
            &mut warnings,
        )?;

        if config.worker.per_user_batch_size == 0 {
            warnings.push(ConfigWarning::new(
                "WORKER_PER_USER_BATCH_SIZE=0 disables the fairness phase",
            ));
        }

        Ok(ConfigLoad { config, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(pairs: &[(&str, &str)]) -> ConfigLoader {
        ConfigLoader::with_source(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let ConfigLoad { config, warnings } = loader(&[]).load().unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert!(config.database.url.is_none());
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(config.worker.submission_delay_ms, 10_000);
        assert_eq!(config.worker.result_delay_ms, 15_000);
        assert_eq!(config.worker.per_user_batch_size, 5);
        assert_eq!(config.provider.max_retries, 3);
        assert_eq!(config.provider.retry_initial_delay_ms, 5_000);

        // Missing JWT secret and API key are flagged, not fatal.
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn environment_overrides_take_effect() {
        let ConfigLoad { config, warnings } = loader(&[
            ("SERVER_PORT", "9090"),
            ("DATABASE_URL", "postgres://localhost/urlvet"),
            ("JWT_SECRET", "s3cret"),
            ("URLSCAN_API_KEY", "key-1"),
            ("URLSCAN_API_URL", "https://scanner.internal/api/v1"),
            ("CACHE_TTL_HOURS", "6"),
            ("WORKER_SUBMISSION_BATCH_SIZE", "25"),
            ("WORKER_PER_USER_BATCH_SIZE", "2"),
        ])
        .load()
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/urlvet"));
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.provider.api_key, "key-1");
        assert_eq!(config.provider.base_url, "https://scanner.internal/api/v1");
        assert_eq!(config.cache.ttl_hours, 6);
        assert_eq!(config.worker.submission_batch_size, 25);
        assert_eq!(config.worker.per_user_batch_size, 2);
        assert!(warnings.is_empty());
    }

    #[test]
    fn malformed_values_fall_back_with_warning() {
        let ConfigLoad { config, warnings } = loader(&[
            ("JWT_SECRET", "s3cret"),
            ("URLSCAN_API_KEY", "key-1"),
            ("SERVER_PORT", "not-a-port"),
            ("CACHE_TTL_HOURS", "-3"),
        ])
        .load()
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.ttl_hours, 24);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.items[0].message.contains("SERVER_PORT"));
    }

    #[test]
    fn zero_per_user_batch_size_is_flagged() {
        let ConfigLoad { warnings, .. } = loader(&[
            ("JWT_SECRET", "s3cret"),
            ("URLSCAN_API_KEY", "key-1"),
            ("WORKER_PER_USER_BATCH_SIZE", "0"),
        ])
        .load()
        .unwrap();

        assert!(warnings
            .items
            .iter()
            .any(|w| w.message.contains("fairness")));
    }
}
