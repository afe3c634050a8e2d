//! Service settings read from the process environment (and `.env` via dotenvy).

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::rate_cache::MissPolicy;
use crate::source::DEFAULT_CBR_URL;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_EXCHANGE_RATE_API_URL: &str = "https://v6.exchangerate-api.com/v6";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_STREAM_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} is required: {reason}")]
    Missing { name: &'static str, reason: &'static str },
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres { url: String, max_connections: u32 },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    ExchangeRateApi { base_url: String, api_key: String },
    Cbr { url: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub http_timeout: Duration,
    pub miss_policy: MissPolicy,
    pub stream_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bind_addr = parse_or::<SocketAddr>(
            "BIND_ADDR",
            var("BIND_ADDR"),
            DEFAULT_BIND_ADDR.parse().ok(),
        )?;

        let database_url = var("DATABASE_URL");
        let storage = match var("STORAGE").map(|value| value.to_ascii_lowercase()) {
            Some(kind) if kind == "memory" => StorageConfig::Memory,
            Some(kind) if kind == "postgres" => postgres(database_url, &var)?,
            Some(kind) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE",
                    value: kind,
                    reason: "expected postgres or memory".to_string(),
                });
            }
            None if database_url.is_some() => postgres(database_url, &var)?,
            None => StorageConfig::Memory,
        };

        let provider = match var("RATE_PROVIDER").map(|value| value.to_ascii_lowercase()) {
            None => exchange_rate_api(&var)?,
            Some(kind) if kind == "exchangerate-api" => exchange_rate_api(&var)?,
            Some(kind) if kind == "cbr" => ProviderConfig::Cbr {
                url: var("CBR_URL").unwrap_or_else(|| DEFAULT_CBR_URL.to_string()),
            },
            Some(kind) => {
                return Err(ConfigError::Invalid {
                    name: "RATE_PROVIDER",
                    value: kind,
                    reason: "expected exchangerate-api or cbr".to_string(),
                });
            }
        };

        let http_timeout = Duration::from_secs(parse_or(
            "HTTP_TIMEOUT_SECS",
            var("HTTP_TIMEOUT_SECS"),
            Some(DEFAULT_HTTP_TIMEOUT_SECS),
        )?);
        let miss_policy = parse_or(
            "RATE_MISS_POLICY",
            var("RATE_MISS_POLICY"),
            Some(MissPolicy::default()),
        )?;
        let stream_delay = Duration::from_millis(parse_or(
            "STREAM_DELAY_MS",
            var("STREAM_DELAY_MS"),
            Some(DEFAULT_STREAM_DELAY_MS),
        )?);

        Ok(Self {
            bind_addr,
            storage,
            provider,
            http_timeout,
            miss_policy,
            stream_delay,
        })
    }
}

fn postgres(
    url: Option<String>,
    var: &impl Fn(&str) -> Option<String>,
) -> Result<StorageConfig, ConfigError> {
    let url = url.ok_or(ConfigError::Missing {
        name: "DATABASE_URL",
        reason: "postgres storage needs a connection string",
    })?;
    let max_connections = parse_or(
        "DATABASE_MAX_CONNECTIONS",
        var("DATABASE_MAX_CONNECTIONS"),
        Some(DEFAULT_DB_MAX_CONNECTIONS),
    )?;
    Ok(StorageConfig::Postgres {
        url,
        max_connections,
    })
}

fn exchange_rate_api(var: &impl Fn(&str) -> Option<String>) -> Result<ProviderConfig, ConfigError> {
    let api_key = var("EXCHANGE_RATE_API_KEY").ok_or(ConfigError::Missing {
        name: "EXCHANGE_RATE_API_KEY",
        reason: "the exchangerate-api provider needs an API key",
    })?;
    Ok(ProviderConfig::ExchangeRateApi {
        base_url: var("EXCHANGE_RATE_API_URL")
            .unwrap_or_else(|| DEFAULT_EXCHANGE_RATE_API_URL.to_string()),
        api_key,
    })
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
            value,
        }),
        None => default.ok_or(ConfigError::Missing {
            name,
            reason: "no default available",
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_memory_storage_and_exchangerate_api() {
        let config = config(&[("EXCHANGE_RATE_API_KEY", "secret")]).expect("valid config");

        assert_eq!(
            config.bind_addr,
            DEFAULT_BIND_ADDR.parse::<SocketAddr>().unwrap()
        );
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(
            config.provider,
            ProviderConfig::ExchangeRateApi {
                base_url: DEFAULT_EXCHANGE_RATE_API_URL.to_string(),
                api_key: "secret".to_string(),
            }
        );
        assert_eq!(config.miss_policy, MissPolicy::Uncoordinated);
        assert_eq!(config.stream_delay, Duration::from_millis(500));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn database_url_selects_postgres() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/valut"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("RATE_PROVIDER", "cbr"),
        ])
        .expect("valid config");

        assert_eq!(
            config.storage,
            StorageConfig::Postgres {
                url: "postgres://localhost/valut".to_string(),
                max_connections: 12,
            }
        );
        assert_eq!(
            config.provider,
            ProviderConfig::Cbr {
                url: DEFAULT_CBR_URL.to_string()
            }
        );
    }

    #[test]
    fn explicit_memory_storage_ignores_database_url() {
        let config = config(&[
            ("STORAGE", "memory"),
            ("DATABASE_URL", "postgres://localhost/valut"),
            ("RATE_PROVIDER", "cbr"),
            ("RATE_MISS_POLICY", "single-flight"),
        ])
        .expect("valid config");

        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.miss_policy, MissPolicy::SingleFlight);
    }

    #[test]
    fn postgres_without_url_is_rejected() {
        let err = config(&[("STORAGE", "postgres"), ("RATE_PROVIDER", "cbr")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "DATABASE_URL", .. }));
    }

    #[test]
    fn exchangerate_api_requires_key() {
        let err = config(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "EXCHANGE_RATE_API_KEY", .. }));
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let err = config(&[("RATE_PROVIDER", "cbr"), ("STREAM_DELAY_MS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STREAM_DELAY_MS", .. }));
    }
}
