use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::rate_limit::{OverflowPolicy, RateLimitPolicy, StoreFailurePolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("缺少环境变量 {0}")]
    Missing(&'static str),
    #[error("环境变量 {name} 的值无效: {value}")]
    Invalid { name: &'static str, value: String },
}

/// 计数存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterBackend {
    Postgres,
    Redis,
    Memory,
}

impl FromStr for CounterBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub jwt_secret: String,
    pub counter_backend: CounterBackend,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub default_limit: RateLimitPolicy,
    pub generation_limit: RateLimitPolicy,
    pub overflow: OverflowPolicy,
    pub store_failure: StoreFailurePolicy,
    pub gc_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 从任意键值来源构建配置，便于测试时不依赖进程环境
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let counter_backend = parse_or(&lookup, "COUNTER_BACKEND", CounterBackend::Postgres)?;
        let database_url = lookup("DATABASE_URL");
        let redis_url = lookup("REDIS_URL");

        match counter_backend {
            CounterBackend::Postgres if database_url.is_none() => {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
            CounterBackend::Redis if redis_url.is_none() => {
                return Err(ConfigError::Missing("REDIS_URL"));
            }
            _ => {}
        }

        let default_limit = policy(
            &lookup,
            ("RATE_LIMIT_REQUESTS", 100),
            ("RATE_LIMIT_WINDOW_MS", 60_000),
        )?;
        let generation_limit = policy(
            &lookup,
            ("GENERATION_RATE_LIMIT_REQUESTS", 10),
            ("GENERATION_RATE_LIMIT_WINDOW_MS", 60_000),
        )?;

        Ok(Config {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            api_base_uri: lookup("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            jwt_secret: lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?,
            counter_backend,
            database_url,
            redis_url,
            default_limit,
            generation_limit,
            overflow: parse_or(&lookup, "RATE_LIMIT_OVERFLOW", OverflowPolicy::Count)?,
            store_failure: parse_or(
                &lookup,
                "RATE_LIMIT_STORE_FAILURE",
                StoreFailurePolicy::FailClosed,
            )?,
            gc_interval_secs: parse_or(&lookup, "RATE_LIMIT_GC_INTERVAL_SECS", 300)?,
        })
    }

    /// 过期计数清理周期，`None` 表示不启动清理任务
    ///
    /// Redis 的计数键自带过期时间，不需要清理任务。
    pub fn gc_interval(&self) -> Option<Duration> {
        if self.counter_backend == CounterBackend::Redis {
            return None;
        }
        (self.gc_interval_secs > 0).then(|| Duration::from_secs(self.gc_interval_secs))
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn policy<F>(
    lookup: &F,
    (max_var, max_default): (&'static str, u32),
    (window_var, window_default): (&'static str, u64),
) -> Result<RateLimitPolicy, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let max = parse_or(lookup, max_var, max_default)?;
    let window_ms = parse_or(lookup, window_var, window_default)?;
    RateLimitPolicy::new(max, window_ms).map_err(|_| ConfigError::Invalid {
        name: if max == 0 { max_var } else { window_var },
        value: if max == 0 { max.to_string() } else { window_ms.to_string() },
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_vars_set() {
        let config = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("DATABASE_URL", "postgres://localhost/lingo"),
        ]))
        .unwrap();

        assert_eq!(config.counter_backend, CounterBackend::Postgres);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.api_base_uri, "/api");
        assert_eq!(config.default_limit.max(), 100);
        assert_eq!(config.default_limit.window_ms(), 60_000);
        assert_eq!(config.generation_limit.max(), 10);
        assert_eq!(config.overflow, OverflowPolicy::Count);
        assert_eq!(config.store_failure, StoreFailurePolicy::FailClosed);
        assert_eq!(config.gc_interval(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = Config::from_lookup(lookup_from(&[("JWT_SECRET", "secret")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn redis_backend_requires_redis_url() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("COUNTER_BACKEND", "redis"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REDIS_URL")));
    }

    #[test]
    fn redis_backend_skips_reaper() {
        let config = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("COUNTER_BACKEND", "redis"),
            ("REDIS_URL", "redis://127.0.0.1/"),
            ("RATE_LIMIT_GC_INTERVAL_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.counter_backend, CounterBackend::Redis);
        assert_eq!(config.gc_interval(), None);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("COUNTER_BACKEND", "memory"),
            ("RATE_LIMIT_WINDOW_MS", "one minute"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "RATE_LIMIT_WINDOW_MS",
                ..
            }
        ));
    }

    #[test]
    fn zero_max_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("COUNTER_BACKEND", "memory"),
            ("GENERATION_RATE_LIMIT_REQUESTS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "GENERATION_RATE_LIMIT_REQUESTS",
                ..
            }
        ));
    }

    #[test]
    fn window_beyond_i64_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("COUNTER_BACKEND", "memory"),
            ("RATE_LIMIT_WINDOW_MS", "9223372036854775808"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "RATE_LIMIT_WINDOW_MS",
                ..
            }
        ));
    }

    #[test]
    fn policies_parse_from_env() {
        let config = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "secret"),
            ("COUNTER_BACKEND", "memory"),
            ("RATE_LIMIT_OVERFLOW", "clamp"),
            ("RATE_LIMIT_STORE_FAILURE", "fail_open"),
            ("RATE_LIMIT_GC_INTERVAL_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.overflow, OverflowPolicy::Clamp);
        assert_eq!(config.store_failure, StoreFailurePolicy::FailOpen);
        assert_eq!(config.gc_interval(), None);
    }
}
