// src/config.rs
use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set when STORE=postgres")]
    MissingDatabaseUrl,

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    /// 路由前缀，空字符串表示挂在根路径
    pub base_path: String,
    pub store: StoreConfig,
}

impl Config {
    /// 从环境变量读取（main 中先加载 .env）
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host: IpAddr = parse_or(&lookup, "HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port: u16 = parse_or(&lookup, "PORT", 3001)?;

        let store = match lookup("STORE").as_deref().unwrap_or("postgres") {
            "postgres" => StoreConfig::Postgres {
                database_url: lookup("DATABASE_URL").ok_or(ConfigError::MissingDatabaseUrl)?,
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    name: "STORE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            addr: SocketAddr::new(host, port),
            base_path: normalize_base_path(lookup("BASE_PATH").unwrap_or_default()),
            store,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

// "api/" -> "/api"，"/" -> ""
fn normalize_base_path(raw: String) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_need_a_database_url() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingDatabaseUrl)));

        let cfg = config(&[("DATABASE_URL", "postgres://localhost/habits")]).unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:3001".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.base_path, "");
        assert_eq!(
            cfg.store,
            StoreConfig::Postgres {
                database_url: "postgres://localhost/habits".into(),
                max_connections: 5,
            }
        );
    }

    #[test]
    fn memory_store_with_custom_bind_and_prefix() {
        let cfg = config(&[
            ("STORE", "memory"),
            ("HOST", "0.0.0.0"),
            ("PORT", "8080"),
            ("BASE_PATH", "api/"),
        ])
        .unwrap();
        assert_eq!(cfg.store, StoreConfig::Memory);
        assert_eq!(cfg.addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.base_path, "/api");
    }

    #[test]
    fn bad_values_are_reported() {
        let err = config(&[("STORE", "memory"), ("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = config(&[("STORE", "mongo")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORE", .. }));
    }
}
