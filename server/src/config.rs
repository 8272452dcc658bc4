use std::net::SocketAddr;

use agency_store::StoreConfig;
use chrono::Duration;
use thiserror::Error;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error(transparent)]
    Store(#[from] agency_store::StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub backend: StoreBackend,
    pub store: StoreConfig<'static>,
    pub session_secret: Vec<u8>,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub max_page_size: u64,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match var("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    reason: format!("expected postgres or memory, got {other}"),
                })
            }
        };

        let session_secret = var("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        if session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let bind_addr = match var("BIND_ADDR") {
            Some(addr) => addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 3000)),
        };

        let session_ttl_hours: i64 = parse_or(var("SESSION_TTL_HOURS"), "SESSION_TTL_HOURS", 12)?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                name: "SESSION_TTL_HOURS",
                reason: "must be positive".to_string(),
            });
        }
        let max_page_size: u64 = parse_or(var("MAX_PAGE_SIZE"), "MAX_PAGE_SIZE", 100)?;

        let bootstrap_admin = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            backend,
            store: StoreConfig::from_lookup(&lookup)?,
            session_secret: session_secret.into_bytes(),
            session_ttl: Duration::hours(session_ttl_hours),
            cookie_secure: parse_or(var("COOKIE_SECURE"), "COOKIE_SECURE", false)?,
            max_page_size: max_page_size.max(1),
            bootstrap_admin,
        })
    }
}

fn parse_or<T>(value: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn defaults() {
        let config = AppConfig::from_lookup(lookup(&[("SESSION_SECRET", SECRET)])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.backend, StoreBackend::Postgres);
        assert_eq!(config.session_ttl, Duration::hours(12));
        assert_eq!(config.max_page_size, 100);
        assert!(!config.cookie_secure);
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn secret_is_required_and_long() {
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("SESSION_SECRET"))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup(&[("SESSION_SECRET", "short")])),
            Err(ConfigError::Invalid { name: "SESSION_SECRET", .. })
        ));
    }

    #[test]
    fn overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("SESSION_SECRET", SECRET),
            ("STORE_BACKEND", "memory"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("MAX_PAGE_SIZE", "25"),
            ("COOKIE_SECURE", "true"),
            ("BOOTSTRAP_ADMIN_EMAIL", "admin@agency.test"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "change-me-now"),
        ]))
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_page_size, 25);
        assert!(config.cookie_secure);
        assert_eq!(config.bootstrap_admin.unwrap().email, "admin@agency.test");
    }

    #[test]
    fn bad_values_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[("SESSION_SECRET", SECRET), ("MAX_PAGE_SIZE", "lots")]))
            .unwrap_err();
        assert!(err.to_string().starts_with("MAX_PAGE_SIZE is invalid"));

        let err = AppConfig::from_lookup(lookup(&[("SESSION_SECRET", SECRET), ("STORE_BACKEND", "mongo")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "STORE_BACKEND", .. }));
    }
}
