//! Service configuration, read from the environment once at startup.

use chrono::Duration;
use thiserror::Error;

/// Environment variable for the PostgreSQL connection string.
pub const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";
/// Environment variable for the listen port.
pub const PORT_ENV_VAR: &str = "PORT";
/// Environment variable for the connection pool size.
pub const MAX_CONNECTIONS_ENV_VAR: &str = "DATABASE_MAX_CONNECTIONS";
/// Environment variable for the public site URL used in gateway callbacks.
pub const SITE_URL_ENV_VAR: &str = "SITE_URL";
/// Environment variable for the Mercado Pago access token.
pub const MP_ACCESS_TOKEN_ENV_VAR: &str = "MP_ACCESS_TOKEN";
/// Environment variable for the Mercado Pago webhook secret.
pub const MP_WEBHOOK_SECRET_ENV_VAR: &str = "MP_WEBHOOK_SECRET";
/// Environment variable for the Mercado Pago API base URL.
pub const MP_API_BASE_ENV_VAR: &str = "MP_API_BASE";
pub const ADMIN_EMAIL_ENV_VAR: &str = "ADMIN_EMAIL";
pub const ADMIN_PASSWORD_ENV_VAR: &str = "ADMIN_PASSWORD";
pub const SESSION_SECRET_ENV_VAR: &str = "SESSION_SECRET";
pub const SESSION_TTL_ENV_VAR: &str = "SESSION_TTL_HOURS";
/// Environment variable for the optional NATS server.
pub const NATS_URL_ENV_VAR: &str = "NATS_URL";

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";
pub const DEFAULT_MP_API_BASE: &str = "https://api.mercadopago.com";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub max_connections: u32,
    pub site_url: String,
    pub payments: PaymentConfig,
    pub admin: AdminConfig,
    pub nats_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PaymentConfig {
    /// Without a token every payment endpoint answers 500.
    pub access_token: Option<String>,
    /// Without a secret webhook signatures are not checked.
    pub webhook_secret: Option<String>,
    pub api_base: String,
}

#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    pub session_secret: String,
    pub session_ttl: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let port = parse_or(get(PORT_ENV_VAR), PORT_ENV_VAR, DEFAULT_PORT)?;
        let max_connections = parse_or(get(MAX_CONNECTIONS_ENV_VAR), MAX_CONNECTIONS_ENV_VAR, DEFAULT_MAX_CONNECTIONS)?;
        let ttl_hours: i64 = parse_or(get(SESSION_TTL_ENV_VAR), SESSION_TTL_ENV_VAR, DEFAULT_SESSION_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid { var: SESSION_TTL_ENV_VAR, value: ttl_hours.to_string() });
        }

        Ok(Self {
            database_url: required(DATABASE_URL_ENV_VAR)?,
            port,
            max_connections,
            site_url: get(SITE_URL_ENV_VAR)
                .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            payments: PaymentConfig {
                access_token: get(MP_ACCESS_TOKEN_ENV_VAR),
                webhook_secret: get(MP_WEBHOOK_SECRET_ENV_VAR),
                api_base: get(MP_API_BASE_ENV_VAR)
                    .unwrap_or_else(|| DEFAULT_MP_API_BASE.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            admin: AdminConfig {
                email: required(ADMIN_EMAIL_ENV_VAR)?,
                password: required(ADMIN_PASSWORD_ENV_VAR)?,
                session_secret: required(SESSION_SECRET_ENV_VAR)?,
                session_ttl: Duration::hours(ttl_hours),
            },
            nats_url: get(NATS_URL_ENV_VAR),
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, var: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/store"),
        ("ADMIN_EMAIL", "admin@example.com"),
        ("ADMIN_PASSWORD", "secret"),
        ("SESSION_SECRET", "signing-key"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.site_url, DEFAULT_SITE_URL);
        assert_eq!(config.payments.api_base, DEFAULT_MP_API_BASE);
        assert!(config.payments.access_token.is_none());
        assert!(config.payments.webhook_secret.is_none());
        assert_eq!(config.admin.session_ttl, Duration::hours(12));
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&BASE[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing(DATABASE_URL_ENV_VAR));
    }

    #[test]
    fn test_blank_is_unset_and_bad_port_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("MP_WEBHOOK_SECRET", "   "));
        pairs.push(("SITE_URL", "https://loja.example.com/"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert!(config.payments.webhook_secret.is_none());
        assert_eq!(config.site_url, "https://loja.example.com");

        pairs.push(("PORT", "http"));
        assert!(matches!(Config::from_lookup(lookup(&pairs)), Err(ConfigError::Invalid { var: PORT_ENV_VAR, .. })));
    }
}
