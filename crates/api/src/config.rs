use std::fmt::Display;
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;
use crate::session::qr::QrConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Interval of the memory store's expiry sweep (default: `30`).
    pub store_sweep_interval_secs: u64,
    /// Redis connection URL. `None` selects the in-process memory store.
    pub redis_url: Option<String>,
    /// Token signing and session marker lifetimes.
    pub jwt: JwtConfig,
    /// QR session lifetimes and default flow.
    pub qr: QrConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `STORE_SWEEP_INTERVAL_SECS` | `30`                    |
    /// | `REDIS_URL`                 | unset (memory store)    |
    ///
    /// See [`JwtConfig::from_env`] and [`QrConfig::from_env`] for the rest.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = positive_env("REQUEST_TIMEOUT_SECS", 30);
        let store_sweep_interval_secs: u64 = positive_env("STORE_SWEEP_INTERVAL_SECS", 30);

        let redis_url = std::env::var("REDIS_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            store_sweep_interval_secs,
            redis_url,
            jwt: JwtConfig::from_env(),
            qr: QrConfig::from_env(),
        }
    }
}

/// Read `var` from the environment as a strictly positive number.
pub(crate) fn positive_env<T>(var: &str, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Display,
{
    positive_setting(var, std::env::var(var).ok(), default)
}

/// Parse `raw` (or fall back to `default` when unset) and require it to be
/// greater than zero.
///
/// # Panics
///
/// Panics naming `var` if the value does not parse or is not positive.
pub(crate) fn positive_setting<T>(var: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Display,
{
    let value = match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{var} must be a valid number, got {raw:?}")),
        None => default,
    };
    assert!(value > T::default(), "{var} must be greater than zero, got {value}");
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_setting_uses_default() {
        assert_eq!(positive_setting::<u64>("X_SECS", None, 30), 30);
    }

    #[test]
    fn explicit_setting_is_parsed() {
        assert_eq!(positive_setting::<u64>("X_SECS", Some(" 5 ".into()), 30), 5);
        assert_eq!(positive_setting::<i64>("X_MINS", Some("15".into()), 1), 15);
    }

    #[test]
    #[should_panic(expected = "STORE_SWEEP_INTERVAL_SECS must be greater than zero")]
    fn zero_interval_is_rejected() {
        positive_setting::<u64>("STORE_SWEEP_INTERVAL_SECS", Some("0".into()), 30);
    }

    #[test]
    #[should_panic(expected = "JWT_ACCESS_EXPIRY_MINS must be greater than zero")]
    fn negative_expiry_is_rejected() {
        positive_setting::<i64>("JWT_ACCESS_EXPIRY_MINS", Some("-5".into()), 15);
    }

    #[test]
    #[should_panic(expected = "SESSION_TTL_DAYS must be a valid number")]
    fn negative_unsigned_setting_is_rejected() {
        positive_setting::<u64>("SESSION_TTL_DAYS", Some("-1".into()), 7);
    }
}
