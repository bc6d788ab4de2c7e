//! Application configuration loaded from environment variables.

use std::time::Duration;

use reservation::{ClaimTiming, ReservationPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `DB_POOL_SIZE`: connection pool size (default: `10`)
/// - `PAYMENT_KEY_SECRET`: HMAC secret shared with the gateway (default: `"dev-secret"`)
/// - `PAYMENT_CURRENCY`: order currency (default: `"INR"`)
/// - `CLAIM_TIMING`: `at_order` or `at_settlement` (default: `at_order`)
/// - `PENDING_HOLD_TTL_SECS`: expire PENDING bookings after this many seconds; off when unset
/// - `HOLD_SWEEP_INTERVAL_SECS`: sweeper period (default: `60`)
/// - `SEED_DEMO_CATALOG`: seed a demo theatre when in-memory (default: `true`)
///
/// Malformed optional values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub db_pool_size: u32,
    pub payment_secret: String,
    pub currency: String,
    pub claim_timing: ClaimTiming,
    pub pending_hold_ttl: Option<Duration>,
    pub hold_sweep_interval: Duration,
    pub seed_demo_catalog: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            db_pool_size: parse_var(&lookup, "DB_POOL_SIZE").unwrap_or(defaults.db_pool_size),
            payment_secret: lookup("PAYMENT_KEY_SECRET")
                .filter(|secret| !secret.is_empty())
                .unwrap_or(defaults.payment_secret),
            currency: lookup("PAYMENT_CURRENCY").unwrap_or(defaults.currency),
            claim_timing: lookup("CLAIM_TIMING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.claim_timing),
            pending_hold_ttl: parse_var(&lookup, "PENDING_HOLD_TTL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            hold_sweep_interval: parse_var(&lookup, "HOLD_SWEEP_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.hold_sweep_interval),
            seed_demo_catalog: parse_var(&lookup, "SEED_DEMO_CATALOG")
                .unwrap_or(defaults.seed_demo_catalog),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Engine policy derived from this configuration.
    pub fn policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            claim_timing: self.claim_timing,
            currency: self.currency.clone(),
            pending_hold_ttl: self.pending_hold_ttl,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            db_pool_size: 10,
            payment_secret: "dev-secret".to_string(),
            currency: "INR".to_string(),
            claim_timing: ClaimTiming::AtOrder,
            pending_hold_ttl: None,
            hold_sweep_interval: Duration::from_secs(60),
            seed_demo_catalog: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.claim_timing, ClaimTiming::AtOrder);
        assert!(config.pending_hold_ttl.is_none());
        assert!(config.seed_demo_catalog);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_addr_default() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_reads_all_variables() {
        let config = config_from(&[
            ("PORT", "8081"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://localhost/booking"),
            ("DB_POOL_SIZE", "4"),
            ("PAYMENT_KEY_SECRET", "s3cret"),
            ("PAYMENT_CURRENCY", "USD"),
            ("CLAIM_TIMING", "at_settlement"),
            ("PENDING_HOLD_TTL_SECS", "900"),
            ("HOLD_SWEEP_INTERVAL_SECS", "30"),
            ("SEED_DEMO_CATALOG", "false"),
        ]);

        assert_eq!(config.port, 8081);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/booking"));
        assert_eq!(config.db_pool_size, 4);
        assert_eq!(config.payment_secret, "s3cret");
        assert_eq!(config.claim_timing, ClaimTiming::AtSettlement);
        assert_eq!(config.pending_hold_ttl, Some(Duration::from_secs(900)));
        assert_eq!(config.hold_sweep_interval, Duration::from_secs(30));
        assert!(!config.seed_demo_catalog);

        let policy = config.policy();
        assert_eq!(policy.currency, "USD");
        assert_eq!(policy.claim_timing, ClaimTiming::AtSettlement);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("CLAIM_TIMING", "whenever"),
            ("PENDING_HOLD_TTL_SECS", "soon"),
            ("SEED_DEMO_CATALOG", "maybe"),
            ("PAYMENT_KEY_SECRET", ""),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.claim_timing, ClaimTiming::AtOrder);
        assert!(config.pending_hold_ttl.is_none());
        assert!(config.seed_demo_catalog);
        assert_eq!(config.payment_secret, "dev-secret");
    }
}
