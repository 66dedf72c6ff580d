//! Configuration management for the accounts core

use crate::crypto::MAX_CODE_DIGITS;
use crate::domain::Region;
use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Region served by this node; its regional store is the only one it writes
    pub region: Region,
    /// Base URLs of every region's node, used for forwarding
    pub region_endpoints: HashMap<Region, String>,
    /// Cross-region uniqueness and routing store
    pub global_database: DatabaseConfig,
    /// This region's authoritative account store
    pub regional_database: DatabaseConfig,
    /// HMAC key for email hashes; must be identical in every region
    pub email_hash_key: String,
    pub tokens: TokenConfig,
    pub domain_verification: DomainVerificationConfig,
    pub proxy: ProxyConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Lifetimes of sessions and short-lived tokens
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub session_ttl_secs: i64,
    pub two_factor_ttl_secs: i64,
    pub password_reset_ttl_secs: i64,
    pub email_change_ttl_secs: i64,
    pub two_factor_code_digits: u32,
    /// Wrong codes after which a two-factor token is deleted
    pub two_factor_max_attempts: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 604800,
            two_factor_ttl_secs: 600,
            password_reset_ttl_secs: 3600,
            email_change_ttl_secs: 86400,
            two_factor_code_digits: 6,
            two_factor_max_attempts: 5,
        }
    }
}

impl TokenConfig {
    /// Shortest two-factor code accepted from configuration
    pub const MIN_CODE_DIGITS: u32 = 4;

    pub fn validate(&self) -> Result<()> {
        if !(Self::MIN_CODE_DIGITS..=MAX_CODE_DIGITS).contains(&self.two_factor_code_digits) {
            bail!(
                "TWO_FACTOR_CODE_DIGITS must be between {} and {}, got {}",
                Self::MIN_CODE_DIGITS,
                MAX_CODE_DIGITS,
                self.two_factor_code_digits
            );
        }
        if self.two_factor_max_attempts == 0 {
            bail!("TWO_FACTOR_MAX_ATTEMPTS must be at least 1");
        }
        for (key, ttl) in [
            ("SESSION_TTL_SECS", self.session_ttl_secs),
            ("TWO_FACTOR_TTL_SECS", self.two_factor_ttl_secs),
            ("PASSWORD_RESET_TTL_SECS", self.password_reset_ttl_secs),
            ("EMAIL_CHANGE_TTL_SECS", self.email_change_ttl_secs),
        ] {
            if ttl <= 0 {
                bail!("{} must be positive, got {}", key, ttl);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DomainVerificationConfig {
    /// Consecutive failures after which a verified domain is reported as failing
    pub failure_threshold: u32,
    /// Minimum spacing between checks of one domain
    pub cooldown_secs: i64,
    /// Lifetime of a pending claim's challenge token
    pub token_ttl_secs: i64,
    /// Label prepended to the domain to form the TXT record name
    pub record_prefix: String,
}

impl Default for DomainVerificationConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_secs: 300,
            token_ttl_secs: 604800,
            record_prefix: "_accounts-challenge".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upper bound on a forwarded call, including reading the response
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub metrics_enabled: bool,
    /// "json" or "pretty"
    pub log_format: String,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            log_format: "pretty".to_string(),
            service_name: "accounts-core".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let region: Region = env::var("REGION")
            .context("REGION is required")?
            .parse()
            .map_err(anyhow::Error::msg)
            .context("Invalid REGION")?;

        let region_endpoints = parse_region_endpoints(
            &env::var("REGION_ENDPOINTS").context("REGION_ENDPOINTS is required")?,
        )?;

        let defaults = TokenConfig::default();
        let verification_defaults = DomainVerificationConfig::default();
        let proxy_defaults = ProxyConfig::default();

        let tokens = TokenConfig {
            session_ttl_secs: env_or("SESSION_TTL_SECS", defaults.session_ttl_secs)?,
            two_factor_ttl_secs: env_or("TWO_FACTOR_TTL_SECS", defaults.two_factor_ttl_secs)?,
            password_reset_ttl_secs: env_or(
                "PASSWORD_RESET_TTL_SECS",
                defaults.password_reset_ttl_secs,
            )?,
            email_change_ttl_secs: env_or("EMAIL_CHANGE_TTL_SECS", defaults.email_change_ttl_secs)?,
            two_factor_code_digits: env_or(
                "TWO_FACTOR_CODE_DIGITS",
                defaults.two_factor_code_digits,
            )?,
            two_factor_max_attempts: env_or(
                "TWO_FACTOR_MAX_ATTEMPTS",
                defaults.two_factor_max_attempts,
            )?,
        };
        tokens.validate()?;

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env_or("HTTP_PORT", 8080)?,
            region,
            region_endpoints,
            global_database: database_config("GLOBAL_DATABASE")?,
            regional_database: database_config("REGIONAL_DATABASE")?,
            email_hash_key: env::var("EMAIL_HASH_KEY").context("EMAIL_HASH_KEY is required")?,
            tokens,
            domain_verification: DomainVerificationConfig {
                failure_threshold: env_or(
                    "DOMAIN_VERIFICATION_FAILURE_THRESHOLD",
                    verification_defaults.failure_threshold,
                )?,
                cooldown_secs: env_or(
                    "DOMAIN_VERIFICATION_COOLDOWN_SECS",
                    verification_defaults.cooldown_secs,
                )?,
                token_ttl_secs: env_or(
                    "DOMAIN_VERIFICATION_TOKEN_TTL_SECS",
                    verification_defaults.token_ttl_secs,
                )?,
                record_prefix: env::var("DOMAIN_VERIFICATION_RECORD_PREFIX")
                    .unwrap_or(verification_defaults.record_prefix),
            },
            proxy: ProxyConfig {
                timeout_secs: env_or("PROXY_TIMEOUT_SECS", proxy_defaults.timeout_secs)?,
                connect_timeout_secs: env_or(
                    "PROXY_CONNECT_TIMEOUT_SECS",
                    proxy_defaults.connect_timeout_secs,
                )?,
            },
            telemetry: TelemetryConfig {
                metrics_enabled: env::var("METRICS_ENABLED")
                    .map(|s| s.to_lowercase() != "false")
                    .unwrap_or(true),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or_else(|_| "accounts-core".to_string()),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn endpoint_for(&self, region: Region) -> Option<&str> {
        self.region_endpoints.get(&region).map(String::as_str)
    }
}

fn database_config(prefix: &str) -> Result<DatabaseConfig> {
    Ok(DatabaseConfig {
        url: env::var(format!("{}_URL", prefix)).with_context(|| format!("{}_URL is required", prefix))?,
        max_connections: env_or(&format!("{}_MAX_CONNECTIONS", prefix), 10)?,
        min_connections: env_or(&format!("{}_MIN_CONNECTIONS", prefix), 2)?,
    })
}

/// Parse `key` from the environment, falling back to `default` only when unset.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_or(key, env::var(key).ok(), default)
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

/// Parse `jp=http://jp.internal:8080,us=http://us.internal:8080`.
pub fn parse_region_endpoints(raw: &str) -> Result<HashMap<Region, String>> {
    let mut endpoints = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((tag, url)) = entry.split_once('=') else {
            bail!("Invalid REGION_ENDPOINTS entry '{}'", entry);
        };
        let region: Region = tag
            .trim()
            .parse()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid region in REGION_ENDPOINTS entry '{}'", entry))?;
        let url = url.trim().trim_end_matches('/');
        url::Url::parse(url).with_context(|| format!("Invalid URL for region {}", region))?;
        endpoints.insert(region, url.to_string());
    }
    Ok(endpoints)
}
