//! Order processor configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ORDERS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `REDIS_URL` - Redis server holding the catalog and the carts
//! - `STORE_NAME` - Shop name used as email sender name
//! - `STORE_EMAIL` - Shop email used as sender address
//! - `STORE_DOMAIN` - Shop identifier written into every order
//! - `STORE_URL` - Storefront origin allowed to submit orders (CORS)
//! - `ORDER_NOTIFY_EMAIL` - Internal recipient of new-order notifications
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - Outbound mail relay
//!
//! ## Optional
//! - `PROCESSOR_HOST` - Bind address (default: 127.0.0.1)
//! - `PROCESSOR_PORT` - Listen port (default: 8011)
//! - `CATALOG_REDIS_DB` - Redis database of the catalog (default: 0)
//! - `CART_REDIS_DB` - Redis database of the carts (default: 1)
//! - `CATALOG_KEY_NAMESPACE` - Catalog key namespace (default: `PRODUCT_MODEL`)
//! - `CART_KEY_PREFIX` - Cart key prefix (default: `CARTS`)
//! - `CATALOG_CACHE_TTL_SECS` - In-process catalog cache TTL, 0 disables (default: 30)
//! - `ORDER_NOTIFY_NAME` - Display name of the internal recipient (default: `Bestellungen`)
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `ORDER_TAX_RATE` - Tax rate applied to the subtotal (default: 0.19)
//! - `ORDER_MAX_ALLOCATION_ATTEMPTS` - Order number retries on conflict (default: 5)
//! - `CATALOG_TIMEOUT_MS`, `CART_TIMEOUT_MS`, `STORE_TIMEOUT_MS`, `MAIL_TIMEOUT_MS`
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Sentry error tracking
//! - `RUST_LOG`, `LOG_FORMAT` (`json` for JSON lines) - Read by the binary when installing the subscriber

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use order_processor_core::DEFAULT_TAX_RATE;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Order processor application configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Redis locations of catalog and carts
    pub redis: RedisConfig,
    /// Shop identity
    pub shop: ShopConfig,
    /// Outbound mail configuration
    pub mail: MailConfig,
    /// Finalization pipeline tuning
    pub pipeline: PipelineConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Redis configuration for the catalog and the cart cache.
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis connection URL without database path (may contain a password)
    pub url: SecretString,
    /// Database index holding catalog records
    pub catalog_db: u8,
    /// Database index holding carts
    pub cart_db: u8,
    /// Catalog key namespace (`<namespace>__<brand>__<model>`)
    pub catalog_namespace: String,
    /// Cart key prefix (`<prefix>__<cart id>`)
    pub cart_prefix: String,
    /// TTL of the in-process catalog cache; `None` disables it
    pub catalog_cache_ttl: Option<Duration>,
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &"[REDACTED]")
            .field("catalog_db", &self.catalog_db)
            .field("cart_db", &self.cart_db)
            .field("catalog_namespace", &self.catalog_namespace)
            .field("cart_prefix", &self.cart_prefix)
            .field("catalog_cache_ttl", &self.catalog_cache_ttl)
            .finish()
    }
}

impl RedisConfig {
    /// Connection URL selecting the catalog database.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `REDIS_URL` is not a valid URL.
    pub fn catalog_url(&self) -> Result<String, ConfigError> {
        with_database(self.url.expose_secret(), self.catalog_db)
    }

    /// Connection URL selecting the cart database.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `REDIS_URL` is not a valid URL.
    pub fn cart_url(&self) -> Result<String, ConfigError> {
        with_database(self.url.expose_secret(), self.cart_db)
    }
}

/// Shop identity used in orders and outgoing mail.
#[derive(Debug, Clone)]
pub struct ShopConfig {
    /// Sender display name
    pub name: String,
    /// Sender address
    pub email: String,
    /// Shop identifier stored on each order
    pub domain: String,
    /// Storefront origin (CORS)
    pub url: String,
}

/// SMTP relay and recipients.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Internal recipient display name
    pub notify_name: String,
    /// Internal recipient address
    pub notify_email: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("notify_name", &self.notify_name)
            .field("notify_email", &self.notify_email)
            .finish()
    }
}

/// Finalization pipeline settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tax rate applied to the subtotal
    pub tax_rate: Decimal,
    /// Insert attempts before giving up on order number conflicts
    pub max_allocation_attempts: u32,
    /// Bound for one catalog lookup
    pub catalog_timeout: Duration,
    /// Bound for one cart read or write
    pub cart_timeout: Duration,
    /// Bound for one order store call
    pub store_timeout: Duration,
    /// Bound for sending one email
    pub mail_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tax_rate: DEFAULT_TAX_RATE,
            max_allocation_attempts: 5,
            catalog_timeout: Duration::from_millis(2_000),
            cart_timeout: Duration::from_millis(2_000),
            store_timeout: Duration::from_millis(5_000),
            mail_timeout: Duration::from_millis(10_000),
        }
    }
}

impl ProcessorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ORDERS_DATABASE_URL")?;
        let host = get_parsed_env("PROCESSOR_HOST", "127.0.0.1")?;
        let port = get_parsed_env("PROCESSOR_PORT", "8011")?;

        Ok(Self {
            database_url,
            host,
            port,
            redis: RedisConfig::from_env()?,
            shop: ShopConfig::from_env()?,
            mail: MailConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = get_required_env("REDIS_URL")?;
        // Validate early so the catalog/cart URLs cannot fail later.
        with_database(&url, 0)?;

        let ttl_secs: u64 = get_parsed_env("CATALOG_CACHE_TTL_SECS", "30")?;

        Ok(Self {
            url: SecretString::from(url),
            catalog_db: get_parsed_env("CATALOG_REDIS_DB", "0")?,
            cart_db: get_parsed_env("CART_REDIS_DB", "1")?,
            catalog_namespace: get_env_or_default("CATALOG_KEY_NAMESPACE", "PRODUCT_MODEL"),
            cart_prefix: get_env_or_default("CART_KEY_PREFIX", "CARTS"),
            catalog_cache_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        })
    }
}

impl ShopConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = get_required_env("STORE_URL")?;
        Url::parse(&url)
            .map_err(|e| ConfigError::InvalidEnvVar("STORE_URL".to_string(), e.to_string()))?;

        Ok(Self {
            name: get_required_env("STORE_NAME")?,
            email: get_required_env("STORE_EMAIL")?,
            domain: get_required_env("STORE_DOMAIN")?,
            url: url.trim_end_matches('/').to_owned(),
        })
    }
}

impl MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port: get_parsed_env("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
            notify_name: get_env_or_default("ORDER_NOTIFY_NAME", "Bestellungen"),
            notify_email: get_required_env("ORDER_NOTIFY_EMAIL")?,
        })
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let max_allocation_attempts: u32 = get_parsed_env("ORDER_MAX_ALLOCATION_ATTEMPTS", "5")?;
        if max_allocation_attempts == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "ORDER_MAX_ALLOCATION_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            tax_rate: get_parsed_env("ORDER_TAX_RATE", "0.19")?,
            max_allocation_attempts,
            catalog_timeout: get_duration_ms("CATALOG_TIMEOUT_MS", "2000")?,
            cart_timeout: get_duration_ms("CART_TIMEOUT_MS", "2000")?,
            store_timeout: get_duration_ms("STORE_TIMEOUT_MS", "5000")?,
            mail_timeout: get_duration_ms("MAIL_TIMEOUT_MS", "10000")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse an environment variable with a default value.
fn get_parsed_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get a millisecond duration with a default value.
fn get_duration_ms(key: &str, default: &str) -> Result<Duration, ConfigError> {
    let millis: u64 = get_parsed_env(key, default)?;
    if millis == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "timeout must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_millis(millis))
}

/// Point a Redis URL at a specific database index.
fn with_database(redis_url: &str, db: u8) -> Result<String, ConfigError> {
    let mut url = Url::parse(redis_url)
        .map_err(|e| ConfigError::InvalidEnvVar("REDIS_URL".to_string(), e.to_string()))?;
    url.set_path(&format!("/{db}"));
    Ok(url.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn redis_config() -> RedisConfig {
        RedisConfig {
            url: SecretString::from("redis://:hunter2@cache.internal:6379"),
            catalog_db: 0,
            cart_db: 1,
            catalog_namespace: "PRODUCT_MODEL".to_string(),
            cart_prefix: "CARTS".to_string(),
            catalog_cache_ttl: None,
        }
    }

    #[test]
    fn test_redis_urls_select_database() {
        let config = redis_config();
        assert_eq!(
            config.catalog_url().unwrap(),
            "redis://:hunter2@cache.internal:6379/0"
        );
        assert_eq!(
            config.cart_url().unwrap(),
            "redis://:hunter2@cache.internal:6379/1"
        );
    }

    #[test]
    fn test_with_database_replaces_existing_path() {
        assert_eq!(
            with_database("redis://localhost:6379/5", 1).unwrap(),
            "redis://localhost:6379/1"
        );
    }

    #[test]
    fn test_with_database_rejects_invalid_url() {
        assert!(matches!(
            with_database("not a url", 0),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_parse_value() {
        let rate: Decimal = parse_value("ORDER_TAX_RATE", "0.19").unwrap();
        assert_eq!(rate, DEFAULT_TAX_RATE);
        let port: Result<u16, _> = parse_value("PROCESSOR_PORT", "eighty");
        assert!(matches!(port, Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_pipeline_defaults() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.tax_rate, DEFAULT_TAX_RATE);
        assert_eq!(pipeline.max_allocation_attempts, 5);
        assert_eq!(pipeline.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_socket_addr() {
        let config = ProcessorConfig {
            database_url: SecretString::from("postgres://localhost/orders"),
            host: "127.0.0.1".parse().unwrap(),
            port: 8011,
            redis: redis_config(),
            shop: ShopConfig {
                name: "Lampenwelt".to_string(),
                email: "shop@example.de".to_string(),
                domain: "lampen.example.de".to_string(),
                url: "https://lampen.example.de".to_string(),
            },
            mail: MailConfig {
                smtp_host: "smtp.example.de".to_string(),
                smtp_port: 587,
                smtp_username: "shop".to_string(),
                smtp_password: SecretString::from("p"),
                notify_name: "Bestellungen".to_string(),
                notify_email: "orders@example.de".to_string(),
            },
            pipeline: PipelineConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 8011);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mail = MailConfig {
            smtp_host: "smtp.example.de".to_string(),
            smtp_port: 587,
            smtp_username: "shop".to_string(),
            smtp_password: SecretString::from("super_secret_smtp_password"),
            notify_name: "Bestellungen".to_string(),
            notify_email: "orders@example.de".to_string(),
        };
        let debug_output = format!("{mail:?} {:?}", redis_config());

        assert!(debug_output.contains("smtp.example.de"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_smtp_password"));
        assert!(!debug_output.contains("hunter2"));
    }
}
