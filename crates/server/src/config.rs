//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STORYNEST_HOST` - Bind address (default: 127.0.0.1)
//! - `STORYNEST_PORT` - Listen port (default: 3000)
//! - `STORYNEST_DATA_FILE` - Profile document path (default: `data/user_profiles.json`)
//! - `STORYNEST_STATIC_DIR` - Directory of static pages served as fallback
//! - `STORYNEST_RATE_LIMIT` - Per-IP limit on verification routes (default: true)
//! - `POSTMARK_SERVER_TOKEN` - Postmark server API token; without it emails are only logged
//! - `EMAIL_FROM_ADDRESS` - Sender address (required when `POSTMARK_SERVER_TOKEN` is set)
//! - `POSTMARK_MESSAGE_STREAM` - Delivery stream tag (default: outbound)
//! - `POSTMARK_API_URL` - API base URL (default: <https://api.postmarkapp.com>)
//! - `EMAIL_SEND_TIMEOUT_SECS` - Upper bound on one provider call (default: 5)
//! - `VERIFICATION_CODE_TTL_SECS` - Code validity, `0` disables expiry (default: 600)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use storynest_core::Email;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_CODE_TTL_SECS: u64 = 600;
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Path of the JSON profile document
    pub data_file: PathBuf,
    /// Static site directory, if any
    pub static_dir: Option<PathBuf>,
    /// Whether verification routes are rate limited per client IP
    pub rate_limit: bool,
    /// Transactional email provider; `None` logs emails instead
    pub email: Option<EmailConfig>,
    /// Verification code settings
    pub verification: VerificationConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Postmark configuration.
///
/// Implements `Debug` manually to redact the server token.
#[derive(Clone)]
pub struct EmailConfig {
    /// Postmark server API token
    pub server_token: SecretString,
    /// Sender address
    pub from_address: Email,
    /// Delivery stream tag (`MessageStream`)
    pub message_stream: String,
    /// API base URL
    pub api_url: Url,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("server_token", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("message_stream", &self.message_stream)
            .field("api_url", &self.api_url.as_str())
            .finish()
    }
}

/// Verification code settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationConfig {
    /// How long an issued code is accepted; `None` never expires
    pub code_ttl: Option<Duration>,
    /// Upper bound on one email provider call
    pub send_timeout: Duration,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_ttl: Some(Duration::from_secs(DEFAULT_CODE_TTL_SECS)),
            send_timeout: Duration::from_secs(DEFAULT_SEND_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if variables are invalid, or if the provider
    /// token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STORYNEST_HOST", "127.0.0.1")?;
        let port = parse_env("STORYNEST_PORT", "3000")?;
        let data_file = PathBuf::from(get_env_or_default(
            "STORYNEST_DATA_FILE",
            "data/user_profiles.json",
        ));
        let static_dir = get_optional_env("STORYNEST_STATIC_DIR").map(PathBuf::from);
        let rate_limit = parse_env("STORYNEST_RATE_LIMIT", "true")?;

        let email = EmailConfig::from_env()?;
        let verification = VerificationConfig::from_env()?;

        Ok(Self {
            host,
            port,
            data_file,
            static_dir,
            rate_limit,
            email,
            verification,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration for tests and local tooling: given data file, no
    /// provider, no rate limiting, default verification settings.
    #[must_use]
    pub fn local(data_file: impl Into<PathBuf>) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            data_file: data_file.into(),
            static_dir: None,
            rate_limit: false,
            email: None,
            verification: VerificationConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl EmailConfig {
    /// Load provider settings. Returns `Ok(None)` when no token is set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the token is weak, the sender address is
    /// missing or invalid, or the API URL does not parse.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(token) = get_optional_env("POSTMARK_SERVER_TOKEN") else {
            return Ok(None);
        };
        validate_secret_strength(&token, "POSTMARK_SERVER_TOKEN")?;

        let from_raw = get_required_env("EMAIL_FROM_ADDRESS")?;
        let from_address = Email::parse(&from_raw).map_err(|e| {
            ConfigError::InvalidEnvVar("EMAIL_FROM_ADDRESS".to_string(), e.to_string())
        })?;

        Ok(Some(Self {
            server_token: SecretString::from(token),
            from_address,
            message_stream: get_env_or_default("POSTMARK_MESSAGE_STREAM", "outbound"),
            api_url: parse_env("POSTMARK_API_URL", "https://api.postmarkapp.com")?,
        }))
    }
}

impl VerificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_secs: u64 =
            parse_env("VERIFICATION_CODE_TTL_SECS", &DEFAULT_CODE_TTL_SECS.to_string())?;
        let timeout_secs: u64 = parse_env(
            "EMAIL_SEND_TIMEOUT_SECS",
            &DEFAULT_SEND_TIMEOUT_SECS.to_string(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "EMAIL_SEND_TIMEOUT_SECS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            code_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            send_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Validity promised in the email copy, in whole minutes.
    #[must_use]
    pub fn valid_minutes(&self) -> i64 {
        let secs = self
            .code_ttl
            .unwrap_or(Duration::from_secs(DEFAULT_CODE_TTL_SECS))
            .as_secs();
        i64::try_from(secs.div_ceil(60)).unwrap_or(i64::MAX)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable (or its default) with `FromStr`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Postmark tokens are UUIDs, well above this threshold
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the token from the Postmark server settings."
            ),
        ));
    }

    Ok(())
}
