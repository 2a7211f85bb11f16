//! # Client Configuration
//!
//! Configuration management for the notification client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     NOTIFY_API_URL=https://example.com/api                             │
//! │     NOTIFY_HUB_URL=https://example.com/hubs/notifications              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/notify-client/notify.toml (Linux)                        │
//! │     ~/Library/Application Support/com.notify.client/notify.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     fixed 5s reconnect, page size 50                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! api_base_url = "https://example.com/api"
//! hub_url = "https://example.com/hubs/notifications"
//!
//! [retry]
//! strategy = "fixed"   # fixed | exponential
//! delay_ms = 5000
//! max_attempts = 0     # 0 = retry forever
//!
//! [list]
//! page_size = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use notify_core::validation::validate_page_size;
use notify_core::DEFAULT_PAGE_SIZE;

use crate::error::{ClientError, ClientResult};
use crate::retry::{ExponentialRetry, FixedDelay, RetryPolicy};

// =============================================================================
// Server Settings
// =============================================================================

/// Where the notification server lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Base URL of the REST API (the `/notifications` routes hang off it).
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// URL of the SignalR notification hub. `http(s)` is mapped to `ws(s)`.
    #[serde(default)]
    pub hub_url: Option<String>,

    /// Per-request timeout for REST calls (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            api_base_url: None,
            hub_url: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Realtime Settings
// =============================================================================

/// Timing of the realtime connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeSettings {
    /// Connection + handshake timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How often the client pings the hub (seconds).
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    /// Silence from the server longer than this ends the connection (seconds).
    #[serde(default = "default_server_timeout")]
    pub server_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_keepalive_interval() -> u64 {
    15
}
fn default_server_timeout() -> u64 {
    30
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        RealtimeSettings {
            connect_timeout_secs: default_connect_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            server_timeout_secs: default_server_timeout(),
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Reconnect strategy for the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Same delay before every attempt.
    #[default]
    Fixed,

    /// Doubling delay with jitter, capped.
    Exponential,
}

impl std::fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryStrategy::Fixed => write!(f, "fixed"),
            RetryStrategy::Exponential => write!(f, "exponential"),
        }
    }
}

impl std::str::FromStr for RetryStrategy {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "constant" => Ok(RetryStrategy::Fixed),
            "exponential" | "backoff" => Ok(RetryStrategy::Exponential),
            other => Err(ClientError::InvalidConfig(format!(
                "Unknown retry strategy: '{}'. Valid options: fixed, exponential",
                other
            ))),
        }
    }
}

/// Reconnect behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Which strategy to use.
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Delay between attempts for the fixed strategy (milliseconds).
    #[serde(default = "default_delay")]
    pub delay_ms: u64,

    /// Maximum consecutive failed attempts before giving up.
    /// Set to 0 for infinite retries.
    #[serde(default)]
    pub max_attempts: u32,

    /// First delay for the exponential strategy (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Cap for the exponential strategy (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_delay() -> u64 {
    5_000
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    60
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            strategy: RetryStrategy::default(),
            delay_ms: default_delay(),
            max_attempts: 0,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    /// Returns the attempt limit, `None` meaning unbounded.
    pub fn max_attempts(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }

    /// Builds a fresh policy for one connection loop.
    pub fn build_policy(&self) -> Box<dyn RetryPolicy> {
        match self.strategy {
            RetryStrategy::Fixed => Box::new(FixedDelay::new(
                Duration::from_millis(self.delay_ms),
                self.max_attempts(),
            )),
            RetryStrategy::Exponential => Box::new(ExponentialRetry::new(
                Duration::from_millis(self.initial_backoff_ms),
                Duration::from_secs(self.max_backoff_secs),
                self.max_attempts(),
            )),
        }
    }
}

// =============================================================================
// List Settings
// =============================================================================

/// Dropdown list settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSettings {
    /// How many notifications the dropdown fetches when opened.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for ListSettings {
    fn default() -> Self {
        ListSettings {
            page_size: default_page_size(),
        }
    }
}

// =============================================================================
// Credential Settings
// =============================================================================

/// Where the bearer credential is read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSettings {
    /// Token file. Defaults to `token` in the platform data directory.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server endpoints.
    #[serde(default)]
    pub server: ServerSettings,

    /// Realtime connection timing.
    #[serde(default)]
    pub realtime: RealtimeSettings,

    /// Reconnect strategy.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Dropdown list settings.
    #[serde(default)]
    pub list: ListSettings,

    /// Credential lookup.
    #[serde(default)]
    pub credentials: CredentialSettings,
}

impl ClientConfig {
    /// Creates a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (notify.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        if let Some(ref url) = self.server.api_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ClientError::InvalidUrl(format!(
                    "API URL must start with http:// or https://, got: {}",
                    url
                )));
            }
        }

        if let Some(ref url) = self.server.hub_url {
            let allowed = ["http://", "https://", "ws://", "wss://"];
            if !allowed.iter().any(|scheme| url.starts_with(scheme)) {
                return Err(ClientError::InvalidUrl(format!(
                    "Hub URL must start with http(s):// or ws(s)://, got: {}",
                    url
                )));
            }
        }

        validate_page_size(self.list.page_size)?;

        if self.realtime.keepalive_interval_secs == 0 || self.realtime.server_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "keepalive and server timeout must be greater than 0".into(),
            ));
        }

        if self.realtime.server_timeout_secs <= self.realtime.keepalive_interval_secs {
            return Err(ClientError::InvalidConfig(
                "server_timeout_secs must exceed keepalive_interval_secs".into(),
            ));
        }

        if self.retry.strategy == RetryStrategy::Fixed && self.retry.delay_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "retry delay_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NOTIFY_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.server.api_base_url = Some(url);
        }

        if let Ok(url) = std::env::var("NOTIFY_HUB_URL") {
            debug!(url = %url, "Overriding hub URL from environment");
            self.server.hub_url = Some(url);
        }

        if let Ok(strategy) = std::env::var("NOTIFY_RETRY_STRATEGY") {
            match strategy.parse() {
                Ok(parsed) => self.retry.strategy = parsed,
                Err(_) => warn!(strategy = %strategy, "Unknown retry strategy in environment"),
            }
        }

        if let Ok(delay) = std::env::var("NOTIFY_RETRY_DELAY_MS") {
            if let Ok(ms) = delay.parse::<u64>() {
                self.retry.delay_ms = ms;
            }
        }

        if let Ok(max) = std::env::var("NOTIFY_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = max.parse::<u32>() {
                self.retry.max_attempts = n;
            }
        }

        if let Ok(size) = std::env::var("NOTIFY_PAGE_SIZE") {
            if let Ok(n) = size.parse::<u32>() {
                self.list.page_size = n;
            }
        }

        if let Ok(path) = std::env::var("NOTIFY_TOKEN_FILE") {
            self.credentials.token_file = Some(PathBuf::from(path));
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "notify", "client")
            .map(|dirs| dirs.config_dir().join("notify.toml"))
    }

    /// Returns the default token file path.
    pub fn default_token_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "notify", "client")
            .map(|dirs| dirs.data_dir().join("token"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the REST base URL if configured.
    pub fn api_base_url(&self) -> Option<&str> {
        self.server.api_base_url.as_deref()
    }

    /// Returns the hub URL if configured.
    pub fn hub_url(&self) -> Option<&str> {
        self.server.hub_url.as_deref()
    }

    /// Returns the token file, falling back to the platform default.
    pub fn token_file(&self) -> Option<PathBuf> {
        self.credentials
            .token_file
            .clone()
            .or_else(Self::default_token_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.realtime.connect_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.realtime.keepalive_interval_secs)
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.realtime.server_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_strategy_parsing() {
        assert_eq!("fixed".parse::<RetryStrategy>().unwrap(), RetryStrategy::Fixed);
        assert_eq!(
            "Exponential".parse::<RetryStrategy>().unwrap(),
            RetryStrategy::Exponential
        );
        assert_eq!(
            "backoff".parse::<RetryStrategy>().unwrap(),
            RetryStrategy::Exponential
        );
        assert!("linear".parse::<RetryStrategy>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.retry.strategy, RetryStrategy::Fixed);
        assert_eq!(config.retry.delay_ms, 5_000);
        assert_eq!(config.retry.max_attempts(), None);
        assert_eq!(config.list.page_size, 50);
        assert_eq!(config.keepalive_interval(), Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();

        config.server.api_base_url = Some("ftp://example.com".into());
        assert!(config.validate().is_err());

        config.server.api_base_url = Some("https://example.com/api".into());
        config.server.hub_url = Some("mailto:hub".into());
        assert!(config.validate().is_err());

        config.server.hub_url = Some("wss://example.com/hubs/notifications".into());
        assert!(config.validate().is_ok());

        config.list.page_size = 0;
        assert!(config.validate().is_err());
        config.list.page_size = 50;

        config.realtime.server_timeout_secs = config.realtime.keepalive_interval_secs;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_parsing_with_partial_sections() {
        let config: ClientConfig = toml::from_str(
            r#"
            [server]
            api_base_url = "https://example.com/api"

            [retry]
            strategy = "exponential"
            max_attempts = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.api_base_url(), Some("https://example.com/api"));
        assert_eq!(config.hub_url(), None);
        assert_eq!(config.retry.strategy, RetryStrategy::Exponential);
        assert_eq!(config.retry.max_attempts(), Some(8));
        assert_eq!(config.retry.delay_ms, 5_000);
        assert_eq!(config.list.page_size, 50);
    }

    #[test]
    fn test_toml_serialization() {
        let config = ClientConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[retry]"));
        assert!(toml_str.contains("[list]"));
    }

    #[test]
    fn test_build_policy_follows_strategy() {
        let settings = RetrySettings {
            max_attempts: 1,
            ..Default::default()
        };
        let mut policy = settings.build_policy();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(5_000)));
        assert_eq!(policy.next_delay(), None);
    }
}
