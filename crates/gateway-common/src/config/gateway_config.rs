//! Gateway client configuration
//!
//! Loads the credential, intents and connection tuning from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default gateway address used before any session hands out a resume address
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Default REST API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

/// Default intents: GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
pub const DEFAULT_INTENTS: u64 = 33_281;

/// Main gateway client configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Bot token, sent in Identify/Resume and the REST Authorization header
    pub token: String,
    /// Gateway intents bitmask
    pub intents: u64,
    pub connection: ConnectionConfig,
    pub api: ApiConfig,
    pub identity: ClientIdentity,
}

/// Socket connection and reconnect tuning
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub gateway_url: String,
    pub hello_timeout_ms: u64,
    pub auto_restart: bool,
    pub zombie_detection: bool,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub handler_drain_timeout_ms: u64,
}

impl ConnectionConfig {
    #[must_use]
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_millis(self.hello_timeout_ms)
    }

    #[must_use]
    pub fn handler_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_drain_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            hello_timeout_ms: default_hello_timeout_ms(),
            auto_restart: true,
            zombie_detection: true,
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            handler_drain_timeout_ms: default_handler_drain_timeout_ms(),
        }
    }
}

/// REST API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl ApiConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_ms: default_api_timeout_ms(),
        }
    }
}

/// Client properties reported in Identify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl ClientIdentity {
    /// Full client name, e.g. `gateway-client (https://..., 0.1.0)`
    #[must_use]
    pub fn client_name() -> String {
        format!(
            "{} ({}, {})",
            CLIENT_NAME,
            CLIENT_REPOSITORY,
            env!("CARGO_PKG_VERSION")
        )
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        let name = Self::client_name();
        Self {
            os: env::consts::OS.to_string(),
            browser: name.clone(),
            device: name,
        }
    }
}

const CLIENT_NAME: &str = "gateway-client";
const CLIENT_REPOSITORY: &str = "https://github.com/seung/gateway-client";

// Default value functions
fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_hello_timeout_ms() -> u64 {
    20_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_handler_drain_timeout_ms() -> u64 {
    5_000
}

fn default_api_timeout_ms() -> u64 {
    10_000 // 10 seconds
}

impl GatewayConfig {
    /// Build a configuration with defaults for everything but the credential
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            intents: DEFAULT_INTENTS,
            connection: ConnectionConfig::default(),
            api: ApiConfig::default(),
            identity: ClientIdentity::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `GATEWAY_TOKEN` is missing or a value fails to parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup("GATEWAY_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingVar("GATEWAY_TOKEN"))?;

        let defaults = ConnectionConfig::default();
        let connection = ConnectionConfig {
            gateway_url: lookup("GATEWAY_URL").unwrap_or(defaults.gateway_url),
            hello_timeout_ms: parse_nonzero(&lookup, "GATEWAY_HELLO_TIMEOUT_MS")?
                .unwrap_or(defaults.hello_timeout_ms),
            auto_restart: parse_var(&lookup, "GATEWAY_AUTO_RESTART")?
                .unwrap_or(defaults.auto_restart),
            zombie_detection: parse_var(&lookup, "GATEWAY_ZOMBIE_DETECTION")?
                .unwrap_or(defaults.zombie_detection),
            backoff_base_ms: parse_nonzero(&lookup, "GATEWAY_BACKOFF_BASE_MS")?
                .unwrap_or(defaults.backoff_base_ms),
            backoff_max_ms: parse_nonzero(&lookup, "GATEWAY_BACKOFF_MAX_MS")?
                .unwrap_or(defaults.backoff_max_ms),
            handler_drain_timeout_ms: parse_var(&lookup, "GATEWAY_HANDLER_DRAIN_TIMEOUT_MS")?
                .unwrap_or(defaults.handler_drain_timeout_ms),
        };

        if connection.backoff_max_ms < connection.backoff_base_ms {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_BACKOFF_MAX_MS",
                "must not be lower than GATEWAY_BACKOFF_BASE_MS".to_string(),
            ));
        }

        let api = ApiConfig {
            base_url: lookup("API_BASE_URL").unwrap_or_else(default_api_base_url),
            timeout_ms: parse_nonzero(&lookup, "API_TIMEOUT_MS")?
                .unwrap_or_else(default_api_timeout_ms),
        };

        let default_identity = ClientIdentity::default();
        let identity = ClientIdentity {
            os: lookup("GATEWAY_OS").unwrap_or(default_identity.os),
            browser: lookup("GATEWAY_BROWSER").unwrap_or(default_identity.browser),
            device: lookup("GATEWAY_DEVICE").unwrap_or(default_identity.device),
        };

        Ok(Self {
            token,
            intents: parse_var(&lookup, "GATEWAY_INTENTS")?.unwrap_or(DEFAULT_INTENTS),
            connection,
            api,
            identity,
        })
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"[redacted]")
            .field("intents", &self.intents)
            .field("connection", &self.connection)
            .field("api", &self.api)
            .field("identity", &self.identity)
            .finish()
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, raw)),
    }
}

fn parse_nonzero<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<u64, F>(lookup, name)? {
        Some(0) => Err(ConfigError::InvalidValue(name, "0".to_string())),
        other => Ok(other),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
