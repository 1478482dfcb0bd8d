//! # gateway-common
//!
//! Shared utilities for the gateway client: configuration loading and telemetry.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    ApiConfig, ClientIdentity, ConfigError, ConnectionConfig, GatewayConfig, DEFAULT_API_BASE_URL,
    DEFAULT_GATEWAY_URL, DEFAULT_INTENTS,
};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
