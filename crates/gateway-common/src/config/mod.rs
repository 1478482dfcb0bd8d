//! Configuration structs

mod gateway_config;

pub use gateway_config::{
    ApiConfig, ClientIdentity, ConfigError, ConnectionConfig, GatewayConfig, DEFAULT_API_BASE_URL,
    DEFAULT_GATEWAY_URL, DEFAULT_INTENTS,
};
