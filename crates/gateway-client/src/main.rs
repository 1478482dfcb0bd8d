//! Gateway client entry point
//!
//! Run with:
//! ```bash
//! GATEWAY_TOKEN=... cargo run -p gateway-client
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).

use gateway_client::{GatewayClient, HttpRestClient, Method, OpCode, RestTransport};
use gateway_common::{try_init_tracing_with_config, GatewayConfig, TracingConfig};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::from_env()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting gateway client...");

    // Missing credentials are the one unrecoverable error
    let config = GatewayConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        url = %config.connection.gateway_url,
        intents = config.intents,
        "Configuration loaded"
    );

    let rest = Arc::new(HttpRestClient::from_config(&config)?);
    let client = GatewayClient::new(config);

    client.on_ready(move |envelope| {
        let rest = Arc::clone(&rest);
        async move {
            info!(event = ?envelope.event_name(), "Session is ready");
            match rest.request(Method::Get, "/users/@me", None).await {
                Ok(body) => info!(bytes = body.len(), "Fetched current user"),
                Err(e) => warn!(error = %e, "Failed to fetch current user"),
            }
        }
    });

    client.on_opcode(OpCode::Dispatch, |envelope| async move {
        info!(event = ?envelope.event_name(), seq = ?envelope.s, "Dispatch received");
    });

    let mut lifecycle = client.watch_lifecycle();
    tokio::spawn(async move {
        while lifecycle.changed().await.is_ok() {
            let state = *lifecycle.borrow_and_update();
            info!(state = %state, "Lifecycle changed");
        }
    });

    let handle = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.shutdown();
        }
    });

    client.run().await?;

    info!("Gateway client exited");
    Ok(())
}
