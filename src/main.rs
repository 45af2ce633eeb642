use std::sync::Arc;

use proctor_alerts::api;
use proctor_alerts::config::Config;
use proctor_alerts::proctor::ProctorHub;
use proctor_alerts::telemetry::{self, LogFormat};

#[tokio::main]
async fn main() {
    telemetry::init(LogFormat::from_env());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!("Starting proctoring alert server");

    let hub = match ProctorHub::from_config(&config) {
        Ok(hub) => Arc::new(hub),
        Err(e) => {
            tracing::error!(error = %e, "Failed to open persistence backend");
            std::process::exit(1);
        }
    };

    let bound = warp::serve(api::routes(hub)).try_bind_with_graceful_shutdown(
        config.bind_address(),
        async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        },
    );

    let (addr, server) = match bound {
        Ok(bound) => bound,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind server address");
            std::process::exit(1);
        }
    };

    tracing::info!(address = %addr, "Server listening");
    server.await;
}
