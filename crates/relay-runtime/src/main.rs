//! Agent relay entry point.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use connection_registry::{DatabaseDriver, InMemoryDriver};
use event_bus::{BusBackend, InMemoryBusBackend};
use relay_runtime::RelayRuntime;
use relay_telemetry::TelemetryConfig;
use shared_types::RelayConfig;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = relay_telemetry::init(&TelemetryConfig::from_env()) {
        eprintln!("telemetry initialization failed: {e}");
        return ExitCode::FAILURE;
    }

    match run().await {
        Ok(forced) => {
            if forced {
                // Graceful steps hung; the ceiling already logged it.
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!(error = %e, "[runtime] Fatal");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the shutdown ceiling forced the exit.
async fn run() -> anyhow::Result<bool> {
    let config = RelayConfig::from_env()?;
    config.validate()?;
    info!(
        bus_host = %config.bus.host,
        bus_port = config.bus.port,
        "[runtime] Configuration loaded"
    );

    // The default deployment runs single-process with in-memory links; a
    // distributed deployment swaps in driver/backend implementations over
    // real clients behind the same traits.
    let driver: Arc<dyn DatabaseDriver> = Arc::new(InMemoryDriver::new());
    let backend: Arc<dyn BusBackend> = Arc::new(InMemoryBusBackend::new());

    let runtime = RelayRuntime::build(config, driver, backend);
    runtime.start().await?;
    runtime.run_until_shutdown().await;
    Ok(!runtime.shutdown().await)
}
