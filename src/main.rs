use anyhow::Context;
use sirene::{build_node, Config, MonotonicClock, MqttTransport, Runtime, SignalBus};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sirene::init();
    info!("{}", sirene::build_summary());

    let config_path = std::env::args()
        .nth(1)
        .context("Usage: sirene <config.yaml>")?;

    let config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load {}", config_path))?;
    info!("Running as {} node '{}'", config.node.role, config.node.name());

    let bus = SignalBus::new();
    let node = build_node(&config, &bus, Arc::new(MonotonicClock::new()))?;
    let (mut transport, events) = MqttTransport::connect(&config.mqtt, node.subscriptions())?;
    let mut runtime = Runtime::new(node, config.scan_time_ms);

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        res = runtime.run(events, &mut transport) => {
            res.context("Control loop failed")?;
        }
    }

    let stats = runtime.stats();
    info!(
        "Final stats: {} scans, {} errors, {} messages in, {} out, uptime: {}s",
        stats.scan_count, stats.error_count, stats.messages_in, stats.messages_out, stats.uptime_secs
    );

    Ok(())
}
