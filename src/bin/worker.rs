// src/bin/worker.rs

use idempotent_ledger::infra::telemetry;
use idempotent_ledger::storage::ledger;
use idempotent_ledger::transport::events::EventChannel;
use idempotent_ledger::{ApplicationConsumer, ApplicationEngine, Config, NatsChannel};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(config.log_format);

    let store = ledger::connect(&config.database_url, config.db_max_connections).await?;
    let engine = Arc::new(ApplicationEngine::new(store).with_timeout(config.apply_timeout));
    let consumer = ApplicationConsumer::new(engine).with_concurrency(config.worker_concurrency);

    let nats_url = config.require_nats_url()?;
    let channel = NatsChannel::connect(nats_url, &config.nats_subject, &config.nats_queue_group).await?;
    let subscription = channel.subscribe().await?;

    info!("worker running");
    tokio::select! {
        stats = consumer.run(subscription) => {
            info!(?stats, "subscription closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
