//! All-in-one entrypoint: Command Gateway and Application Consumer in one process.
//!
//! Uses NATS when `NATS_URL` is set, otherwise the in-process channel. The gateway
//! and the consumer still share nothing but the channel and the store.

use idempotent_ledger::infra::telemetry;
use idempotent_ledger::storage::ledger;
use idempotent_ledger::transport;
use idempotent_ledger::transport::events::EventChannel;
use idempotent_ledger::{
    ApplicationConsumer, ApplicationEngine, CommandGateway, Config, InMemoryChannel, NatsChannel,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(config.log_format);

    let store = ledger::connect(&config.database_url, config.db_max_connections).await?;

    let channel: Arc<dyn EventChannel> = match config.nats_url.as_deref() {
        Some(url) => Arc::new(NatsChannel::connect(url, &config.nats_subject, &config.nats_queue_group).await?),
        None => {
            info!("NATS_URL not set, using in-process event channel");
            Arc::new(InMemoryChannel::new())
        }
    };

    let engine = Arc::new(ApplicationEngine::new(store.clone()).with_timeout(config.apply_timeout));
    let consumer = ApplicationConsumer::new(engine).with_concurrency(config.worker_concurrency);
    let subscription = channel.subscribe().await?;
    let consumer_task = tokio::spawn(async move { consumer.run(subscription).await });

    let app_state = transport::http::AppState {
        gateway: Arc::new(CommandGateway::new(store, channel)),
    };
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    info!(addr = %config.http_bind_addr, "ledger listening (gateway + consumer)");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    consumer_task.abort();
    Ok(())
}
