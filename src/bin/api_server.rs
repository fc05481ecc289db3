// src/bin/api_server.rs

use idempotent_ledger::infra::telemetry;
use idempotent_ledger::storage::ledger;
use idempotent_ledger::transport;
use idempotent_ledger::{CommandGateway, Config, NatsChannel};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(config.log_format);

    // --- Store Initialization ---
    info!("initializing ledger store");
    let store = ledger::connect(&config.database_url, config.db_max_connections).await?;

    // --- Event Channel Initialization ---
    let nats_url = config.require_nats_url()?;
    let channel = NatsChannel::connect(nats_url, &config.nats_subject, &config.nats_queue_group).await?;

    let app_state = transport::http::AppState {
        gateway: Arc::new(CommandGateway::new(store, Arc::new(channel))),
    };

    // --- API Server Initialization ---
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    info!(addr = %config.http_bind_addr, "API server listening (Swagger UI at /swagger-ui)");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}
