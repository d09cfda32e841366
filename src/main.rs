use casedesk::logging::{init_tracing, shutdown_tracer};
use casedesk::metrics::init_metrics;
use casedesk::router::init_router;
use casedesk::state::init_app_state;
use casedesk_config::ServerConfig;
use dotenvy::dotenv;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    let state = init_app_state().await;

    if let Err(e) = casedesk_db::run_migrations(&state.db).await {
        error!(error = %e, "Failed to apply migrations");
        std::process::exit(1);
    }

    let metrics_handle = init_metrics();
    if metrics_handle.is_none() {
        warn!("Observability disabled, /metrics will not be served");
    }

    let app = init_router(state, metrics_handle);

    let server_config = ServerConfig::from_env();
    let address = server_config.address();
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, %address, "Failed to bind listener");
            std::process::exit(1);
        }
    };

    info!(%address, "Server running");
    info!("Swagger UI available at http://{}/swagger-ui", address);
    info!("Scalar UI available at http://{}/scalar", address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
    }

    shutdown_tracer().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
