use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use axum::Router;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventhub_server::config::Config;
use eventhub_server::routes::create_routes;
use eventhub_server::state::AppState;
use eventhub_server::store::PgStore;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store = match PgStore::connect(&config.database_url, config.db_max_connections).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Successfully connected to database");

    if let Err(e) = store.migrate().await {
        tracing::error!(error = %e, "Failed to run migrations");
        return ExitCode::FAILURE;
    }

    tracing::info!("Migrations run successfully");

    if let Err(e) = tokio::fs::create_dir_all(&config.upload_dir).await {
        tracing::warn!(
            error = %e,
            dir = %config.upload_dir.display(),
            "Could not create upload directory"
        );
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app: Router = create_routes(AppState::new(Arc::new(store), config));

    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind address");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("🚀 Server running at http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
