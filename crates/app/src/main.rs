mod files;
mod flash;
mod graphql;
mod pages;
mod problem;
mod router;
mod service;
mod session;
mod telemetry;

use std::net::SocketAddr;

use tracing::info;
use url::Url;

use jobboard_blob::{BlobStore, LocalStore, RemoteStore};
use jobboard_storage::Database;
use jobboard_util::{load_env_file, AppConfig, StorageBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;

    let files = match &config.storage {
        StorageBackend::Local => BlobStore::Local(LocalStore::new(config.upload_dir.clone())),
        StorageBackend::Remote {
            base_url,
            bucket,
            token,
        } => BlobStore::Remote(RemoteStore::new(
            Url::parse(base_url)?,
            bucket.clone(),
            token.clone(),
            reqwest::Client::new(),
        )),
    };
    info!(stage = "app", backend = files.backend(), "file storage ready");

    let state = router::AppState::new(metrics, database, files, &config);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| err.into())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(stage = "app", "shutdown signal received");
    }
}
