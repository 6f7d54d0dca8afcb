use std::{path::PathBuf, sync::Arc};

use axum::Router;
use clap::Parser;
use learn_server::{
    api::{self, ApiDoc},
    certificate::render::HtmlRenderer,
    config::Config,
    platform::Platform,
    store::{MemoryStore, SqliteStore, Store},
    utils::init_log,
};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "learn_server.toml")]
    config: PathBuf,
    /// Database url, or `memory`
    #[arg(short, long)]
    database: Option<String>,
    #[arg(short = 'H', long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
}

fn app(platform: Arc<Platform>) -> Router {
    api::router(platform)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let _guard = init_log(config.log_dir.clone());

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Starting server at http://{}:{}", config.host, config.port);
    info!(
        "Swagger UI available at http://{}:{}/swagger-ui/",
        config.host, config.port
    );
    let expiry = Expiry::OnInactivity(time::Duration::days(config.session_days));

    if config.database == "memory" {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let platform = Arc::new(Platform::new(store, Arc::new(HtmlRenderer), &config));
        let sessions = SessionManagerLayer::new(tower_sessions::MemoryStore::default())
            .with_secure(false)
            .with_expiry(expiry);
        axum::serve(listener, app(platform).layer(sessions))
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        let store = SqliteStore::connect(&config.database).await?;
        let session_store = tower_sessions_sqlx_store::SqliteStore::new(store.database.clone());
        session_store.migrate().await?;
        let store: Arc<dyn Store> = Arc::new(store);
        let platform = Arc::new(Platform::new(store, Arc::new(HtmlRenderer), &config));
        let sessions = SessionManagerLayer::new(session_store)
            .with_secure(false)
            .with_expiry(expiry);
        axum::serve(listener, app(platform).layer(sessions))
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }
    Ok(())
}
