//! API server binary for the messaging subsystem
//!
//! Wires logging, the database, and the messaging router into one axum
//! application. The rest of the product (auth, listings, bookings) runs
//! elsewhere; this process only owns the inbox.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::routing::get;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing::info;

use messaging::logic::event::EventBus;
use messaging::repository::{Repository, sqlite::migrations};
use messaging::{MessagingService, MessagingServiceParams};
use shared::error::CommonError;

#[derive(Parser, Debug)]
#[command(name = "roadshare-api-server", about = "Roadshare messaging API server")]
struct Args {
    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Path to the sqlite database file; omitted means in-memory
    #[arg(long, env = "DB_PATH")]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CommonError> {
    shared::logging::configure_logging()?;
    let args = Args::parse();

    let (_db, conn) = match &args.db_path {
        Some(path) => shared::libsql::establish_local_connection(path).await?,
        None => shared::libsql::establish_in_memory_connection().await?,
    };
    shared::libsql::run_migrations(&conn, &migrations()).await?;

    let service = Arc::new(MessagingService::new(MessagingServiceParams {
        repository: Repository::new(conn),
        event_bus: EventBus::default(),
    }));

    let (router, api_spec) = messaging::router::create_router().split_for_parts();
    let app = router
        .route("/healthz", get(|| async { "ok" }))
        .route(
            "/api/openapi.json",
            get(move || {
                let spec = api_spec.clone();
                async move { Json(spec) }
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(service);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "messaging api server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler");
    }
}
