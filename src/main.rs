use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower::make::Shared;
use tracing_subscriber::EnvFilter;

use kanban_backend::auth::jwt::JwtService;
use kanban_backend::config::{AppConfig, StoreBackend};
use kanban_backend::db;
use kanban_backend::notify::{InvitationNotifier, LogNotifier, WebhookNotifier};
use kanban_backend::routes;
use kanban_backend::state::AppState;
use kanban_backend::store::{EntityStore, MemoryTableStore, PgTableStore, TableStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        store_backend = ?config.store_backend,
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        invitation_ttl_hours = config.invitation_ttl_hours,
        webhook_enabled = config.invitation_webhook_url.is_some(),
        "loaded backend configuration"
    );

    let backend: Arc<dyn TableStore> = match (config.store_backend, config.database_url.as_deref()) {
        (StoreBackend::Postgres, Some(database_url)) => {
            let pool = db::init_pool_with_size(database_url, config.database_max_pool_size)?;
            db::run_migrations(&pool).await?;
            Arc::new(PgTableStore::new(pool))
        }
        (StoreBackend::Postgres, None) => {
            anyhow::bail!("DATABASE_URL must be set for the postgres backend")
        }
        (StoreBackend::Memory, _) => {
            tracing::warn!("using the in-memory store; data is lost on shutdown");
            Arc::new(MemoryTableStore::new())
        }
    };
    let store = EntityStore::new(backend);
    store.ensure_tables().await?;

    let notifier: Arc<dyn InvitationNotifier> = match config.invitation_webhook_url.as_deref() {
        Some(url) => Arc::new(WebhookNotifier::new(url)?),
        None => Arc::new(LogNotifier),
    };
    let jwt = JwtService::from_config(&config)?;

    let listen_addr: SocketAddr =
        format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(store, config, notifier, jwt);
    let router = routes::create_router(state)?;

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(listener, Shared::new(router)).await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
