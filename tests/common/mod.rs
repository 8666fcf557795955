use std::env;
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use kanban_backend::auth::jwt::JwtService;
use kanban_backend::auth::AuthenticatedUser;
use kanban_backend::config::{AppConfig, StoreBackend, DEFAULT_AUDIT_LOG_LIMIT};
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use kanban_backend::db::{self, PgPool};
use kanban_backend::notify::{InvitationContext, InvitationNotifier};
use kanban_backend::routes;
use kanban_backend::state::AppState;
use kanban_backend::store::{EntityStore, MemoryTableStore, PgTableStore, TableStore};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone, Debug)]
pub struct SentInvitation {
    pub to: String,
    pub link: String,
    pub workspace_name: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentInvitation>>,
}

#[async_trait]
impl InvitationNotifier for RecordingNotifier {
    async fn send(&self, to: &str, link: &str, context: &InvitationContext) -> Result<()> {
        self.sent.lock().await.push(SentInvitation {
            to: to.to_string(),
            link: link.to_string(),
            workspace_name: context.workspace_name.clone(),
        });
        Ok(())
    }
}

impl RecordingNotifier {
    #[allow(dead_code)]
    pub async fn sent(&self) -> Vec<SentInvitation> {
        self.sent.lock().await.clone()
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_backend(Arc::new(MemoryTableStore::new()), StoreBackend::Memory, None).await
    }

    /// App backed by the database at `TEST_DATABASE_URL`, or `None` when it
    /// is not configured. Callers hold [`acquire_db_lock`] for the test.
    #[allow(dead_code)]
    pub async fn postgres() -> Result<Option<Self>> {
        let Some((database_url, backend)) = postgres_backend().await? else {
            return Ok(None);
        };
        let app = Self::with_backend(
            Arc::new(backend),
            StoreBackend::Postgres,
            Some(database_url),
        )
        .await?;
        Ok(Some(app))
    }

    async fn with_backend(
        backend: Arc<dyn TableStore>,
        store_backend: StoreBackend,
        database_url: Option<String>,
    ) -> Result<Self> {
        let config = AppConfig {
            store_backend,
            database_url,
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            cors_allowed_origin: None,
            invitation_ttl_hours: 72,
            invitation_base_url: "http://localhost/invitations".to_string(),
            invitation_webhook_url: None,
            audit_log_default_limit: DEFAULT_AUDIT_LOG_LIMIT,
        };

        let store = EntityStore::new(backend);
        store.ensure_tables().await?;
        let notifier = Arc::new(RecordingNotifier::default());
        let notifier_for_state: Arc<dyn InvitationNotifier> = notifier.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(store, config, notifier_for_state, jwt);
        let router = routes::create_router(state.clone())?;

        Ok(Self {
            state,
            router,
            notifier,
        })
    }

    #[allow(dead_code)]
    pub fn notifier(&self) -> Arc<RecordingNotifier> {
        self.notifier.clone()
    }

    /// Mints a bearer token the way the identity provider would.
    pub fn user_token(&self, name: &str) -> Result<(AuthenticatedUser, String)> {
        let user = AuthenticatedUser {
            user_id: Uuid::new_v4(),
            display_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
        };
        let token = self.state.jwt.generate_token(&user)?;
        Ok((user, token))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PUT, path, payload, token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

#[allow(dead_code)]
pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

/// Migrated, emptied Postgres table store for `TEST_DATABASE_URL`.
#[allow(dead_code)]
pub async fn postgres_backend() -> Result<Option<(String, PgTableStore)>> {
    let Ok(database_url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping postgres test");
        return Ok(None);
    };
    let pool = db::init_pool_with_size(&database_url, db::DEFAULT_MAX_POOL_SIZE)?;
    prepare_database(&pool).await?;
    Ok(Some((database_url, PgTableStore::new(pool))))
}

#[allow(dead_code)]
async fn prepare_database(pool: &PgPool) -> Result<()> {
    db::run_migrations(pool).await?;
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("truncate task panicked")?
}

#[allow(dead_code)]
fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute("TRUNCATE TABLE entity_row_index, entity_rows, entity_tables;")
        .context("failed to truncate tables")?;
    Ok(())
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

/// Asserts the status and decodes the JSON body.
pub async fn expect_json<T: DeserializeOwned>(
    response: hyper::Response<Body>,
    expected: StatusCode,
) -> Result<T> {
    let status = response.status();
    let body = body_to_vec(response.into_body()).await?;
    ensure!(
        status == expected,
        "expected {expected}, got {status}: {}",
        String::from_utf8_lossy(&body)
    );
    Ok(serde_json::from_slice(&body)?)
}
