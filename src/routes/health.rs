use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::config::StoreBackend;
use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let store = match state.config.store_backend {
        StoreBackend::Postgres => "postgres",
        StoreBackend::Memory => "memory",
    };
    (StatusCode::OK, Json(json!({ "status": "ok", "store": store })))
}
