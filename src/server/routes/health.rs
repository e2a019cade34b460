//! Service banner and liveness.

use axum::Json;
use serde_json::{json, Value};

pub(crate) async fn root() -> Json<Value> {
    Json(json!({
        "message": "Budget Tracker API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
