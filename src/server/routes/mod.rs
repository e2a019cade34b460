//! API route definitions.

mod data;
mod health;
mod mirror;
mod transactions;

use crate::commands::Out;
use crate::server::AppState;
use crate::{Error, ErrorType, Result};
use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::fmt::Debug;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router with all routes
pub(crate) fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        // Transactions
        .route(
            "/api/transactions",
            get(transactions::list_transactions).post(transactions::create_transaction),
        )
        .route("/api/transactions/batch", post(transactions::save_batch))
        .route(
            "/api/transactions/:id",
            get(transactions::get_transaction)
                .put(transactions::update_transaction)
                .delete(transactions::delete_transaction),
        )
        // The dataset as a whole
        .route("/api/data", axum::routing::delete(data::clear_all))
        .route("/api/summary", get(data::get_summary))
        .route("/api/excel/download", get(data::download))
        .route("/api/excel/backup", post(data::backup))
        // Cloud mirror
        .route("/api/google-sheets/sync", post(mirror::sync))
        .route("/api/google-sheets/import", post(mirror::import))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Takes the structured data out of a command result. The commands behind these routes always
/// return one.
fn structure<T>(out: Out<T>) -> Result<T>
where
    T: Serialize + Clone + Debug,
{
    let message = out.message().to_string();
    out.into_structure().ok_or_else(|| {
        Error::new(
            ErrorType::Internal,
            anyhow::anyhow!("The command returned no data: {message}"),
        )
    })
}
