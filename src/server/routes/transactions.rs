//! Transaction endpoints

use crate::commands::{self, Out, TransactionFilter};
use crate::model::{MonthKey, Record, RecordInput, RecordKind};
use crate::server::routes::structure;
use crate::server::AppState;
use crate::{Error, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// `?type=income&month=2024-01`. Empty values are the same as absent ones.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    month: Option<String>,
}

impl ListQuery {
    fn filter(&self) -> Result<TransactionFilter> {
        let kind = non_empty(&self.kind)
            .map(RecordKind::from_str)
            .transpose()
            .map_err(Error::request)?;
        let month = non_empty(&self.month)
            .map(MonthKey::parse_numeric)
            .transpose()
            .map_err(Error::request)?;
        Ok(TransactionFilter { kind, month })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub(crate) async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Record>>> {
    let out = commands::list_transactions(&state.config, query.filter()?).await?;
    Ok(Json(out.into_structure().unwrap_or_default()))
}

pub(crate) async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Record>> {
    let out = commands::get_transaction(&state.config, id).await?;
    structure(out).map(Json)
}

pub(crate) async fn create_transaction(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Record>)> {
    let input = RecordInput::from_value(body)?;
    let out = commands::create_transaction(&state.config, state.mode, input).await?;
    Ok((StatusCode::CREATED, Json(structure(out)?)))
}

/// The whole-collection write: each kind present in the body replaces the stored transactions of
/// that kind.
pub(crate) async fn save_batch(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Vec<Record>>> {
    let inputs = RecordInput::list_from_value(body)?;
    let out = commands::save_all(&state.config, state.mode, inputs).await?;
    Ok(Json(out.into_structure().unwrap_or_default()))
}

pub(crate) async fn update_transaction(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Result<Json<Record>> {
    let input = RecordInput::from_value(body)?;
    let out = commands::update_transaction(&state.config, state.mode, id, input).await?;
    structure(out).map(Json)
}

pub(crate) async fn delete_transaction(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Out<Record>>> {
    let out = commands::delete_transaction(&state.config, state.mode, id).await?;
    Ok(Json(out))
}
