//! Cloud mirror endpoints. A mirror that cannot be reached answers 502 with the status as the
//! body; a disabled mirror is not a failure.

use crate::commands::{self, SyncDown};
use crate::mirror::MirrorStatus;
use crate::server::routes::structure;
use crate::server::AppState;
use crate::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

fn status_code(status: &MirrorStatus) -> StatusCode {
    match status {
        MirrorStatus::Unavailable { .. } => StatusCode::BAD_GATEWAY,
        MirrorStatus::Success { .. } | MirrorStatus::Disabled { .. } => StatusCode::OK,
    }
}

/// Pushes the local dataset to the cloud sheet.
pub(crate) async fn sync(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<MirrorStatus>)> {
    let status = structure(commands::sync_up(&state.config, state.mode).await?)?;
    Ok((status_code(&status), Json(status)))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImportQuery {
    #[serde(default)]
    apply: bool,
}

/// Reads the cloud sheet. With `?apply=true` the pulled kinds replace the local ones.
pub(crate) async fn import(
    State(state): State<AppState>,
    Query(query): Query<ImportQuery>,
) -> Result<(StatusCode, Json<SyncDown>)> {
    let pulled = structure(commands::sync_down(&state.config, state.mode, query.apply).await?)?;
    Ok((status_code(&pulled.status), Json(pulled)))
}
