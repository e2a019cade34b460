//! Endpoints over the dataset as a whole: totals, clear, backup and download.

use crate::commands::{self, Out};
use crate::model::{Summary, XLSX_CONTENT_TYPE};
use crate::server::routes::structure;
use crate::server::AppState;
use crate::Result;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;

pub(crate) async fn get_summary(State(state): State<AppState>) -> Result<Json<Summary>> {
    let out = commands::summary(&state.config).await?;
    structure(out).map(Json)
}

pub(crate) async fn clear_all(State(state): State<AppState>) -> Result<Json<Out<Summary>>> {
    let out = commands::clear_all(&state.config, state.mode).await?;
    Ok(Json(out))
}

pub(crate) async fn backup(State(state): State<AppState>) -> Result<Json<Out<Option<PathBuf>>>> {
    let out = commands::backup(&state.config).await?;
    Ok(Json(out))
}

/// The dataset workbook as an attachment.
pub(crate) async fn download(State(state): State<AppState>) -> Result<Response> {
    let file = commands::download(&state.config).await?;
    let disposition = format!("attachment; filename=\"{}\"", file.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}
