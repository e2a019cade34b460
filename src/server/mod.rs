//! The HTTP API. Every handler is a thin wrapper around a function in `commands`.

mod error;
mod routes;

use crate::error::Res;
use crate::mirror::Mode;
use crate::Config;
use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

pub(crate) use routes::create_router;

/// Shared by every handler. Clones of `config` share the store's write lock, so requests that
/// write are serialized.
#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub(crate) config: Config,
    pub(crate) mode: Mode,
}

impl AppState {
    pub(crate) fn new(config: Config, mode: Mode) -> Self {
        Self { config, mode }
    }
}

/// Serves the API on `addr` until the process is stopped.
pub(crate) async fn run(state: AppState, addr: SocketAddr) -> Res<()> {
    let router = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))?;

    info!("Budget API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .await
        .context("The HTTP server stopped with an error")?;
    Ok(())
}
