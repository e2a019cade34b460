//! A personal budget tracker. Income and expense transactions live in a workbook file with one
//! partition per kind, one per month and a Summary; the `reconcile` module keeps those views
//! consistent. The same commands back the CLI and the HTTP API, and the `mirror` module copies the
//! workbook to a Google Sheet.

pub mod args;
mod backup;
pub mod commands;
mod config;
mod error;
pub mod mirror;
pub mod model;
pub mod reconcile;
mod server;
mod store;
mod utils;

#[cfg(test)]
mod test;

pub use config::Config;
pub use error::{Error, ErrorType, Result};
pub use mirror::Mode;
pub use store::Store;
