//! Command handlers shared by the CLI and the HTTP API.
//!
//! Every write is one load → mutate → save cycle through `Store::update`. After a successful save,
//! and when `auto_push` is on, the saved dataset is pushed to the cloud mirror in the background.

mod auth;
mod backup;
mod init;
mod serve;
mod summary;
mod sync;
mod transactions;

use crate::mirror::{Mirror, Mode};
use crate::model::Dataset;
use crate::Config;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use auth::{auth, auth_verify};
pub use backup::{backup, download, download_to, DataFile};
pub use init::init;
pub use serve::serve;
pub use summary::summary;
pub use sync::{sync_down, sync_up, SyncDown};
pub use transactions::{
    clear_all, create_transaction, delete_transaction, get_transaction, list_transactions,
    read_batch_file, save_all, update_transaction, TransactionFilter,
};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data to both the command line and the HTTP API.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Takes the structured data out of the `Out`.
    pub fn into_structure(self) -> Option<T> {
        self.structure
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }
}

/// Pushes `dataset` to the cloud mirror on a background task when `auto_push` is on. The caller
/// never waits for it and its outcome is only logged.
pub(crate) fn push_in_background(config: &Config, mode: Mode, dataset: Dataset) {
    if !config.auto_push() {
        return;
    }
    let mirror = Mirror::new(config, mode);
    if !mirror.is_enabled() {
        return;
    }
    tokio::spawn(async move {
        let status = mirror.push(&dataset).await;
        debug!("Background push finished: {}", status.message());
    });
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
