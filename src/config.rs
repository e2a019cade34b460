//! Configuration file handling.
//!
//! The configuration file is stored at `$BUDGET_HOME/config.json` and holds the dataset file name,
//! the HTTP listen address, the Google Sheet URL of the cloud mirror and the paths of the OAuth
//! files.

use crate::backup::Backup;
use crate::error::Res;
use crate::store::Store;
use crate::utils;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "budget";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const BACKUPS: &str = ".backups";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";
const DATA_FILE: &str = "budget_data.xlsx";
const HOST: &str = "127.0.0.1";
const PORT: u16 = 8000;
const MIRROR_TIMEOUT_SECS: u64 = 30;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$BUDGET_HOME` and from there it loads `$BUDGET_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the budget home directory, and it owns the `Store` for the dataset file.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    backups: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
    store: Store,
}

impl Config {
    /// Creates the data directory, its subdirectories and an initial `config.json`.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of data directory, e.g. `$HOME/budget`
    /// - `sheet_url` - The URL of the Google Sheet to mirror to. Empty disables the mirror.
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON, if the mirror is going to
    ///   be used. It is copied to its default location in the data directory.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail or if `sheet_url` is not a sheet URL.
    pub async fn create(
        dir: impl Into<PathBuf>,
        sheet_url: &str,
        secret_file: Option<&Path>,
    ) -> Res<Self> {
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the budget home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let backups = root.join(BACKUPS);
        utils::make_dir(&backups).await?;
        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        if let Some(secret_file) = secret_file {
            utils::copy(secret_file, secrets.join(CLIENT_SECRET_JSON)).await?;
        }

        let config_path = root.join(CONFIG_JSON);
        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self::assemble(
            root,
            config_path,
            config_file,
            spreadsheet_id,
        ))
    }

    /// This will
    /// - validate that `budget_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the backups directory exists
    /// - return the loaded configuration object
    pub async fn load(budget_home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = budget_home.into();
        if !maybe_relative.is_dir() {
            bail!(
                "The budget home directory is missing '{}', run 'budget init' first",
                maybe_relative.display()
            )
        }
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let config = Self::assemble(root, config_path, config_file, spreadsheet_id);
        if !config.backups.is_dir() {
            bail!(
                "The backups directory is missing '{}'",
                config.backups.display()
            )
        }
        Ok(config)
    }

    fn assemble(
        root: PathBuf,
        config_path: PathBuf,
        config_file: ConfigFile,
        spreadsheet_id: String,
    ) -> Self {
        let backups = root.join(BACKUPS);
        let data_path = resolve(&root, &config_file.data_file);
        let store = Store::new(&data_path, Backup::new(&backups, &data_path));
        Self {
            backups,
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
            spreadsheet_id,
            store,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups(&self) -> &Path {
        &self.backups
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    /// The record store for the dataset file. Clones of this `Config` share its write lock.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn data_path(&self) -> &Path {
        self.store.path()
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    /// The spreadsheet ID of the cloud mirror, or `None` when no sheet is configured.
    pub fn spreadsheet_id(&self) -> Option<&str> {
        if self.spreadsheet_id.is_empty() {
            None
        } else {
            Some(&self.spreadsheet_id)
        }
    }

    pub fn host(&self) -> &str {
        &self.config_file.host
    }

    pub fn port(&self) -> u16 {
        self.config_file.port
    }

    /// Whether a successful save is followed by a background push to the cloud mirror.
    pub fn auto_push(&self) -> bool {
        self.config_file.auto_push
    }

    pub fn mirror_timeout(&self) -> Duration {
        Duration::from_secs(self.config_file.mirror_timeout_secs)
    }

    /// Creates a new `Backup` instance for the dataset file.
    pub fn backup(&self) -> Backup {
        Backup::new(&self.backups, self.data_path())
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the relative path.
    pub fn client_secret_path(&self) -> PathBuf {
        resolve(&self.root, &self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        resolve(&self.root, &self.config_file.token_path())
    }

    #[cfg(test)]
    pub(crate) fn set_auto_push(&mut self, auto_push: bool) {
        self.config_file.auto_push = auto_push;
    }
}

/// Checks if `p` is relative, and if so, resolves it against `root`.
fn resolve(root: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() {
        return p.to_path_buf();
    }
    root.join(p)
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "budget",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCzAv1txRpL",
///   "data_file": "budget_data.xlsx",
///   "host": "127.0.0.1",
///   "port": 8000,
///   "auto_push": false,
///   "mirror_timeout_secs": 30,
///   "client_secret_path": ".secrets/client_secret.json",
///   "token_path": ".secrets/token.json"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "budget"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL of the Google Sheet used as the cloud mirror. Empty disables the mirror.
    #[serde(default)]
    sheet_url: String,

    /// The dataset file, relative to the home directory or absolute
    #[serde(default = "default_data_file")]
    data_file: PathBuf,

    /// Address the HTTP API listens on
    #[serde(default = "default_host")]
    host: String,

    #[serde(default = "default_port")]
    port: u16,

    /// Push to the cloud mirror in the background after every save
    #[serde(default)]
    auto_push: bool,

    /// Upper bound on one push or pull
    #[serde(default = "default_mirror_timeout_secs")]
    mirror_timeout_secs: u64,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to config.json or absolute)
    /// Defaults to $BUDGET_HOME/.secrets/client_secret.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to config.json or absolute)
    /// Defaults to $BUDGET_HOME/.secrets/token.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

fn default_data_file() -> PathBuf {
    PathBuf::from(DATA_FILE)
}

fn default_host() -> String {
    HOST.to_string()
}

fn default_port() -> u16 {
    PORT
}

fn default_mirror_timeout_secs() -> u64 {
    MIRROR_TIMEOUT_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            data_file: default_data_file(),
            host: default_host(),
            port: PORT,
            auto_push: false,
            mirror_timeout_secs: MIRROR_TIMEOUT_SECS,
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app
    pub async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Unable to load the config file")?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    pub async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// Gets the client secret path.
    ///
    /// If None, defaults to $BUDGET_HOME/.secrets/client_secret.json
    pub fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    /// Gets the token path.
    ///
    /// If None, defaults to $BUDGET_HOME/.secrets/token.json
    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID or an error if the URL format is invalid. Returns an empty string if the URL is empty.
fn extract_spreadsheet_id(url: &str) -> Res<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Ok(url);
    }

    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            let id_part = parts[i + 1];
            let id = id_part
                .split(['?', '#'])
                .next()
                .unwrap_or(id_part);
            if !id.is_empty() {
                return Ok(id);
            }
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}
