//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::mirror::{Mode, TestSheet};
use crate::Config;
use tempfile::TempDir;
use uuid::Uuid;

/// A budget home directory in a temp dir with a `Config` whose mirror points at a fresh
/// `TestSheet`. The dataset file is not created until something reads the store.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment whose sheet URL has a random spreadsheet ID.
    pub async fn new() -> Self {
        let rand = Uuid::new_v4().to_string().replace('-', "");
        let sheet_url = format!("https://docs.google.com/spreadsheets/d/{rand}/edit");
        Self::create(&sheet_url).await
    }

    /// Creates a test environment without a sheet URL, so the mirror is disabled.
    pub async fn without_mirror() -> Self {
        Self::create("").await
    }

    /// Like `new` but every save is followed by a background push.
    pub async fn with_auto_push() -> Self {
        let mut env = Self::new().await;
        env.config.set_auto_push(true);
        env
    }

    async fn create(sheet_url: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("budget");
        let secret_path = temp_dir.path().join("client_secret.json");

        // Create minimal client_secret.json
        let secret_content = r#"{
            "installed": {
                "client_id": "test-client-id",
                "client_secret": "test-secret",
                "redirect_uris": ["http://localhost"],
                "auth_uri": "https://accounts.google.com/o/oauth2/auth",
                "token_uri": "https://oauth2.googleapis.com/token"
            }
        }"#;
        std::fs::write(&secret_path, secret_content).unwrap();

        let config = Config::create(&root, sheet_url, Some(&secret_path))
            .await
            .unwrap();

        Self {
            _temp_dir: temp_dir,
            config,
        }
    }

    /// Returns a clone of the Config. Clones share the store's write lock.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    pub fn mode(&self) -> Mode {
        Mode::Testing
    }

    /// The `TestSheet` the mirror of this environment writes to.
    pub fn sheet(&self) -> TestSheet {
        TestSheet::new(self.config.spreadsheet_id().unwrap_or_default())
    }
}
