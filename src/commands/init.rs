use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `sheet_url` along with default settings
/// - Copies `secret_file`, if given, into its default location in the data dir
/// - Creates the dataset file with every partition and its headers
///
/// # Arguments
/// - `budget_home` - The directory that will be the root of data directory, e.g. `$HOME/budget`
/// - `sheet_url` - The URL of the Google Sheet to mirror to. Empty leaves the mirror disabled.
///   e.g. https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
///   OAuth workflow.
///
/// # Errors
/// - Returns an error if any file operations fail or if `sheet_url` is not a sheet URL.
pub async fn init(
    budget_home: &Path,
    sheet_url: &str,
    secret_file: Option<&Path>,
) -> Result<Out<()>> {
    let config = Config::create(budget_home, sheet_url, secret_file)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    let _ = config.store().read().await?;
    Ok(format!(
        "Successfully created the budget directory at {}",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("budget");
        let out = init(&home, "", None).await.unwrap();
        assert!(out.message().starts_with("Successfully created"));
        assert!(home.join("config.json").is_file());
        assert!(home.join("budget_data.xlsx").is_file());
        assert!(home.join(".backups").is_dir());
    }

    #[tokio::test]
    async fn test_init_bad_url() {
        let dir = TempDir::new().unwrap();
        let err = init(dir.path(), "https://example.com/nope", None)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Config);
    }
}
