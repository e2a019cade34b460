//! On-demand backup and download of the dataset file.

use crate::commands::Out;
use crate::error::{ErrorType, IntoResult, Result};
use crate::{utils, Config};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// Copies the dataset file into the backups directory.
pub async fn backup(config: &Config) -> Result<Out<Option<PathBuf>>> {
    let path = config.store().backup_now().await?;
    Ok(match path {
        Some(path) => Out::new(format!("Backup created at {}", path.display()), Some(path)),
        None => Out::new("There is no dataset file to back up yet", None),
    })
}

/// The dataset file as it is on disk.
#[derive(Debug, Clone)]
pub struct DataFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Reads the raw dataset file, creating it first if it does not exist.
pub async fn download(config: &Config) -> Result<DataFile> {
    let bytes = config.store().read_bytes().await?;
    let file_name = config
        .data_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "budget_data.xlsx".to_string());
    Ok(DataFile { file_name, bytes })
}

/// Writes a copy of the dataset file to `output`, or to a file of the same name in the current
/// directory.
pub async fn download_to(config: &Config, output: Option<&Path>) -> Result<Out<PathBuf>> {
    let file = download(config).await?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&file.file_name));
    utils::write(&output, &file.bytes)
        .await
        .with_context(|| format!("Unable to write '{}'", output.display()))
        .pub_result(ErrorType::Storage)?;
    Ok(Out::new(
        format!("Saved the dataset to {}", output.display()),
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Workbook;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_backup_before_and_after_the_file_exists() {
        let env = TestEnv::new().await;
        let config = env.config();
        let out = backup(&config).await.unwrap();
        assert_eq!(out.structure(), Some(&None));

        let file = download(&config).await.unwrap();
        assert_eq!(file.file_name, "budget_data.xlsx");
        let workbook = Workbook::from_xlsx(&file.bytes).unwrap();
        assert!(workbook.get("Summary").is_some());

        let out = backup(&config).await.unwrap();
        let path = out.structure().unwrap().as_ref().unwrap();
        assert!(path.starts_with(config.backups()));
        assert!(out.message().starts_with("Backup created at"));
    }

    #[tokio::test]
    async fn test_download_to() {
        let env = TestEnv::new().await;
        let config = env.config();
        let output = config.root().join("copy.xlsx");
        let out = download_to(&config, Some(&output)).await.unwrap();
        assert_eq!(out.structure(), Some(&output));
        assert_eq!(
            std::fs::read(&output).unwrap(),
            std::fs::read(config.data_path()).unwrap()
        );
    }
}
