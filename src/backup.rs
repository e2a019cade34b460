//! Backup copies of the dataset file.

use crate::error::Res;
use crate::utils;
use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Prefix of every dataset backup file.
pub const PREFIX: &str = "budget_data_backup";

/// Backups are byte copies of the dataset file, an `.xlsx` workbook.
const EXTENSION: &str = "xlsx";

/// Copies the dataset file into the backups directory.
///
/// Backups are only ever added. Nothing here deletes or overwrites one.
/// Create a new instance via `Config::backup()` or `Backup::new()`.
#[derive(Debug, Clone)]
pub struct Backup {
    backups_dir: PathBuf,
    data_path: PathBuf,
}

impl Backup {
    pub fn new(backups_dir: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            data_path: data_path.into(),
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Copies the current dataset file to `budget_data_backup_YYYYMMDD_HHMMSS.xlsx`. When a backup
    /// with that name already exists (two saves within one second) a `-N` suffix is added.
    ///
    /// Returns the path of the new backup, or `None` if there is no dataset file yet.
    pub async fn copy_data_file(&self, now: DateTime<FixedOffset>) -> Res<Option<PathBuf>> {
        if !utils::exists(&self.data_path).await? {
            debug!(
                "No dataset file at {}, nothing to back up",
                self.data_path.display()
            );
            return Ok(None);
        }

        let stem = format!("{PREFIX}_{}", now.format("%Y%m%d_%H%M%S"));
        let mut path = self.backups_dir.join(backup_file_name(&stem, 0));
        let mut seq: u32 = 0;
        while utils::exists(&path).await? {
            seq += 1;
            path = self.backups_dir.join(backup_file_name(&stem, seq));
        }

        utils::copy(&self.data_path, &path).await?;
        debug!("Backed up the dataset file to {}", path.display());
        Ok(Some(path))
    }
}

fn backup_file_name(stem: &str, seq: u32) -> String {
    if seq == 0 {
        format!("{stem}.{EXTENSION}")
    } else {
        format!("{stem}-{seq}.{EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-15T09:30:05+01:00").unwrap()
    }

    #[test]
    fn test_backup_file_name() {
        assert_eq!(
            backup_file_name("budget_data_backup_20240115_093005", 0),
            "budget_data_backup_20240115_093005.xlsx"
        );
        assert_eq!(
            backup_file_name("budget_data_backup_20240115_093005", 2),
            "budget_data_backup_20240115_093005-2.xlsx"
        );
    }

    #[tokio::test]
    async fn test_nothing_to_back_up() {
        let dir = TempDir::new().unwrap();
        let backup = Backup::new(dir.path(), dir.path().join("budget_data.xlsx"));
        assert!(backup.copy_data_file(now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_second_backups_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let backups = dir.path().join(".backups");
        utils::make_dir(&backups).await.unwrap();
        let data = dir.path().join("budget_data.xlsx");
        let backup = Backup::new(&backups, &data);

        utils::write(&data, "first").await.unwrap();
        let first = backup.copy_data_file(now()).await.unwrap().unwrap();
        utils::write(&data, "second").await.unwrap();
        let second = backup.copy_data_file(now()).await.unwrap().unwrap();
        let third = backup.copy_data_file(now()).await.unwrap().unwrap();

        assert_eq!(
            first.file_name().unwrap(),
            "budget_data_backup_20240115_093005.xlsx"
        );
        assert_eq!(
            second.file_name().unwrap(),
            "budget_data_backup_20240115_093005-1.xlsx"
        );
        assert_eq!(
            third.file_name().unwrap(),
            "budget_data_backup_20240115_093005-2.xlsx"
        );
        assert_eq!(utils::read(&first).await.unwrap(), "first");
        assert_eq!(utils::read(&second).await.unwrap(), "second");
    }
}
