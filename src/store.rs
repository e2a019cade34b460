//! The record store: the dataset file, loaded and saved as one unit.

use crate::backup::Backup;
use crate::error::{ErrorType, IntoResult, Res, Result};
use crate::model::{Dataset, Workbook};
use crate::utils;
use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

/// Loads and saves the dataset file. Clones share one write lock, so every load → mutate → save
/// cycle that goes through [`Store::update`] runs alone within the process.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
    backup: Backup,
    lock: Arc<Mutex<()>>,
}

impl Store {
    pub(crate) fn new(path: impl Into<PathBuf>, backup: Backup) -> Self {
        Self {
            path: path.into(),
            backup,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the dataset file. A missing file is an empty dataset: it is created with every
    /// expected partition and its headers, saved, and returned.
    ///
    /// # Errors
    /// A file that exists but cannot be read or parsed is an error.
    pub(crate) async fn load(&self, now: DateTime<FixedOffset>) -> Res<Dataset> {
        if !utils::exists(&self.path).await? {
            let dataset = Dataset::empty(now);
            self.write(&dataset).await?;
            info!("Created a new dataset file at {}", self.path.display());
            return Ok(dataset);
        }
        trace!("Loading {}", self.path.display());
        let bytes = utils::read_bytes(&self.path).await?;
        let workbook = Workbook::from_xlsx(&bytes).context("The dataset file is unreadable")?;
        Ok(Dataset::from_workbook(workbook, now))
    }

    /// Writes `dataset` over the dataset file, first copying the previous file into the backups
    /// directory. Returns the backup path, if there was a previous file.
    pub(crate) async fn save(
        &self,
        dataset: &Dataset,
        now: DateTime<FixedOffset>,
    ) -> Res<Option<PathBuf>> {
        let backup = self
            .backup
            .copy_data_file(now)
            .await
            .context("Unable to back up the dataset file before saving")?;
        self.write(dataset).await?;
        Ok(backup)
    }

    /// Runs one load → mutate → save cycle under the write lock. `f` receives the dataset and the
    /// processing timestamp. When `f` fails nothing is saved.
    pub async fn update<T, F>(&self, f: F) -> Result<(T, Dataset)>
    where
        F: FnOnce(&mut Dataset, DateTime<FixedOffset>) -> Result<T>,
    {
        let _guard = self.lock.lock().await;
        let now = utils::now();
        let mut dataset = self.load(now).await.pub_result(ErrorType::Storage)?;
        let out = f(&mut dataset, now)?;
        let backup = self
            .save(&dataset, now)
            .await
            .pub_result(ErrorType::Storage)?;
        if let Some(backup) = backup {
            debug!("Previous dataset saved to {}", backup.display());
        }
        Ok((out, dataset))
    }

    /// Loads the current dataset.
    pub async fn read(&self) -> Result<Dataset> {
        let _guard = self.lock.lock().await;
        self.load(utils::now())
            .await
            .pub_result(ErrorType::Storage)
    }

    /// The raw bytes of the dataset file, creating it first if necessary.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        let _guard = self.lock.lock().await;
        let _ = self
            .load(utils::now())
            .await
            .pub_result(ErrorType::Storage)?;
        utils::read_bytes(&self.path)
            .await
            .pub_result(ErrorType::Storage)
    }

    /// Copies the dataset file into the backups directory now.
    pub async fn backup_now(&self) -> Result<Option<PathBuf>> {
        let _guard = self.lock.lock().await;
        self.backup
            .copy_data_file(utils::now())
            .await
            .pub_result(ErrorType::Storage)
    }

    /// Writes to a sibling temp file and renames it over the dataset file.
    async fn write(&self, dataset: &Dataset) -> Res<()> {
        let bytes = dataset
            .to_workbook()
            .to_xlsx()
            .context("Unable to serialize the dataset")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        utils::write(&tmp, bytes).await?;
        utils::rename(&tmp, &self.path)
            .await
            .context("Unable to replace the dataset file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, Cell, MonthKey, Partition, RecordInput, RecordKind};
    use crate::reconcile;
    use std::str::FromStr;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Store,
        backups: PathBuf,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let backups = dir.path().join(".backups");
        utils::make_dir(&backups).await.unwrap();
        let data = dir.path().join("budget_data.xlsx");
        let store = Store::new(&data, Backup::new(&backups, &data));
        Fixture {
            _dir: dir,
            store,
            backups,
        }
    }

    async fn backup_count(dir: &Path) -> usize {
        let mut entries = tokio::fs::read_dir(dir).await.unwrap();
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }

    fn income(amount: &str) -> RecordInput {
        RecordInput::default()
            .with_kind(RecordKind::Income)
            .with_amount(Amount::from_str(amount).unwrap())
            .with_date("2024-01-15")
    }

    #[tokio::test]
    async fn test_missing_file_is_created_with_headers() {
        let f = fixture().await;
        assert!(!f.store.path().exists());
        let dataset = f.store.read().await.unwrap();
        assert!(f.store.path().is_file());
        assert!(dataset.all_records().next().is_none());

        let bytes = std::fs::read(f.store.path()).unwrap();
        let workbook = Workbook::from_xlsx(&bytes).unwrap();
        let income = workbook.get("Income").unwrap();
        assert!(income.is_empty());
        assert_eq!(income.mapping().headers()[0], "ID");
        assert!(workbook.get("Summary").is_some());
        // creating the file is not a destructive rewrite
        assert_eq!(backup_count(&f.backups).await, 0);
    }

    #[tokio::test]
    async fn test_update_persists_and_backs_up() {
        let f = fixture().await;
        let (record, _) = f
            .store
            .update(|dataset, now| reconcile::save_transaction(dataset, &income("10"), now))
            .await
            .unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(backup_count(&f.backups).await, 1);

        let dataset = f.store.read().await.unwrap();
        assert_eq!(dataset.find(1).unwrap().amount.to_string(), "10.00");
        let january = MonthKey::new(2024, 1).unwrap();
        assert_eq!(dataset.month_ids(january), vec![1]);
    }

    #[tokio::test]
    async fn test_failed_update_saves_nothing() {
        let f = fixture().await;
        let _ = f.store.read().await.unwrap();
        let before = utils::read(f.store.path()).await.unwrap();
        let err = f
            .store
            .update(|dataset, now| reconcile::delete_transaction(dataset, 4, now))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(utils::read(f.store.path()).await.unwrap(), before);
        assert_eq!(backup_count(&f.backups).await, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_storage_error() {
        let f = fixture().await;
        utils::write(f.store.path(), "not a workbook").await.unwrap();
        let err = f.store.read().await.unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Storage);
        assert!(err.to_string().contains("unreadable"));
        assert_eq!(utils::read(f.store.path()).await.unwrap(), "not a workbook");
    }

    #[tokio::test]
    async fn test_header_only_and_blank_rows() {
        let f = fixture().await;
        let grid = |rows: &[&[Option<&str>]]| -> Vec<Vec<Cell>> {
            rows.iter()
                .map(|row| row.iter().map(|c| Cell::from(c.map(str::to_string))).collect())
                .collect()
        };
        let header: &[Option<&str>] = &[Some("ID"), Some("Date"), Some("Amount")];
        let workbook = Workbook {
            sheets: vec![
                Partition::from_grid("Income", grid(&[header])).unwrap(),
                Partition::from_grid(
                    "Expense",
                    grid(&[
                        header,
                        &[Some(""), Some("  "), None],
                        &[Some("3"), Some("2024-02-02"), Some("12")],
                    ]),
                )
                .unwrap(),
            ],
        };
        utils::write(f.store.path(), workbook.to_xlsx().unwrap())
            .await
            .unwrap();
        let dataset = f.store.read().await.unwrap();
        assert!(dataset.records(RecordKind::Income).is_empty());
        assert_eq!(dataset.records(RecordKind::Expense).len(), 1);
        assert_eq!(dataset.summary().total_expenses.to_string(), "12.00");
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let f = fixture().await;
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = f.store.clone();
            handles.push(tokio::spawn(async move {
                let amount = format!("{}", i + 1);
                store
                    .update(move |dataset, now| {
                        reconcile::save_transaction(dataset, &income(&amount), now).map(|r| r.id)
                    })
                    .await
                    .unwrap()
                    .0
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        assert_eq!(ids, (1..=8).collect::<Vec<u64>>());
        let dataset = f.store.read().await.unwrap();
        assert_eq!(dataset.records(RecordKind::Income).len(), 8);
        assert_eq!(dataset.summary().total_income.to_string(), "36.00");
    }

    #[tokio::test]
    async fn test_read_bytes() {
        let f = fixture().await;
        let bytes = f.store.read_bytes().await.unwrap();
        let workbook = Workbook::from_xlsx(&bytes).unwrap();
        assert!(workbook.get("Expense").is_some());
    }

    #[tokio::test]
    async fn test_backup_now() {
        let f = fixture().await;
        assert!(f.store.backup_now().await.unwrap().is_none());
        let _ = f.store.read().await.unwrap();
        let path = f.store.backup_now().await.unwrap().unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("budget_data_backup_"));
    }
}
