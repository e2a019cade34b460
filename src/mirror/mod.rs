//! The cloud mirror: a best-effort copy of the dataset in a Google sheet.
//!
//! Partitions map one to one onto tabs. A push clears every tab and rewrites it from the local
//! partition. A pull reads the `Income` and `Expense` tabs and hands back a reconciled `Dataset`;
//! the caller decides whether to apply it. Nothing in here returns an `Error`: every failure
//! becomes a `MirrorStatus`.

mod files;
mod google;
mod oauth;
mod test_sheet;

use crate::error::Res;
use crate::model::{Cell, Dataset, Partition, RecordKind, Workbook};
use crate::reconcile::{self, KindBatch};
use crate::{utils, Config};
use anyhow::{ensure, Context};
use chrono::{DateTime, FixedOffset};
use google::{quote, GoogleSheet};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub(crate) use oauth::TokenProvider;
pub use test_sheet::{TestSheet, TestSheetState};

const OAUTH_SCOPES: &[&str] = &["https://www.googleapis.com/auth/spreadsheets"];

/// When this environment variable is set and non-empty the mirror uses `TestSheet`.
pub const TEST_MODE_ENV: &str = "BUDGET_SYNC_IN_TEST_MODE";

/// Whether the mirror talks to Google or to the in-memory `TestSheet`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Google,
    Testing,
}

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Google,
        }
    }
}

/// A1-notation range and the rows to write there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRange {
    pub range: String,
    pub values: Vec<Vec<String>>,
}

/// The operations the mirror needs from a spreadsheet.
#[async_trait::async_trait]
pub trait Sheet: Send {
    /// All values of one tab, row by row.
    async fn get(&mut self, tab: &str) -> Res<Vec<Vec<String>>>;

    /// The names of all tabs.
    async fn tabs(&mut self) -> Res<Vec<String>>;

    async fn add_tabs(&mut self, names: &[String]) -> Res<()>;

    async fn clear_ranges(&mut self, ranges: &[String]) -> Res<()>;

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()>;
}

/// The outcome of a push or a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum MirrorStatus {
    /// `count` is the number of rows written by a push, or records read by a pull.
    Success {
        message: String,
        count: usize,
        spreadsheet_url: String,
    },
    /// No sheet URL is configured.
    Disabled { message: String },
    /// Missing credentials, failed authentication, network errors and timeouts.
    Unavailable { message: String },
}

impl MirrorStatus {
    pub fn message(&self) -> &str {
        match self {
            MirrorStatus::Success { message, .. }
            | MirrorStatus::Disabled { message }
            | MirrorStatus::Unavailable { message } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MirrorStatus::Success { .. })
    }

    fn disabled() -> Self {
        MirrorStatus::Disabled {
            message: "The cloud mirror is disabled, no sheet_url is configured".to_string(),
        }
    }

    fn unavailable(what: &str, e: anyhow::Error) -> Self {
        warn!("The cloud mirror is unavailable, {what} failed: {e:#}");
        MirrorStatus::Unavailable {
            message: format!("The cloud {what} failed: {e:#}"),
        }
    }
}

/// The records read from the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pull {
    dataset: Dataset,
    kinds: Vec<RecordKind>,
}

impl Pull {
    /// The pulled records with their month partitions and summary rebuilt.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The kinds that had a tab in the sheet.
    pub fn kinds(&self) -> &[RecordKind] {
        &self.kinds
    }

    /// The pulled kinds as complete replacements for the local ones.
    pub fn batch(&self) -> KindBatch {
        let mut batch = KindBatch::new();
        for &kind in &self.kinds {
            batch.set(kind, self.dataset.records(kind).to_vec());
        }
        batch
    }
}

/// Pushes to and pulls from the configured Google sheet, each call bounded by a timeout.
#[derive(Debug, Clone)]
pub struct Mirror {
    spreadsheet_id: Option<String>,
    secret_path: PathBuf,
    token_path: PathBuf,
    timeout: Duration,
    mode: Mode,
}

impl Mirror {
    pub fn new(config: &Config, mode: Mode) -> Self {
        Self {
            spreadsheet_id: config.spreadsheet_id().map(str::to_string),
            secret_path: config.client_secret_path(),
            token_path: config.token_path(),
            timeout: config.mirror_timeout(),
            mode,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.spreadsheet_id.is_some()
    }

    pub fn spreadsheet_url(&self) -> Option<String> {
        self.spreadsheet_id
            .as_ref()
            .map(|id| format!("https://docs.google.com/spreadsheets/d/{id}"))
    }

    /// Makes every tab of the sheet match the partitions of `dataset`.
    pub async fn push(&self, dataset: &Dataset) -> MirrorStatus {
        let (Some(id), Some(url)) = (&self.spreadsheet_id, self.spreadsheet_url()) else {
            return MirrorStatus::disabled();
        };
        let result = self
            .bounded("push", async {
                let mut sheet = self.sheet(id).await?;
                push_to(sheet.as_mut(), dataset).await
            })
            .await;
        match result {
            Ok(rows) => {
                info!("Pushed {rows} rows to {url}");
                MirrorStatus::Success {
                    message: format!("Pushed {rows} rows to the cloud sheet"),
                    count: rows,
                    spreadsheet_url: url,
                }
            }
            Err(e) => MirrorStatus::unavailable("push", e),
        }
    }

    /// Reads the kind tabs of the sheet. The local dataset is not touched.
    pub async fn pull(&self) -> (MirrorStatus, Option<Pull>) {
        let (Some(id), Some(url)) = (&self.spreadsheet_id, self.spreadsheet_url()) else {
            return (MirrorStatus::disabled(), None);
        };
        let result = self
            .bounded("pull", async {
                let mut sheet = self.sheet(id).await?;
                pull_from(sheet.as_mut(), utils::now()).await
            })
            .await;
        match result {
            Ok(pull) => {
                let count = pull.dataset.all_records().count();
                info!("Pulled {count} records from {url}");
                let status = MirrorStatus::Success {
                    message: format!("Pulled {count} records from the cloud sheet"),
                    count,
                    spreadsheet_url: url,
                };
                (status, Some(pull))
            }
            Err(e) => (MirrorStatus::unavailable("pull", e), None),
        }
    }

    async fn bounded<T>(&self, what: &str, f: impl Future<Output = Res<T>>) -> Res<T> {
        tokio::time::timeout(self.timeout, f).await.with_context(|| {
            format!(
                "The {what} did not finish within {} seconds",
                self.timeout.as_secs()
            )
        })?
    }

    async fn sheet(&self, spreadsheet_id: &str) -> Res<Box<dyn Sheet>> {
        match self.mode {
            Mode::Testing => Ok(Box::new(TestSheet::new(spreadsheet_id))),
            Mode::Google => {
                let token_provider = TokenProvider::load(&self.secret_path, &self.token_path)
                    .await
                    .context("Google credentials are not usable")?;
                Ok(Box::new(GoogleSheet::new(spreadsheet_id, token_provider).await?))
            }
        }
    }
}

async fn push_to(sheet: &mut dyn Sheet, dataset: &Dataset) -> Res<usize> {
    let partitions = dataset.partitions();
    let existing: HashSet<String> = sheet.tabs().await?.into_iter().collect();
    let missing: Vec<String> = partitions
        .iter()
        .map(|p| p.name().to_string())
        .filter(|name| !existing.contains(name))
        .collect();
    if !missing.is_empty() {
        debug!("Adding {} tabs to the cloud sheet", missing.len());
        sheet.add_tabs(&missing).await?;
    }

    let ranges: Vec<String> = partitions.iter().map(|p| quote(p.name())).collect();
    sheet.clear_ranges(&ranges).await?;

    let data: Vec<SheetRange> = partitions
        .iter()
        .map(|p| SheetRange {
            range: format!("{}!A1", quote(p.name())),
            values: values(p),
        })
        .collect();
    sheet.write_ranges(&data).await?;
    Ok(partitions.iter().map(Partition::len).sum())
}

async fn pull_from(sheet: &mut dyn Sheet, now: DateTime<FixedOffset>) -> Res<Pull> {
    let tabs = sheet.tabs().await?;
    let mut sheets = Vec::new();
    let mut kinds = Vec::new();
    for kind in RecordKind::ALL {
        let name = kind.partition_name();
        let Some(tab) = tabs.iter().find(|t| t.trim().eq_ignore_ascii_case(name)) else {
            warn!("The cloud sheet has no '{name}' tab");
            continue;
        };
        let grid = sheet
            .get(tab)
            .await?
            .into_iter()
            .map(|row| row.into_iter().map(Cell::from).collect())
            .collect();
        sheets.push(Partition::from_grid(name, grid)?);
        kinds.push(kind);
    }
    ensure!(
        !kinds.is_empty(),
        "The cloud sheet has neither an Income nor an Expense tab"
    );

    let mut dataset = Dataset::from_workbook(Workbook { sheets }, now);
    reconcile::reconcile(&mut dataset, KindBatch::new(), now);
    Ok(Pull { dataset, kinds })
}

fn values(partition: &Partition) -> Vec<Vec<String>> {
    partition
        .to_grid()
        .into_iter()
        .map(|row| {
            row.iter()
                .map(|cell| cell.raw().unwrap_or_default().to_string())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, MonthKey, RecordInput};
    use std::str::FromStr;
    use uuid::Uuid;

    fn mirror(spreadsheet_id: Option<String>, mode: Mode) -> Mirror {
        let dir = std::env::temp_dir().join(Uuid::new_v4().to_string());
        Mirror {
            spreadsheet_id,
            secret_path: dir.join("client_secret.json"),
            token_path: dir.join("token.json"),
            timeout: Duration::from_secs(5),
            mode,
        }
    }

    fn test_mirror() -> (Mirror, TestSheet) {
        let id = Uuid::new_v4().to_string().replace('-', "");
        (mirror(Some(id.clone()), Mode::Testing), TestSheet::new(id))
    }

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-01-31T12:00:00+00:00").unwrap()
    }

    fn dataset() -> Dataset {
        let mut dataset = Dataset::empty(now());
        for (kind, amount, date) in [
            (RecordKind::Income, "1000", "2024-01-15"),
            (RecordKind::Expense, "250", "2024-01-20"),
        ] {
            let input = RecordInput::default()
                .with_kind(kind)
                .with_amount(Amount::from_str(amount).unwrap())
                .with_date(date);
            reconcile::save_transaction(&mut dataset, &input, now()).unwrap();
        }
        dataset
    }

    #[tokio::test]
    async fn test_push_writes_every_partition() {
        let (mirror, sheet) = test_mirror();
        let status = mirror.push(&dataset()).await;
        assert!(status.is_success(), "{status:?}");
        let MirrorStatus::Success { count, .. } = status else {
            unreachable!()
        };
        // two kind rows, six summary rows, two month rows
        assert_eq!(count, 10);

        let state = sheet.get_state();
        assert_eq!(state.tabs.len(), 3 + 24);
        assert_eq!(state.tabs["Income"][0][0], "ID");
        assert_eq!(state.tabs["Income"][1][5], "1000.00");
        assert_eq!(state.tabs["January 2024"].len(), 3);
        assert_eq!(state.tabs["January 2024"][2][3], "Expense");
    }

    #[tokio::test]
    async fn test_push_clears_stale_rows() {
        let (mirror, sheet) = test_mirror();
        let mut dataset = dataset();
        assert!(mirror.push(&dataset).await.is_success());
        reconcile::clear_all(&mut dataset, now());
        assert!(mirror.push(&dataset).await.is_success());

        let state = sheet.get_state();
        assert_eq!(state.tabs["Income"].len(), 1);
        assert_eq!(state.tabs["January 2024"].len(), 1);
    }

    #[tokio::test]
    async fn test_pull_returns_reconciled_dataset() {
        let (mirror, _sheet) = test_mirror();
        assert!(mirror.push(&dataset()).await.is_success());

        let (status, pull) = mirror.pull().await;
        assert!(status.is_success(), "{status:?}");
        let pull = pull.unwrap();
        assert_eq!(pull.kinds(), &RecordKind::ALL);
        let summary = pull.dataset().summary();
        assert_eq!(summary.total_income.to_string(), "1000.00");
        assert_eq!(summary.current_balance.to_string(), "750.00");
        let january = MonthKey::new(2024, 1).unwrap();
        assert_eq!(pull.dataset().month_ids(january), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_pull_with_one_kind_tab() {
        let (mirror, sheet) = test_mirror();
        let mut state = TestSheetState::default();
        state.tabs.insert(
            "expense".to_string(),
            vec![
                vec!["ID".to_string(), "Date".to_string(), "Amount".to_string()],
                vec!["7".to_string(), "2024-03-02".to_string(), "$1,200.50".to_string()],
            ],
        );
        sheet.set_state(state);

        let (status, pull) = mirror.pull().await;
        assert!(status.is_success());
        let pull = pull.unwrap();
        assert_eq!(pull.kinds(), &[RecordKind::Expense]);
        let batch = pull.batch();
        assert_eq!(batch.kinds().collect::<Vec<_>>(), vec![RecordKind::Expense]);
        assert_eq!(
            pull.dataset().find(7).unwrap().amount.to_string(),
            "1200.50"
        );
    }

    #[tokio::test]
    async fn test_pull_without_kind_tabs_is_unavailable() {
        let (mirror, _sheet) = test_mirror();
        let (status, pull) = mirror.pull().await;
        assert!(matches!(status, MirrorStatus::Unavailable { .. }));
        assert!(pull.is_none());
    }

    #[tokio::test]
    async fn test_disabled() {
        let mirror = mirror(None, Mode::Testing);
        assert!(!mirror.is_enabled());
        assert!(matches!(
            mirror.push(&dataset()).await,
            MirrorStatus::Disabled { .. }
        ));
        assert!(matches!(mirror.pull().await.0, MirrorStatus::Disabled { .. }));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_unavailable() {
        let mirror = mirror(Some("abc".to_string()), Mode::Google);
        let status = mirror.push(&dataset()).await;
        assert!(matches!(status, MirrorStatus::Unavailable { .. }));
        assert!(status.message().contains("credentials"));
    }

    #[test]
    fn test_status_json() {
        let status = MirrorStatus::Success {
            message: "ok".to_string(),
            count: 3,
            spreadsheet_url: "https://docs.google.com/spreadsheets/d/x".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["spreadsheetUrl"], "https://docs.google.com/spreadsheets/d/x");
        let json = serde_json::to_value(MirrorStatus::disabled()).unwrap();
        assert_eq!(json["status"], "disabled");
    }
}
