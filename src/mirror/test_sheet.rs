//! Implements the `Sheet` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without using Google Sheets (see `Mode::Testing`).

use crate::error::Res;
use crate::mirror::{Sheet, SheetRange};
use anyhow::Context;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock};

/// The contents of one in-memory spreadsheet: tab name to rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSheetState {
    pub tabs: BTreeMap<String, Vec<Vec<String>>>,
}

/// Every `TestSheet` with the same spreadsheet id sees the same state, for the lifetime of the
/// process.
fn states() -> &'static Mutex<HashMap<String, TestSheetState>> {
    static STATES: OnceLock<Mutex<HashMap<String, TestSheetState>>> = OnceLock::new();
    STATES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// An implementation of the `Sheet` trait that does not use Google sheets.
#[derive(Debug, Clone)]
pub struct TestSheet {
    spreadsheet_id: String,
}

impl TestSheet {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    pub fn get_state(&self) -> TestSheetState {
        self.with_state(|state| state.clone())
    }

    pub fn set_state(&self, state: TestSheetState) {
        self.with_state(|current| *current = state)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TestSheetState) -> T) -> T {
        let mut states = states().lock().unwrap_or_else(|e| e.into_inner());
        f(states.entry(self.spreadsheet_id.clone()).or_default())
    }
}

/// The tab a range such as `'January 2024'!A1` refers to.
fn tab_of(range: &str) -> String {
    let tab = range.split('!').next().unwrap_or(range);
    match tab.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => tab.to_string(),
    }
}

#[async_trait::async_trait]
impl Sheet for TestSheet {
    async fn get(&mut self, tab: &str) -> Res<Vec<Vec<String>>> {
        self.with_state(|state| state.tabs.get(tab).cloned())
            .with_context(|| format!("Sheet '{tab}' not found"))
    }

    async fn tabs(&mut self) -> Res<Vec<String>> {
        Ok(self.with_state(|state| state.tabs.keys().cloned().collect()))
    }

    async fn add_tabs(&mut self, names: &[String]) -> Res<()> {
        self.with_state(|state| {
            for name in names {
                state.tabs.entry(name.clone()).or_default();
            }
        });
        Ok(())
    }

    async fn clear_ranges(&mut self, ranges: &[String]) -> Res<()> {
        self.with_state(|state| -> Res<()> {
            for range in ranges {
                let tab = tab_of(range);
                state
                    .tabs
                    .get_mut(&tab)
                    .with_context(|| format!("Unable to parse range: '{range}'"))?
                    .clear();
            }
            Ok(())
        })
    }

    async fn write_ranges(&mut self, data: &[SheetRange]) -> Res<()> {
        self.with_state(|state| -> Res<()> {
            for sr in data {
                let tab = tab_of(&sr.range);
                let rows = state
                    .tabs
                    .get_mut(&tab)
                    .with_context(|| format!("Unable to parse range: '{}'", sr.range))?;
                *rows = sr.values.clone();
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn unique_id() -> String {
        Uuid::new_v4().to_string().replace('-', "")
    }

    #[test]
    fn test_tab_of() {
        assert_eq!(tab_of("'January 2024'!A1"), "January 2024");
        assert_eq!(tab_of("'Bob''s'"), "Bob's");
        assert_eq!(tab_of("Income!A:ZZ"), "Income");
    }

    #[tokio::test]
    async fn test_state_is_shared_by_id() {
        let id = unique_id();
        let mut a = TestSheet::new(&id);
        a.add_tabs(&["Income".to_string()]).await.unwrap();
        a.write_ranges(&[SheetRange {
            range: "'Income'!A1".to_string(),
            values: vec![vec!["ID".to_string()], vec!["1".to_string()]],
        }])
        .await
        .unwrap();

        let mut b = TestSheet::new(&id);
        assert_eq!(b.tabs().await.unwrap(), vec!["Income"]);
        assert_eq!(b.get("Income").await.unwrap().len(), 2);
        b.clear_ranges(&["'Income'".to_string()]).await.unwrap();
        assert!(a.get("Income").await.unwrap().is_empty());

        assert!(TestSheet::new(unique_id()).get_state().tabs.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tab() {
        let mut sheet = TestSheet::new(unique_id());
        assert!(sheet.get("Expense").await.is_err());
        assert!(sheet.clear_ranges(&["'Expense'".to_string()]).await.is_err());
    }
}
