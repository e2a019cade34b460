//! Transaction command handlers.

use crate::commands::{plural, push_in_background, Out};
use crate::error::{ErrorType, IntoResult, Result};
use crate::mirror::Mode;
use crate::model::{MonthKey, Record, RecordInput, RecordKind, Summary};
use crate::{reconcile, utils, Config, Error};
use anyhow::Context;
use serde_json::Value;
use std::path::Path;

/// Narrows `list_transactions`. Both fields are optional and combine with AND.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub kind: Option<RecordKind>,
    pub month: Option<MonthKey>,
}

impl TransactionFilter {
    fn matches(&self, record: &Record) -> bool {
        self.kind.map_or(true, |kind| record.kind == kind)
            && self.month.map_or(true, |month| record.month() == month)
    }
}

/// Lists the stored transactions of both kinds in chronological order.
pub async fn list_transactions(
    config: &Config,
    filter: TransactionFilter,
) -> Result<Out<Vec<Record>>> {
    let dataset = config.store().read().await?;
    let mut records: Vec<Record> = dataset
        .all_records()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect();
    records.sort_by_key(Record::sort_key);
    let count = records.len();
    Ok(Out::new(
        format!("Found {count} transaction{}", plural(count)),
        records,
    ))
}

/// # Errors
/// `NotFound` when no transaction has `id`.
pub async fn get_transaction(config: &Config, id: u64) -> Result<Out<Record>> {
    let dataset = config.store().read().await?;
    let record = dataset
        .find(id)
        .cloned()
        .ok_or_else(|| crate::Error::not_found(format!("Transaction {id} not found")))?;
    Ok(Out::new(format!("Found transaction {id}"), record))
}

/// Saves one transaction. Without an `id` a new one is assigned; with an `id` that exists the
/// stored transaction is replaced.
pub async fn create_transaction(
    config: &Config,
    mode: Mode,
    input: RecordInput,
) -> Result<Out<Record>> {
    let (record, dataset) = config
        .store()
        .update(|dataset, now| reconcile::save_transaction(dataset, &input, now))
        .await?;
    push_in_background(config, mode, dataset);
    Ok(Out::new(
        format!("Saved {} transaction {}", record.kind, record.id),
        record,
    ))
}

/// Changes the fields of transaction `id` that are present in `input`.
///
/// # Errors
/// `NotFound` when no transaction has `id`.
pub async fn update_transaction(
    config: &Config,
    mode: Mode,
    id: u64,
    input: RecordInput,
) -> Result<Out<Record>> {
    let (record, dataset) = config
        .store()
        .update(|dataset, now| reconcile::update_transaction(dataset, id, &input, now))
        .await?;
    push_in_background(config, mode, dataset);
    Ok(Out::new(format!("Updated transaction {id}"), record))
}

/// # Errors
/// `NotFound` when no transaction has `id`.
pub async fn delete_transaction(config: &Config, mode: Mode, id: u64) -> Result<Out<Record>> {
    let (record, dataset) = config
        .store()
        .update(|dataset, now| reconcile::delete_transaction(dataset, id, now))
        .await?;
    push_in_background(config, mode, dataset);
    Ok(Out::new(format!("Deleted transaction {id}"), record))
}

/// The batch write: each kind present in `inputs` replaces the stored transactions of that kind.
pub async fn save_all(
    config: &Config,
    mode: Mode,
    inputs: Vec<RecordInput>,
) -> Result<Out<Vec<Record>>> {
    let (records, dataset) = config
        .store()
        .update(|dataset, now| reconcile::save_all(dataset, &inputs, now))
        .await?;
    push_in_background(config, mode, dataset);
    let count = records.len();
    Ok(Out::new(
        format!("Saved {count} transaction{}", plural(count)),
        records,
    ))
}

/// Reads the inputs of a batch write from a JSON file holding an array of transactions.
///
/// # Errors
/// A `Storage` error when the file cannot be read, a `Request` error when it is not a JSON array
/// of valid transactions.
pub async fn read_batch_file(path: &Path) -> Result<Vec<RecordInput>> {
    let text = utils::read(path)
        .await
        .with_context(|| format!("Unable to read the batch file '{}'", path.display()))
        .pub_result(ErrorType::Storage)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| Error::request(format!("'{}' is not JSON: {e}", path.display())))?;
    RecordInput::list_from_value(value)
}

/// Removes every transaction. All partitions and their headers are kept.
pub async fn clear_all(config: &Config, mode: Mode) -> Result<Out<Summary>> {
    let (summary, dataset) = config
        .store()
        .update(|dataset, now| {
            reconcile::clear_all(dataset, now);
            Ok(dataset.summary().clone())
        })
        .await?;
    push_in_background(config, mode, dataset);
    Ok(Out::new("Cleared all data", summary))
}
