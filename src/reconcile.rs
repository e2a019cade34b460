//! The write path over a loaded `Dataset`. Every operation replaces the affected kind partitions,
//! rebuilds each touched month partition wholesale from the kind partitions and recomputes the
//! summary. Nothing here patches a derived view row by row.

use crate::error::{Error, Result};
use crate::model::{
    Dataset, MonthKey, Partition, Record, RecordInput, RecordKind, Row, Summary, MONTH_HEADERS,
};
use chrono::{DateTime, FixedOffset};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// The complete desired contents of one or more kind partitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindBatch(BTreeMap<RecordKind, Vec<Record>>);

impl KindBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups `records` by their kind. Only the kinds that occur are present in the batch.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut batch = Self::new();
        for record in records {
            batch.0.entry(record.kind).or_default().push(record);
        }
        batch
    }

    /// Sets the full contents of `kind`. An empty list empties the partition.
    pub fn set(&mut self, kind: RecordKind, records: Vec<Record>) {
        self.0.insert(kind, records);
    }

    pub fn kinds(&self) -> impl Iterator<Item = RecordKind> + '_ {
        self.0.keys().copied()
    }

    /// Every record of the batch, kind by kind.
    pub fn records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.0.values().flatten()
    }

    pub fn contains(&self, kind: RecordKind) -> bool {
        self.0.contains_key(&kind)
    }

    fn ids(&self) -> HashSet<u64> {
        self.0.values().flatten().map(|r| r.id).collect()
    }

    /// Gives a fresh ID to every record whose ID is held by a record of a kind this batch leaves
    /// alone. Used for pulled partitions, where such a collision names two different records.
    /// Returns how many records were renumbered.
    pub fn renumber_against(&mut self, dataset: &Dataset) -> usize {
        let kept: HashSet<u64> = RecordKind::ALL
            .into_iter()
            .filter(|kind| !self.contains(*kind))
            .flat_map(|kind| dataset.records(kind).iter().map(|r| r.id))
            .collect();
        if kept.is_empty() {
            return 0;
        }
        let mut next = self
            .0
            .values()
            .flatten()
            .map(|r| r.id)
            .chain(std::iter::once(dataset.max_id()))
            .max()
            .unwrap_or(0);
        let mut renumbered = 0;
        for record in self.0.values_mut().flatten() {
            if kept.contains(&record.id) {
                next += 1;
                warn!(
                    "{} record {} collides with a kept record, renumbering it to {next}",
                    record.kind.partition_name(),
                    record.id
                );
                record.id = next;
                renumbered += 1;
            }
        }
        renumbered
    }
}

/// Replaces each kind present in `batch` wholesale, then rebuilds every touched month and the
/// summary. An empty batch only rebuilds the derived views.
///
/// A record of a kind outside the batch whose ID occurs in the batch is removed: the batch moved
/// it to the other kind. IDs therefore stay unique across both kind partitions.
///
/// Touched months are the months of every record in both kind partitions plus every month
/// partition that currently holds rows, so a record whose date moved is removed from the month it
/// left.
pub fn reconcile(dataset: &mut Dataset, batch: KindBatch, now: DateTime<FixedOffset>) {
    let moved = batch.ids();
    for kind in RecordKind::ALL {
        if batch.contains(kind) {
            continue;
        }
        let records = dataset.records_mut(kind);
        let before = records.len();
        records.retain(|r| !moved.contains(&r.id));
        if records.len() != before {
            debug!(
                "Removed {} records from {} that moved to the other kind",
                before - records.len(),
                kind.partition_name()
            );
        }
    }
    for (kind, records) in batch.0 {
        debug!("Replacing {} with {} records", kind.partition_name(), records.len());
        *dataset.records_mut(kind) = records;
    }

    let mut by_month: BTreeMap<MonthKey, Vec<&Record>> = BTreeMap::new();
    for record in dataset.all_records() {
        by_month.entry(record.month()).or_default().push(record);
    }

    let occupied: BTreeSet<MonthKey> = dataset
        .months
        .iter()
        .filter(|(_, partition)| !partition.is_empty())
        .map(|(key, _)| *key)
        .collect();
    let touched: BTreeSet<MonthKey> = by_month.keys().copied().chain(occupied).collect();

    let mut rebuilt = BTreeMap::new();
    for key in touched {
        let mut records = by_month.remove(&key).unwrap_or_default();
        records.sort_by_key(|r| r.sort_key());
        let rows: Vec<Row> = records.iter().map(|r| r.month_row()).collect();
        rebuilt.insert(
            key,
            Partition::with_rows(key.to_string(), MONTH_HEADERS, rows),
        );
    }
    debug!("Rebuilt {} month partitions", rebuilt.len());
    dataset.months.extend(rebuilt);

    dataset.summary = Summary::compute(&dataset.income, &dataset.expense, now);
}

/// Inserts or replaces one record. Without an ID the record is new and gets `max + 1`; with an ID
/// that exists it replaces that record, moving it to the other kind partition if its kind
/// changed. Returns the stored record.
///
/// # Errors
/// `Request` when the record is new and has no kind.
pub fn save_transaction(
    dataset: &mut Dataset,
    input: &RecordInput,
    now: DateTime<FixedOffset>,
) -> Result<Record> {
    let existing = input.id.and_then(|id| dataset.find(id)).cloned();
    let id = input.id.unwrap_or_else(|| dataset.max_id() + 1);
    let record = Record::apply(input, id, existing.as_ref(), now)?;
    upsert(dataset, record.clone(), now);
    Ok(record)
}

/// Changes the stored record `id`. Fields missing from `input` keep their stored values.
///
/// # Errors
/// `NotFound` when no record has `id`.
pub fn update_transaction(
    dataset: &mut Dataset,
    id: u64,
    input: &RecordInput,
    now: DateTime<FixedOffset>,
) -> Result<Record> {
    let existing = dataset
        .find(id)
        .cloned()
        .ok_or_else(|| not_found(id))?;
    let record = Record::apply(input, id, Some(&existing), now)?;
    upsert(dataset, record.clone(), now);
    Ok(record)
}

/// Removes the record `id` and returns it.
///
/// # Errors
/// `NotFound` when no record has `id`.
pub fn delete_transaction(
    dataset: &mut Dataset,
    id: u64,
    now: DateTime<FixedOffset>,
) -> Result<Record> {
    let removed = dataset.find(id).cloned().ok_or_else(|| not_found(id))?;
    let mut remaining = dataset.records(removed.kind).to_vec();
    remaining.retain(|r| r.id != id);
    let mut batch = KindBatch::new();
    batch.set(removed.kind, remaining);
    reconcile(dataset, batch, now);
    Ok(removed)
}

/// The batch write. `inputs` are grouped by kind and each kind that occurs replaces its partition
/// wholesale; records without an ID get fresh ones in input order. An input whose ID belongs to a
/// record of the other kind moves that record. Returns the stored records.
///
/// # Errors
/// `Request` when two inputs carry the same ID or a new record has no kind. Nothing is written.
pub fn save_all(
    dataset: &mut Dataset,
    inputs: &[RecordInput],
    now: DateTime<FixedOffset>,
) -> Result<Vec<Record>> {
    let mut seen = HashSet::new();
    for id in inputs.iter().filter_map(|i| i.id) {
        if !seen.insert(id) {
            return Err(Error::request(format!(
                "Transaction id {id} appears more than once in the batch"
            )));
        }
    }

    let mut next = seen
        .iter()
        .copied()
        .chain(std::iter::once(dataset.max_id()))
        .max()
        .unwrap_or(0);
    let records = inputs
        .iter()
        .map(|input| {
            let id = input.id.unwrap_or_else(|| {
                next += 1;
                next
            });
            let existing = dataset.find(id);
            Record::apply(input, id, existing, now)
        })
        .collect::<Result<Vec<Record>>>()?;
    reconcile(dataset, KindBatch::from_records(records.clone()), now);
    Ok(records)
}

/// Empties both kind partitions and every month partition, keeping all partitions and their
/// headers, and resets the summary to zero.
pub fn clear_all(dataset: &mut Dataset, now: DateTime<FixedOffset>) {
    let mut batch = KindBatch::new();
    for kind in RecordKind::ALL {
        batch.set(kind, Vec::new());
    }
    reconcile(dataset, batch, now);
}

/// Places `record` in the partition of its kind, removing any record with the same ID from both
/// partitions first.
fn upsert(dataset: &mut Dataset, record: Record, now: DateTime<FixedOffset>) {
    let mut batch = KindBatch::new();
    for kind in RecordKind::ALL {
        let mut records: Vec<Record> = dataset
            .records(kind)
            .iter()
            .filter(|r| r.id != record.id)
            .cloned()
            .collect();
        if kind == record.kind {
            records.push(record.clone());
        }
        batch.set(kind, records);
    }
    reconcile(dataset, batch, now);
}

fn not_found(id: u64) -> Error {
    Error::not_found(format!("Transaction {id} not found"))
}
