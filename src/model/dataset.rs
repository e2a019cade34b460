//! The `Dataset`: every partition of the budget workbook at one point in time.

use crate::model::mapping::{ID, LAST_UPDATED, METRIC, MONTH_HEADERS, VALUE};
use crate::model::month::parse_timestamp;
use crate::model::partition::{Partition, Workbook};
use crate::model::record::{Record, RecordKind};
use crate::model::summary::{Summary, SUMMARY};
use crate::model::{MonthKey, KIND_HEADERS};
use chrono::{DateTime, Datelike, FixedOffset};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use tracing::{debug, warn};

/// The whole working set. The `Income` and `Expense` records are the source of truth; the month
/// partitions and the summary are views derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub(crate) income: Vec<Record>,
    pub(crate) expense: Vec<Record>,
    pub(crate) months: BTreeMap<MonthKey, Partition>,
    pub(crate) summary: Summary,
    /// Sheets that are none of the above. They are carried through untouched.
    pub(crate) others: Vec<Partition>,
}

impl Dataset {
    /// A fresh dataset: empty kind partitions, a zero summary and an empty month partition for
    /// every month of the current and the next calendar year.
    pub fn empty(now: DateTime<FixedOffset>) -> Self {
        let year = now.year();
        let months = MonthKey::year_months(year)
            .chain(MonthKey::year_months(year + 1))
            .map(|key| (key, empty_month(key)))
            .collect();
        Self {
            income: Vec::new(),
            expense: Vec::new(),
            months,
            summary: Summary::zero(now),
            others: Vec::new(),
        }
    }

    /// Interprets a workbook read from the dataset file or the cloud mirror. Reading is lenient:
    /// rows that cannot be parsed degrade field by field, and records whose ID is missing or
    /// already taken get a fresh one.
    pub fn from_workbook(workbook: Workbook, now: DateTime<FixedOffset>) -> Self {
        let mut income = Vec::new();
        let mut expense = Vec::new();
        let mut months = BTreeMap::new();
        let mut last_updated = None;
        let mut others = Vec::new();

        for partition in workbook.sheets {
            let name = partition.name().trim();
            if let Ok(kind) = RecordKind::from_str(name) {
                let records = partition
                    .rows()
                    .iter()
                    .map(|row| Record::from_row(kind, &partition, row, now));
                match kind {
                    RecordKind::Income => income.extend(records),
                    RecordKind::Expense => expense.extend(records),
                }
            } else if name == SUMMARY {
                last_updated = stored_last_updated(&partition);
            } else if let Ok(key) = MonthKey::from_str(name) {
                if months.contains_key(&key) {
                    warn!("Found a second partition for {key}, keeping it as an extra sheet");
                    others.push(partition);
                } else {
                    months.insert(key, partition);
                }
            } else {
                debug!("Carrying the unrecognised sheet '{name}' through unchanged");
                others.push(partition);
            }
        }

        normalize_ids(&mut income, &mut expense);
        let mut summary = Summary::compute(&income, &expense, now);
        if let Some(last_updated) = last_updated {
            summary.last_updated = last_updated;
        }

        Self {
            income,
            expense,
            months,
            summary,
            others,
        }
    }

    /// The storage form, in the order `Income`, `Expense`, `Summary`, months from oldest to
    /// newest, then any extra sheets.
    pub fn to_workbook(&self) -> Workbook {
        let mut sheets = Vec::with_capacity(3 + self.months.len() + self.others.len());
        for kind in RecordKind::ALL {
            let rows = self.records(kind).iter().map(Record::kind_row).collect();
            sheets.push(Partition::with_rows(
                kind.partition_name(),
                KIND_HEADERS,
                rows,
            ));
        }
        sheets.push(self.summary.to_partition());
        sheets.extend(self.months.values().cloned());
        sheets.extend(self.others.iter().cloned());
        Workbook { sheets }
    }

    /// The records of one kind partition.
    pub fn records(&self, kind: RecordKind) -> &[Record] {
        match kind {
            RecordKind::Income => &self.income,
            RecordKind::Expense => &self.expense,
        }
    }

    pub(crate) fn records_mut(&mut self, kind: RecordKind) -> &mut Vec<Record> {
        match kind {
            RecordKind::Income => &mut self.income,
            RecordKind::Expense => &mut self.expense,
        }
    }

    /// Income records followed by expense records.
    pub fn all_records(&self) -> impl Iterator<Item = &Record> {
        self.income.iter().chain(self.expense.iter())
    }

    pub fn find(&self, id: u64) -> Option<&Record> {
        self.all_records().find(|r| r.id == id)
    }

    /// The largest ID in either kind partition, or 0.
    pub fn max_id(&self) -> u64 {
        self.all_records().map(|r| r.id).max().unwrap_or(0)
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn month(&self, key: MonthKey) -> Option<&Partition> {
        self.months.get(&key)
    }

    pub fn months(&self) -> impl Iterator<Item = (&MonthKey, &Partition)> {
        self.months.iter()
    }

    /// The IDs listed in a month partition, in row order.
    pub fn month_ids(&self, key: MonthKey) -> Vec<u64> {
        let Some(partition) = self.months.get(&key) else {
            return Vec::new();
        };
        partition
            .rows()
            .iter()
            .filter_map(|row| partition.value(row, ID))
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    /// Every partition the dataset would persist, in storage order.
    pub fn partitions(&self) -> Vec<Partition> {
        self.to_workbook().sheets
    }
}

pub(crate) fn empty_month(key: MonthKey) -> Partition {
    Partition::new(key.to_string(), MONTH_HEADERS)
}

fn stored_last_updated(partition: &Partition) -> Option<DateTime<FixedOffset>> {
    partition
        .rows()
        .iter()
        .find(|row| partition.value(row, METRIC) == Some(LAST_UPDATED))
        .and_then(|row| partition.value(row, VALUE))
        .and_then(parse_timestamp)
}

/// Gives a fresh ID (max + 1) to every record whose ID is 0 or already used by an earlier record,
/// in either kind partition.
fn normalize_ids(income: &mut [Record], expense: &mut [Record]) {
    let mut next = income
        .iter()
        .chain(expense.iter())
        .map(|r| r.id)
        .max()
        .unwrap_or(0);
    let mut seen = HashSet::new();
    for record in income.iter_mut().chain(expense.iter_mut()) {
        if record.id != 0 && seen.insert(record.id) {
            continue;
        }
        next += 1;
        if record.id == 0 {
            warn!(
                "A {} record has no usable ID, assigning {next}",
                record.kind.partition_name()
            );
        } else {
            warn!(
                "The ID {} is used more than once, assigning {next} to the {} record",
                record.id,
                record.kind.partition_name()
            );
        }
        record.id = next;
        seen.insert(next);
    }
}
