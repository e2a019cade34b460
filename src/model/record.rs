//! The `Record` type: one income or expense event, and its conversions to and from partition rows
//! and wire-format JSON.

use crate::error::{Error, Result};
use crate::model::mapping::{
    storage_field, AMOUNT, CATEGORY, CREATED_AT, DATE, DESCRIPTION, ID, SUBCATEGORY, TIME, TYPE,
    UPDATED_AT,
};
use crate::model::month::{parse_date_time, parse_time, parse_timestamp, DATE_FORMAT, TIME_FORMAT};
use crate::model::partition::{Cell, Partition, Row};
use crate::model::{Amount, MonthKey};
use anyhow::bail;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use tracing::warn;

/// Whether a record is money coming in or going out. Each kind has its own authoritative
/// partition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Income,
    Expense,
}

serde_plain::derive_display_from_serialize!(RecordKind);

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Income, RecordKind::Expense];

    /// The name of the kind partition, which is also the `Type` cell value in month partitions.
    pub fn partition_name(&self) -> &'static str {
        match self {
            RecordKind::Income => "Income",
            RecordKind::Expense => "Expense",
        }
    }
}

impl FromStr for RecordKind {
    type Err = anyhow::Error;

    /// Case-insensitive.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        for kind in RecordKind::ALL {
            if s.eq_ignore_ascii_case(kind.partition_name()) {
                return Ok(kind);
            }
        }
        bail!("'{s}' is not a record type, expected 'income' or 'expense'")
    }
}

/// A stored financial event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: RecordKind,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub category: String,
    pub subcategory: String,
    pub amount: Amount,
    pub description: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Record {
    /// Reads one row of a kind partition. Never fails: an unusable ID is returned as `0` (to be
    /// reassigned by the caller), a bad date falls back to `now`, a bad amount is zero.
    pub(crate) fn from_row(
        kind: RecordKind,
        partition: &Partition,
        row: &Row,
        now: DateTime<FixedOffset>,
    ) -> Self {
        let value = |header: &str| partition.value(row, header);
        let id = value(ID).and_then(parse_id).unwrap_or(0);

        let (date, date_time) = match value(DATE).map(|raw| (raw, parse_date_time(raw))) {
            Some((_, Some(parsed))) => parsed,
            Some((raw, None)) => {
                warn!(
                    "Record {id} in '{}' has an unparseable date '{raw}', using today",
                    partition.name()
                );
                (now.date_naive(), Some(now.time()))
            }
            None => {
                warn!(
                    "Record {id} in '{}' has no date, using today",
                    partition.name()
                );
                (now.date_naive(), Some(now.time()))
            }
        };
        let time = value(TIME)
            .and_then(parse_time)
            .or(date_time)
            .unwrap_or_else(|| now.time());

        let created_at = value(CREATED_AT).and_then(parse_timestamp).unwrap_or(now);
        let updated_at = value(UPDATED_AT)
            .and_then(parse_timestamp)
            .unwrap_or(created_at);

        Self {
            id,
            kind,
            date,
            time,
            category: value(CATEGORY).unwrap_or_default().to_string(),
            subcategory: value(SUBCATEGORY).unwrap_or_default().to_string(),
            amount: value(AMOUNT).map(Amount::lenient).unwrap_or_default(),
            description: value(DESCRIPTION).unwrap_or_default().to_string(),
            created_at,
            updated_at,
        }
    }

    /// Creates or updates a record from caller input. `existing` is the stored record when this is
    /// an update; fields the caller leaves out keep their stored values.
    ///
    /// # Errors
    /// A `Request` error when a new record has no kind.
    pub(crate) fn apply(
        input: &RecordInput,
        id: u64,
        existing: Option<&Record>,
        now: DateTime<FixedOffset>,
    ) -> Result<Self> {
        let kind = input
            .kind
            .or(existing.map(|r| r.kind))
            .ok_or_else(|| {
                Error::request(format!(
                    "Transaction {id} needs a type, either 'income' or 'expense'"
                ))
            })?;
        let input_time = input.time.as_deref().and_then(parse_time);
        let (date, time) = match (input.date.as_deref(), existing) {
            (Some(raw), _) => match parse_date_time(raw) {
                Some((date, date_time)) => (
                    date,
                    input_time.or(date_time).unwrap_or_else(|| now.time()),
                ),
                None => {
                    warn!("Record {id} has an unparseable date '{raw}', using today");
                    (now.date_naive(), input_time.unwrap_or_else(|| now.time()))
                }
            },
            (None, Some(stored)) => (stored.date, input_time.unwrap_or(stored.time)),
            (None, None) => (now.date_naive(), input_time.unwrap_or_else(|| now.time())),
        };

        let text = |given: &Option<String>, stored: Option<&String>| -> String {
            given
                .clone()
                .or_else(|| stored.cloned())
                .unwrap_or_default()
        };

        Ok(Self {
            id,
            kind,
            date,
            time,
            category: text(&input.category, existing.map(|r| &r.category)),
            subcategory: text(&input.subcategory, existing.map(|r| &r.subcategory)),
            amount: input
                .amount
                .or(existing.map(|r| r.amount))
                .unwrap_or_default(),
            description: text(&input.description, existing.map(|r| &r.description)),
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        })
    }

    /// The month partition this record belongs to.
    pub fn month(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }

    /// Chronological order within a month partition.
    pub(crate) fn sort_key(&self) -> (NaiveDate, NaiveTime, u64) {
        (self.date, self.time, self.id)
    }

    /// The row for a kind partition, in `KIND_HEADERS` order.
    pub(crate) fn kind_row(&self) -> Row {
        Row::new(vec![
            Cell::new(self.id.to_string()),
            Cell::new(self.date.format(DATE_FORMAT).to_string()),
            Cell::new(self.time.format(TIME_FORMAT).to_string()),
            Cell::new(&self.category),
            Cell::new(&self.subcategory),
            Cell::new(self.amount.to_string()),
            Cell::new(&self.description),
            Cell::new(timestamp(&self.created_at)),
            Cell::new(timestamp(&self.updated_at)),
        ])
    }

    /// The row for a month partition, in `MONTH_HEADERS` order.
    pub(crate) fn month_row(&self) -> Row {
        Row::new(vec![
            Cell::new(self.id.to_string()),
            Cell::new(self.date.format(DATE_FORMAT).to_string()),
            Cell::new(self.time.format(TIME_FORMAT).to_string()),
            Cell::new(self.kind.partition_name()),
            Cell::new(&self.category),
            Cell::new(&self.subcategory),
            Cell::new(self.amount.to_string()),
            Cell::new(&self.description),
            Cell::new(timestamp(&self.created_at)),
        ])
    }
}

pub(crate) fn timestamp(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn parse_id(raw: &str) -> Option<u64> {
    raw.parse::<u64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f < u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// What a caller supplies to create or update a record. Every field is optional; `id`,
/// `createdAt` and `updatedAt` are always decided by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordInput {
    pub id: Option<u64>,
    pub kind: Option<RecordKind>,
    /// Kept raw: an unparseable date is not an error, the record lands in the current month.
    pub date: Option<String>,
    pub time: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub amount: Option<Amount>,
    pub description: Option<String>,
}

impl RecordInput {
    /// Reads a JSON object whose keys are wire names (`amount`) or storage names (`Amount`). Keys
    /// that address no storage field are ignored.
    ///
    /// # Errors
    /// A `Request` error when the value is not an object, `type` is not income or expense, the
    /// amount is negative or the id is not a positive integer.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_fields(&fields),
            other => Err(Error::request(format!(
                "Expected a JSON object for a transaction, got {other}"
            ))),
        }
    }

    /// Reads a JSON array of transaction objects.
    pub fn list_from_value(value: Value) -> Result<Vec<Self>> {
        match value {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            other => Err(Error::request(format!(
                "Expected a JSON array of transactions, got {other}"
            ))),
        }
    }

    pub fn from_fields(fields: &Map<String, Value>) -> Result<Self> {
        let mut input = RecordInput::default();
        for (key, value) in fields {
            let Some(field) = storage_field(key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match field {
                ID => input.id = Some(id_value(value)?),
                TYPE => {
                    let text = text_value(value).unwrap_or_default();
                    let kind = RecordKind::from_str(&text).map_err(Error::request)?;
                    input.kind = Some(kind);
                }
                AMOUNT => {
                    let amount = amount_value(value)?;
                    if amount.is_negative() {
                        return Err(Error::request(format!(
                            "The amount must not be negative, got {amount}"
                        )));
                    }
                    input.amount = Some(amount);
                }
                DATE => input.date = text_value(value),
                TIME => input.time = text_value(value),
                CATEGORY => input.category = text_value(value),
                SUBCATEGORY => input.subcategory = text_value(value),
                DESCRIPTION => input.description = text_value(value),
                _ => {}
            }
        }
        Ok(input)
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }
}

impl From<&Record> for RecordInput {
    fn from(record: &Record) -> Self {
        Self {
            id: Some(record.id),
            kind: Some(record.kind),
            date: Some(record.date.format(DATE_FORMAT).to_string()),
            time: Some(record.time.format(TIME_FORMAT).to_string()),
            category: Some(record.category.clone()),
            subcategory: Some(record.subcategory.clone()),
            amount: Some(record.amount),
            description: Some(record.description.clone()),
        }
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn id_value(value: &Value) -> Result<u64> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => parse_id(s.trim()),
        _ => None,
    };
    id.filter(|id| *id > 0)
        .ok_or_else(|| Error::request(format!("'{value}' is not a valid transaction id")))
}

/// Non-numeric amounts degrade to zero, like unparseable cells.
/// Unparseable amounts degrade to zero, but a number too large to be an amount is refused.
fn amount_value(value: &Value) -> Result<Amount> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            warn!("Treating the amount {other} as zero");
            return Ok(Amount::ZERO);
        }
    };
    match Amount::from_str(&text) {
        Ok(amount) => Ok(amount),
        Err(e) if e.is_out_of_range() => Err(Error::request(format!(
            "The amount {text} is out of range: {e}"
        ))),
        Err(_) => Ok(Amount::lenient(&text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mapping::KIND_HEADERS;
    use serde_json::json;

    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-06-15T10:30:00+00:00").unwrap()
    }

    fn kind_partition(rows: Vec<Vec<&str>>) -> Partition {
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(Cell::from).collect())
            .collect();
        Partition::with_rows("Income", KIND_HEADERS, rows)
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(RecordKind::from_str("income").unwrap(), RecordKind::Income);
        assert_eq!(RecordKind::from_str("EXPENSE").unwrap(), RecordKind::Expense);
        assert_eq!(RecordKind::from_str(" Income ").unwrap(), RecordKind::Income);
        assert!(RecordKind::from_str("transfer").is_err());
        assert_eq!(RecordKind::Income.to_string(), "income");
    }

    #[test]
    fn test_from_row() {
        let partition = kind_partition(vec![vec![
            "7",
            "2024-01-15",
            "09:30:00",
            "Salary",
            "Base",
            "$1,000",
            "January pay",
            "2024-01-15T09:31:00+00:00",
            "",
        ]]);
        let record = Record::from_row(
            RecordKind::Income,
            &partition,
            &partition.rows()[0],
            now(),
        );
        assert_eq!(record.id, 7);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(record.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(record.amount.to_string(), "1000.00");
        assert_eq!(record.category, "Salary");
        assert_eq!(record.updated_at, record.created_at);
    }

    #[test]
    fn test_from_row_degrades() {
        let partition = kind_partition(vec![vec!["x", "not a date", "", "Food", "", "abc"]]);
        let record = Record::from_row(
            RecordKind::Expense,
            &partition,
            &partition.rows()[0],
            now(),
        );
        assert_eq!(record.id, 0);
        assert_eq!(record.date, now().date_naive());
        assert_eq!(record.time, now().time());
        assert!(record.amount.is_zero());
        assert_eq!(record.category, "Food");
        assert_eq!(record.created_at, now());
    }

    #[test]
    fn test_row_round_trip_through_partition() {
        let input = RecordInput::default()
            .with_kind(RecordKind::Income)
            .with_amount(Amount::from_str("12.5").unwrap())
            .with_date("2024-03-02T08:00:00");
        let record = Record::apply(&input, 3, None, now()).unwrap();
        let partition = Partition::with_rows("Income", KIND_HEADERS, vec![record.kind_row()]);
        let back = Record::from_row(
            RecordKind::Income,
            &partition,
            &partition.rows()[0],
            now(),
        );
        assert_eq!(back, record);
    }

    #[test]
    fn test_month_row_type_column() {
        let input = RecordInput::default().with_kind(RecordKind::Income);
        let record = Record::apply(&input, 1, None, now()).unwrap();
        let row = record.month_row();
        assert_eq!(row.get(3).unwrap().text(), Some("Income"));
    }

    #[test]
    fn test_apply_requires_kind_for_new_record() {
        let err = Record::apply(&RecordInput::default(), 1, None, now()).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Request);
        assert!(err.to_string().contains("needs a type"));
    }

    #[test]
    fn test_apply_defaults_to_now() {
        let input = RecordInput::default().with_kind(RecordKind::Expense);
        let record = Record::apply(&input, 1, None, now()).unwrap();
        assert_eq!(record.kind, RecordKind::Expense);
        assert_eq!(record.date, now().date_naive());
        assert_eq!(record.time, now().time());
        assert_eq!(record.created_at, now());
        assert_eq!(record.updated_at, now());
    }

    #[test]
    fn test_apply_date_only_takes_time_from_now() {
        let input = RecordInput::default()
            .with_kind(RecordKind::Expense)
            .with_date("2024-01-15");
        let record = Record::apply(&input, 1, None, now()).unwrap();
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(record.time, now().time());
    }

    #[test]
    fn test_apply_update_keeps_stored_fields() {
        let created = DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap();
        let original = Record::apply(
            &RecordInput {
                kind: Some(RecordKind::Income),
                date: Some("2024-01-15T12:00:00".into()),
                category: Some("Salary".into()),
                amount: Some(Amount::from_str("100").unwrap()),
                ..Default::default()
            },
            5,
            None,
            created,
        )
        .unwrap();
        let change = RecordInput {
            description: Some("bonus".into()),
            ..Default::default()
        };
        let updated = Record::apply(&change, 5, Some(&original), now()).unwrap();
        assert_eq!(updated.kind, RecordKind::Income);
        assert_eq!(updated.date, original.date);
        assert_eq!(updated.time, original.time);
        assert_eq!(updated.category, "Salary");
        assert_eq!(updated.description, "bonus");
        assert_eq!(updated.amount, original.amount);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, now());
    }

    #[test]
    fn test_input_from_wire_names() {
        let input = RecordInput::from_value(json!({
            "type": "Income",
            "amount": 1000,
            "date": "2024-01-15",
            "category": "Salary",
            "description": "pay",
            "createdAt": "ignored",
            "color": "ignored"
        }))
        .unwrap();
        assert_eq!(input.kind, Some(RecordKind::Income));
        assert_eq!(input.amount.unwrap().to_string(), "1000.00");
        assert_eq!(input.date.as_deref(), Some("2024-01-15"));
        assert_eq!(input.category.as_deref(), Some("Salary"));
        assert_eq!(input.description.as_deref(), Some("pay"));
        assert!(input.id.is_none());
    }

    #[test]
    fn test_input_from_storage_names() {
        let input = RecordInput::from_value(json!({
            "ID": "4",
            "Type": "expense",
            "Amount": "$25.10",
            "Subcategory": "Lunch"
        }))
        .unwrap();
        assert_eq!(input.id, Some(4));
        assert_eq!(input.kind, Some(RecordKind::Expense));
        assert_eq!(input.amount.unwrap().to_string(), "25.10");
        assert_eq!(input.subcategory.as_deref(), Some("Lunch"));
    }

    #[test]
    fn test_input_rejections() {
        let err = RecordInput::from_value(json!({"type": "transfer"})).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Request);

        let err = RecordInput::from_value(json!({"amount": -5})).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Request);

        let err = RecordInput::from_value(json!({"id": 0})).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Request);

        let err = RecordInput::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err.error_type(), crate::ErrorType::Request);
    }

    #[test]
    fn test_input_bad_amount_is_zero() {
        let input = RecordInput::from_value(json!({"amount": "lots"})).unwrap();
        assert_eq!(input.amount, Some(Amount::ZERO));
    }

    #[test]
    fn test_input_huge_amount_is_rejected() {
        for huge in [json!(5e28), json!("5e28"), json!(u64::MAX)] {
            let err = RecordInput::from_value(json!({"type": "income", "amount": huge})).unwrap_err();
            assert_eq!(err.error_type(), crate::ErrorType::Request);
            assert!(err.to_string().contains("out of range"));
        }
    }

    #[test]
    fn test_record_wire_format() {
        let input = RecordInput::default()
            .with_kind(RecordKind::Income)
            .with_amount(Amount::from_str("1000").unwrap())
            .with_date("2024-01-15T08:00:00");
        let record = Record::apply(&input, 1, None, now()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["type"], "income");
        assert_eq!(json["date"], "2024-01-15");
        assert_eq!(json["time"], "08:00:00");
        assert_eq!(json["amount"], "1000.00");
        assert_eq!(json["createdAt"], "2025-06-15T10:30:00+00:00");
    }
}
