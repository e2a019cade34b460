//! Derived totals over the two kind partitions.

use crate::model::mapping::{LAST_UPDATED, METRIC, SUMMARY_HEADERS, VALUE};
use crate::model::partition::{Cell, Partition, Row};
use crate::model::record::{timestamp, Record};
use crate::model::Amount;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub const SUMMARY: &str = "Summary";

const TOTAL_INCOME: &str = "Total Income";
const TOTAL_EXPENSES: &str = "Total Expenses";
const CURRENT_BALANCE: &str = "Current Balance";
const INCOME_RECORDS: &str = "Total Income Records";
const EXPENSE_RECORDS: &str = "Total Expense Records";
const LAST_UPDATED_METRIC: &str = "Last Updated";

/// The six derived metrics. Always computed from scratch; never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_income: Amount,
    pub total_expenses: Amount,
    pub current_balance: Amount,
    pub income_records: usize,
    pub expense_records: usize,
    pub last_updated: DateTime<FixedOffset>,
}

impl Summary {
    pub fn compute(income: &[Record], expense: &[Record], now: DateTime<FixedOffset>) -> Self {
        let total_income: Amount = income.iter().map(|r| &r.amount).sum();
        let total_expenses: Amount = expense.iter().map(|r| &r.amount).sum();
        Self {
            total_income,
            total_expenses,
            current_balance: total_income - total_expenses,
            income_records: income.len(),
            expense_records: expense.len(),
            last_updated: now,
        }
    }

    /// The zero summary of an empty dataset.
    pub fn zero(now: DateTime<FixedOffset>) -> Self {
        Self::compute(&[], &[], now)
    }

    pub(crate) fn to_partition(&self) -> Partition {
        let updated = timestamp(&self.last_updated);
        let metric = |name: &str, value: String| -> Row {
            Row::new(vec![Cell::new(name), Cell::new(value), Cell::new(&updated)])
        };
        Partition::with_rows(
            SUMMARY,
            SUMMARY_HEADERS,
            vec![
                metric(TOTAL_INCOME, self.total_income.to_string()),
                metric(TOTAL_EXPENSES, self.total_expenses.to_string()),
                metric(CURRENT_BALANCE, self.current_balance.to_string()),
                metric(INCOME_RECORDS, self.income_records.to_string()),
                metric(EXPENSE_RECORDS, self.expense_records.to_string()),
                metric(LAST_UPDATED_METRIC, updated.clone()),
            ],
        )
    }

    #[cfg(test)]
    /// Reads a value back out of a `Summary` partition.
    pub(crate) fn stored_value<'a>(partition: &'a Partition, metric: &str) -> Option<&'a str> {
        partition
            .rows()
            .iter()
            .find(|row| partition.value(row, METRIC) == Some(metric))
            .and_then(|row| {
                partition
                    .value(row, VALUE)
                    .or_else(|| partition.value(row, LAST_UPDATED))
            })
    }
}
