//! The `.xlsx` form of a `Workbook`: one worksheet per partition, in partition order.
//!
//! Every cell is written as text, exactly as the partition holds it. Reading also accepts the
//! numbers, booleans and dates a spreadsheet program leaves behind when the file is edited by
//! hand, and turns them back into text.

use crate::error::Res;
use crate::model::partition::{Cell, Partition, Workbook};
use anyhow::Context;
use calamine::{Data, Reader, Xlsx};
use chrono::Timelike;
use std::io::Cursor;

/// The content type of an `.xlsx` file.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

impl Workbook {
    /// Reads every worksheet of an `.xlsx` file.
    pub fn from_xlsx(bytes: &[u8]) -> Res<Self> {
        let mut book: Xlsx<_> =
            Xlsx::new(Cursor::new(bytes)).context("The file is not a valid .xlsx workbook")?;
        let mut sheets = Vec::new();
        for name in book.sheet_names() {
            let range = book
                .worksheet_range(&name)
                .with_context(|| format!("Unable to read the worksheet '{name}'"))?;
            let grid = match range.end() {
                None => Vec::new(),
                // positions are absolute, so leading empty rows and columns are kept
                Some((last_row, last_col)) => (0..=last_row)
                    .map(|row| {
                        (0..=last_col)
                            .map(|col| range.get_value((row, col)).map_or_else(Cell::empty, cell))
                            .collect()
                    })
                    .collect(),
            };
            sheets.push(Partition::from_grid(name, grid)?);
        }
        Ok(Self { sheets })
    }

    /// Writes the workbook as an `.xlsx` file.
    pub fn to_xlsx(&self) -> Res<Vec<u8>> {
        let mut book = rust_xlsxwriter::Workbook::new();
        for partition in &self.sheets {
            let sheet = book.add_worksheet();
            sheet
                .set_name(partition.name())
                .with_context(|| format!("'{}' is not a valid worksheet name", partition.name()))?;
            for (row, cells) in partition.to_grid().iter().enumerate() {
                let row = u32::try_from(row).context("Too many rows for a worksheet")?;
                for (col, value) in cells.iter().enumerate() {
                    let Some(text) = value.raw() else {
                        continue;
                    };
                    let col = u16::try_from(col).context("Too many columns for a worksheet")?;
                    sheet.write_string(row, col, text).with_context(|| {
                        format!("Unable to write row {row} of '{}'", partition.name())
                    })?;
                }
            }
        }
        book.save_to_buffer()
            .context("Unable to serialize the workbook")
    }
}

fn cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::empty(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from(s.clone()),
        Data::Int(i) => Cell::new(i.to_string()),
        Data::Float(f) => Cell::new(f.to_string()),
        Data::Bool(b) => Cell::new(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(dt) if dt.time().num_seconds_from_midnight() == 0 => {
                Cell::new(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => Cell::new(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => Cell::new(dt.as_f64().to_string()),
        },
    }
}
