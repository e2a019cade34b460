//! Cells, rows and named partitions: the grid-shaped storage form of the dataset, shared by the
//! dataset file and the cloud mirror.

use crate::error::Res;
use crate::model::mapping::Mapping;
use anyhow::Context;

/// One spreadsheet cell. Absent and present-but-blank are kept apart when reading so that a file
/// round-trips, but both count as "no data".
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub struct Cell(Option<String>);

impl Cell {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    pub fn empty() -> Self {
        Self(None)
    }

    /// The raw cell text.
    pub fn raw(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// The trimmed cell text, or `None` if the cell is null or whitespace-only.
    pub fn text(&self) -> Option<&str> {
        self.0.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.text().is_none()
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Cell::empty()
        } else {
            Cell(Some(value))
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from(value.to_string())
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        Self(value)
    }
}

/// A data row of a partition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Row(Vec<Cell>);

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    /// A row is blank when none of its cells hold a non-whitespace value.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(Cell::is_blank)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> Option<&Cell> {
        self.0.get(idx)
    }
}

impl FromIterator<Cell> for Row {
    fn from_iter<T: IntoIterator<Item = Cell>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A named sequence of rows sharing one header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    name: String,
    mapping: Mapping,
    rows: Vec<Row>,
}

impl Partition {
    /// An empty partition with the given headers.
    pub fn new(name: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            name: name.into(),
            mapping: Mapping::fixed(headers),
            rows: Vec::new(),
        }
    }

    /// A partition with the given headers and rows.
    pub fn with_rows(name: impl Into<String>, headers: &[&str], rows: Vec<Row>) -> Self {
        let mut partition = Self::new(name, headers);
        partition.rows = rows.into_iter().filter(|r| !r.is_blank()).collect();
        partition
    }

    /// Builds a partition from a grid in which the first row is the header row. A grid with no
    /// rows at all is a partition with no headers. Blank data rows are dropped.
    pub fn from_grid(name: impl Into<String>, grid: Vec<Vec<Cell>>) -> Res<Self> {
        let name = name.into();
        let mut grid = grid.into_iter();
        let mapping = match grid.next() {
            None => Mapping::default(),
            Some(header_row) => Mapping::new(
                header_row
                    .into_iter()
                    .map(|c| c.raw().unwrap_or_default().to_string()),
            )
            .with_context(|| format!("The header row of '{name}' is invalid"))?,
        };
        let rows = grid.map(Row).filter(|r| !r.is_blank()).collect();
        Ok(Self {
            name,
            mapping,
            rows,
        })
    }

    /// The header row followed by the data rows.
    pub fn to_grid(&self) -> Vec<Vec<Cell>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.mapping.headers().iter().map(Cell::from).collect());
        grid.extend(self.rows.iter().map(|r| r.0.clone()));
        grid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The non-blank text of `row` under `header`.
    pub fn value<'a>(&self, row: &'a Row, header: &str) -> Option<&'a str> {
        self.mapping
            .index(header)
            .and_then(|idx| row.get(idx))
            .and_then(Cell::text)
    }
}

impl From<&String> for Cell {
    fn from(value: &String) -> Self {
        Cell::from(value.as_str())
    }
}

/// The whole dataset file: an ordered list of partitions, stored as an `.xlsx` workbook with one
/// worksheet per partition.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Workbook {
    pub sheets: Vec<Partition>,
}

impl Workbook {
    pub fn get(&self, name: &str) -> Option<&Partition> {
        self.sheets.iter().find(|p| p.name() == name)
    }
}
