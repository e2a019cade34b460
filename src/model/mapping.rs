//! Header schemas for the partitions of a dataset and the translation between wire-level field
//! names (`amount`) and storage field names (`Amount`).

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};

pub(crate) const ID: &str = "ID";
pub(crate) const DATE: &str = "Date";
pub(crate) const TIME: &str = "Time";
pub(crate) const TYPE: &str = "Type";
pub(crate) const CATEGORY: &str = "Category";
pub(crate) const SUBCATEGORY: &str = "Subcategory";
pub(crate) const AMOUNT: &str = "Amount";
pub(crate) const DESCRIPTION: &str = "Description";
pub(crate) const CREATED_AT: &str = "Created At";
pub(crate) const UPDATED_AT: &str = "Updated At";
pub(crate) const METRIC: &str = "Metric";
pub(crate) const VALUE: &str = "Value";
pub(crate) const LAST_UPDATED: &str = "Last Updated";

/// Headers of the `Income` and `Expense` partitions.
pub(crate) const KIND_HEADERS: &[&str] = &[
    ID,
    DATE,
    TIME,
    CATEGORY,
    SUBCATEGORY,
    AMOUNT,
    DESCRIPTION,
    CREATED_AT,
    UPDATED_AT,
];

/// Headers of the per-month partitions.
pub(crate) const MONTH_HEADERS: &[&str] = &[
    ID,
    DATE,
    TIME,
    TYPE,
    CATEGORY,
    SUBCATEGORY,
    AMOUNT,
    DESCRIPTION,
    CREATED_AT,
];

/// Headers of the `Summary` partition.
pub(crate) const SUMMARY_HEADERS: &[&str] = &[METRIC, VALUE, LAST_UPDATED];

/// Wire field name to storage field name. Wire names are what HTTP clients send; storage names are
/// the partition headers.
const WIRE_TO_STORAGE: &[(&str, &str)] = &[
    ("type", TYPE),
    ("category", CATEGORY),
    ("amount", AMOUNT),
    ("description", DESCRIPTION),
    ("date", DATE),
    ("id", ID),
    ("time", TIME),
    ("subcategory", SUBCATEGORY),
];

/// Translates an inbound field name to the storage field it addresses. Storage names are accepted
/// as-is. Returns `None` for fields that do not address a storage field.
pub fn storage_field(name: &str) -> Option<&'static str> {
    WIRE_TO_STORAGE
        .iter()
        .find(|(wire, storage)| *wire == name || *storage == name)
        .map(|(_, storage)| *storage)
}

/// Translates a storage field name to its wire name, e.g. `Created At` to `createdAt`.
pub fn wire_field(header: &str) -> String {
    if let Some((wire, _)) = WIRE_TO_STORAGE.iter().find(|(_, s)| *s == header) {
        return wire.to_string();
    }
    to_lower_camel(header)
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MappingError(String);

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl StdError for MappingError {}

/// The header row of a partition, with a lookup from header name to column index. Lookups are by
/// name so that the column order of a hand-edited file does not matter.
#[derive(Default, Debug, Clone, Eq, PartialEq)]
pub struct Mapping {
    headers: Vec<String>,
    header_map: HashMap<String, usize>,
}

impl Mapping {
    /// Create a new `Mapping` from a header row. Header names are trimmed. Blank headers are kept
    /// in place (so that column indexes line up with the row) but cannot be looked up.
    pub fn new<S, I>(headers: I) -> Result<Self, MappingError>
    where
        S: Into<String>,
        I: IntoIterator<Item = S>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|s| s.into().trim().to_string())
            .collect();

        let mut header_map = HashMap::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            if header_map.insert(header.clone(), idx).is_some() {
                return Err(MappingError(format!(
                    "Encountered a duplicate header '{header}'"
                )));
            }
        }

        Ok(Self {
            headers,
            header_map,
        })
    }

    /// Creates a `Mapping` from one of the fixed schemas in this module.
    pub(crate) fn fixed(headers: &[&str]) -> Self {
        let header_map = headers
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.to_string(), idx))
            .collect();
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            header_map,
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn index(&self, header: &str) -> Option<usize> {
        self.header_map.get(header).copied()
    }

    /// True if every one of `required` can be looked up.
    pub fn contains_all(&self, required: &[&str]) -> bool {
        required.iter().all(|h| self.header_map.contains_key(*h))
    }
}

/// `Created At` becomes `createdAt`, `ID` becomes `id`.
fn to_lower_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, word) in s.split_whitespace().enumerate() {
        let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
        if i == 0 {
            out.push_str(&word.to_lowercase());
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}
