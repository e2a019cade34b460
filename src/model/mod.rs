//! Types that represent the core data model, such as `Record`, `Partition` and `Dataset`.
mod amount;
mod dataset;
mod mapping;
mod month;
mod partition;
mod record;
mod summary;
mod xlsx;

pub use amount::{Amount, AmountError};
pub use dataset::Dataset;
pub use mapping::{storage_field, wire_field, Mapping, MappingError};
pub use month::{month_for, MonthKey};
pub use partition::{Cell, Partition, Row, Workbook};
pub use record::{Record, RecordInput, RecordKind};
pub use summary::{Summary, SUMMARY};
pub use xlsx::XLSX_CONTENT_TYPE;

pub(crate) use mapping::{KIND_HEADERS, MONTH_HEADERS};
