//! Input records: the data model and the loaders that produce it.

pub mod record;
pub mod source;

pub use record::{DemographicAttribute, Record, clean_output};
pub use source::{FileSource, RecordFormat, RecordSource, prepare_records};
