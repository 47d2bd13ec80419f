//! External reference statistics (labour-force counts by sex) and the
//! comparison of model-derived shares against them.

pub mod compare;
pub mod datagov;

pub use compare::{Comparison, ComparisonRow, LabelRemap, ShareMatrix, compare};
pub use datagov::{DataGovSgSource, parse_reference};

use crate::error::FetchError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which reference statistics a pipeline compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTopic {
    Occupation,
    Industry,
}

impl fmt::Display for ReferenceTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Occupation => f.write_str("occupation"),
            Self::Industry => f.write_str("industry"),
        }
    }
}

/// Male and female counts for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    /// Lowercased, trimmed category name.
    pub category: String,
    pub male: f64,
    pub female: f64,
}

impl ReferenceRow {
    pub fn male_share(&self) -> f64 {
        share(self.male, self.male + self.female)
    }

    pub fn female_share(&self) -> f64 {
        share(self.female, self.male + self.female)
    }
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 { part / total } else { 0.0 }
}

/// Reference counts per category, sorted by category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    pub topic: ReferenceTopic,
    /// Year column the counts were taken from.
    pub year: String,
    pub rows: Vec<ReferenceRow>,
}

impl ReferenceTable {
    pub fn get(&self, category: &str) -> Option<&ReferenceRow> {
        let key = category.trim().to_lowercase();
        self.rows.iter().find(|r| r.category == key)
    }
}

/// Supplier of reference tables. Failures are reported, never fatal.
pub trait ReferenceSource: Send + Sync {
    fn fetch(&self, topic: ReferenceTopic) -> Result<ReferenceTable, FetchError>;
}

/// Source that always reports fetching as disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledReferenceSource;

impl ReferenceSource for DisabledReferenceSource {
    fn fetch(&self, _topic: ReferenceTopic) -> Result<ReferenceTable, FetchError> {
        Err(FetchError::Disabled)
    }
}

/// In-memory tables, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticReferenceSource {
    tables: BTreeMap<ReferenceTopic, ReferenceTable>,
}

impl StaticReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: ReferenceTable) -> Self {
        self.tables.insert(table.topic, table);
        self
    }
}

impl ReferenceSource for StaticReferenceSource {
    fn fetch(&self, topic: ReferenceTopic) -> Result<ReferenceTable, FetchError> {
        self.tables
            .get(&topic)
            .cloned()
            .ok_or_else(|| FetchError::Empty(topic.to_string()))
    }
}
