//! Side-by-side gender shares: model outputs against reference statistics.

use crate::data::Record;
use crate::error::FairseaError;
use crate::reference::ReferenceTable;
use serde::Serialize;
use std::collections::BTreeMap;

/// Renames model labels onto the reference taxonomy. Labels without an
/// entry pass through; several labels may map onto one reference category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRemap {
    map: BTreeMap<String, String>,
}

impl LabelRemap {
    pub fn new<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let map = pairs
            .into_iter()
            .map(|(from, to)| (key(from.as_ref()), to.as_ref().to_string()))
            .collect();
        Self { map }
    }

    /// Lowercased reference category for a model label.
    pub fn apply(&self, label: &str) -> String {
        let label = key(label);
        match self.map.get(&label) {
            Some(target) => key(target),
            None => label,
        }
    }
}

fn key(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Shares of one category from both sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub category: String,
    pub model_male_share: f64,
    pub actual_male_share: f64,
    pub model_female_share: f64,
    pub actual_female_share: f64,
}

/// Two rows (`Model`, `GroundTruth`) by category, ready for a heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareMatrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl ShareMatrix {
    fn new(columns: Vec<String>, model: Vec<f64>, reference: Vec<f64>) -> Self {
        Self {
            rows: vec!["Model".to_string(), "GroundTruth".to_string()],
            columns,
            values: vec![model, reference],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub rows: Vec<ComparisonRow>,
    pub male: ShareMatrix,
    pub female: ShareMatrix,
}

#[derive(Default)]
struct GenderCounts {
    male: u64,
    female: u64,
    total: u64,
}

fn share(part: u64, total: u64) -> f64 {
    if total == 0 { 0.0 } else { part as f64 / total as f64 }
}

/// P(gender | category) for every category the model produced, next to the
/// same shares in the reference table. Reference categories the model never
/// produced are dropped; model categories missing from the reference get 0.
pub fn compare<S: AsRef<str>>(
    records: &[Record],
    labels: &[S],
    remap: &LabelRemap,
    reference: &ReferenceTable,
) -> Result<Comparison, FairseaError> {
    if records.len() != labels.len() {
        return Err(FairseaError::invalid_input(format!(
            "{} records but {} labels",
            records.len(),
            labels.len()
        )));
    }

    let mut counts: BTreeMap<String, GenderCounts> = BTreeMap::new();
    for (record, label) in records.iter().zip(labels) {
        let entry = counts.entry(remap.apply(label.as_ref())).or_default();
        entry.total += 1;
        match record.gender.trim().to_ascii_lowercase().as_str() {
            "male" => entry.male += 1,
            "female" => entry.female += 1,
            _ => {}
        }
    }

    let rows: Vec<ComparisonRow> = counts
        .into_iter()
        .map(|(category, c)| {
            let actual = reference.get(&category);
            ComparisonRow {
                model_male_share: share(c.male, c.total),
                actual_male_share: actual.map_or(0.0, |r| r.male_share()),
                model_female_share: share(c.female, c.total),
                actual_female_share: actual.map_or(0.0, |r| r.female_share()),
                category,
            }
        })
        .collect();

    let columns: Vec<String> = rows.iter().map(|r| r.category.clone()).collect();
    let male = ShareMatrix::new(
        columns.clone(),
        rows.iter().map(|r| r.model_male_share).collect(),
        rows.iter().map(|r| r.actual_male_share).collect(),
    );
    let female = ShareMatrix::new(
        columns,
        rows.iter().map(|r| r.model_female_share).collect(),
        rows.iter().map(|r| r.actual_female_share).collect(),
    );

    tracing::debug!(
        topic = %reference.topic,
        categories = rows.len(),
        "Compared model shares with reference"
    );
    Ok(Comparison { rows, male, female })
}
