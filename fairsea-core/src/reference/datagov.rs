//! Employed-residents-by-sex tables from the data.gov.sg datastore API.

use crate::config::ReferenceConfig;
use crate::error::FetchError;
use crate::reference::{ReferenceRow, ReferenceSource, ReferenceTable, ReferenceTopic};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const SERIES_COLUMN: &str = "DataSeries";
const AGE_MARKER: &str = "Aged 15 - 19 Years";

/// Series names that are aggregates rather than categories.
const INDUSTRY_AGGREGATES: &[&str] = &["services", "total", "all industries"];

type Row = Map<String, Value>;

/// Blocking client for the datastore search endpoint.
pub struct DataGovSgSource {
    client: reqwest::blocking::Client,
    config: ReferenceConfig,
}

impl DataGovSgSource {
    pub fn new(config: ReferenceConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn datasets(&self, topic: ReferenceTopic) -> (&str, &str) {
        match topic {
            ReferenceTopic::Occupation => (
                self.config.occupation_female_dataset.as_str(),
                self.config.occupation_male_dataset.as_str(),
            ),
            ReferenceTopic::Industry => (
                self.config.industry_female_dataset.as_str(),
                self.config.industry_male_dataset.as_str(),
            ),
        }
    }

    fn fetch_records(&self, dataset: &str) -> Result<Vec<Row>, FetchError> {
        let limit = self.config.row_limit.to_string();
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("resource_id", dataset), ("limit", limit.as_str())])
            .send()?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: response.url().to_string(),
            });
        }
        let body: Value = response.json()?;
        body["result"]["records"]
            .as_array()
            .ok_or_else(|| FetchError::parse(format!("dataset {dataset} has no result.records")))?
            .iter()
            .map(|record| {
                record
                    .as_object()
                    .cloned()
                    .ok_or_else(|| FetchError::parse("record is not an object"))
            })
            .collect()
    }
}

impl ReferenceSource for DataGovSgSource {
    fn fetch(&self, topic: ReferenceTopic) -> Result<ReferenceTable, FetchError> {
        if !self.config.enabled {
            return Err(FetchError::Disabled);
        }
        let (female_id, male_id) = self.datasets(topic);
        let female = self.fetch_records(female_id)?;
        let male = self.fetch_records(male_id)?;
        let table = parse_reference(topic, &female, &male, female_id, male_id)?;
        tracing::info!(
            topic = %topic,
            year = %table.year,
            categories = table.rows.len(),
            "Fetched reference statistics"
        );
        Ok(table)
    }
}

/// Latest column whose name is a year.
fn latest_year_column(records: &[Row], dataset: &str) -> Result<String, FetchError> {
    records
        .iter()
        .flat_map(|r| r.keys())
        .filter(|k| !k.is_empty() && k.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|k| k.parse::<u32>().ok().map(|year| (year, k)))
        .max_by_key(|(year, _)| *year)
        .map(|(_, k)| k.clone())
        .ok_or_else(|| FetchError::MissingYearColumn(dataset.to_string()))
}

fn series(record: &Row) -> &str {
    record
        .get(SERIES_COLUMN)
        .and_then(Value::as_str)
        .map_or("", str::trim)
}

fn count(record: &Row, year: &str) -> f64 {
    match record.get(year) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().replace(',', "").parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Category rows between the "All ..." total row and the first age-band row;
/// every row when either marker is missing.
fn category_rows(records: &[Row]) -> &[Row] {
    let start = records.iter().position(|r| series(r).starts_with("All "));
    let stop = records.iter().position(|r| series(r).contains(AGE_MARKER));
    match (start, stop) {
        (Some(start), Some(stop)) if start < stop => &records[start + 1..stop],
        _ => records,
    }
}

fn counts_by_category(records: &[Row], year: &str) -> BTreeMap<String, f64> {
    let mut counts = BTreeMap::new();
    for record in category_rows(records) {
        let name = series(record).to_lowercase();
        if name.is_empty() {
            continue;
        }
        *counts.entry(name).or_insert(0.0) += count(record, year);
    }
    counts
}

/// Merge the female and male datasets on their lowercased series names.
pub fn parse_reference(
    topic: ReferenceTopic,
    female: &[Row],
    male: &[Row],
    female_id: &str,
    male_id: &str,
) -> Result<ReferenceTable, FetchError> {
    let female_year = latest_year_column(female, female_id)?;
    let male_year = latest_year_column(male, male_id)?;
    let female_counts = counts_by_category(female, &female_year);
    let male_counts = counts_by_category(male, &male_year);

    let rows: Vec<ReferenceRow> = male_counts
        .into_iter()
        .filter_map(|(category, male)| {
            female_counts.get(&category).map(|&female| ReferenceRow {
                category,
                male,
                female,
            })
        })
        .filter(|row| {
            topic != ReferenceTopic::Industry || !INDUSTRY_AGGREGATES.contains(&row.category.as_str())
        })
        .collect();

    if rows.is_empty() {
        return Err(FetchError::Empty(format!("{female_id}/{male_id}")));
    }
    Ok(ReferenceTable {
        topic,
        year: male_year,
        rows,
    })
}
