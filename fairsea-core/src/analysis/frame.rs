//! Records paired with one derived outcome column.

use crate::data::{DemographicAttribute, Record};
use crate::error::FairseaError;
use crate::metrics::ContingencyTable;
use std::fmt;

/// How records are grouped: by one attribute or by a combination of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grouping {
    Attribute(DemographicAttribute),
    Combination(Vec<DemographicAttribute>),
}

impl Grouping {
    /// `Gender`, or `Gender_Race`, `Race_Nat`, `Gender_Race_Nat` for combinations.
    pub fn name(&self) -> String {
        match self {
            Self::Attribute(attr) => attr.column().to_string(),
            Self::Combination(attrs) => attrs
                .iter()
                .map(|a| a.short_name())
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    pub fn attributes(&self) -> Vec<DemographicAttribute> {
        match self {
            Self::Attribute(attr) => vec![*attr],
            Self::Combination(attrs) => attrs.clone(),
        }
    }

    /// Attribute values of `record`, in grouping order.
    pub fn values(&self, record: &Record) -> Vec<String> {
        self.attributes()
            .iter()
            .map(|a| a.value(record).to_string())
            .collect()
    }

    /// Group key: the attribute values joined with `_`.
    pub fn key(&self, record: &Record) -> String {
        self.values(record).join("_")
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Every combination of two or more attributes, smallest first, each in
/// attribute order.
pub fn combinations(attributes: &[DemographicAttribute]) -> Vec<Grouping> {
    let mut attrs = attributes.to_vec();
    attrs.sort();
    attrs.dedup();
    let k = attrs.len();
    let mut masks: Vec<u32> = (1u32..(1 << k)).filter(|m| m.count_ones() >= 2).collect();
    masks.sort_by_key(|m| (m.count_ones(), *m));
    masks
        .into_iter()
        .map(|mask| {
            Grouping::Combination(
                (0..k)
                    .filter(|i| mask & (1 << i) != 0)
                    .map(|i| attrs[i])
                    .collect(),
            )
        })
        .collect()
}

/// Analyzed records and their outcome values, index-aligned.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a, T> {
    pub records: &'a [Record],
    pub outcome: &'a [T],
    pub outcome_name: &'a str,
}

impl<'a, T> Frame<'a, T> {
    pub fn new(
        records: &'a [Record],
        outcome: &'a [T],
        outcome_name: &'a str,
    ) -> Result<Self, FairseaError> {
        if records.len() != outcome.len() {
            return Err(FairseaError::invalid_input(format!(
                "{} records but {} outcome values",
                records.len(),
                outcome.len()
            )));
        }
        Ok(Self {
            records,
            outcome,
            outcome_name,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct values of `attribute`.
    pub fn levels(&self, attribute: DemographicAttribute) -> usize {
        let mut values: Vec<&str> = self.records.iter().map(|r| attribute.value(r)).collect();
        values.sort_unstable();
        values.dedup();
        values.len()
    }
}

impl<T: AsRef<str>> Frame<'_, T> {
    /// Cross-tabulate group keys against outcome labels.
    pub fn table(&self, grouping: &Grouping) -> ContingencyTable<String> {
        ContingencyTable::from_observations(
            self.records
                .iter()
                .zip(self.outcome)
                .map(|(r, o)| (grouping.key(r), o.as_ref())),
        )
    }

    /// Cross-tabulate attribute tuples against outcome labels.
    pub fn tuple_table(&self, grouping: &Grouping) -> ContingencyTable<Vec<String>> {
        ContingencyTable::from_observations(
            self.records
                .iter()
                .zip(self.outcome)
                .map(|(r, o)| (grouping.values(r), o.as_ref())),
        )
    }
}

impl Frame<'_, f64> {
    /// `(group key, score)` pairs.
    pub fn scores(&self, grouping: &Grouping) -> Vec<(String, f64)> {
        self.records
            .iter()
            .zip(self.outcome)
            .map(|(r, s)| (grouping.key(r), *s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DemographicAttribute::*;

    #[test]
    fn test_combination_names_and_order() {
        let names: Vec<String> = combinations(&DemographicAttribute::ALL)
            .iter()
            .map(Grouping::name)
            .collect();
        assert_eq!(names, vec!["Gender_Race", "Gender_Nat", "Race_Nat", "Gender_Race_Nat"]);
    }

    #[test]
    fn test_two_attributes_give_one_combination() {
        let combos = combinations(&[Race, Gender]);
        assert_eq!(combos, vec![Grouping::Combination(vec![Gender, Race])]);
    }

    #[test]
    fn test_keys() {
        let r = Record::new("D1-1", "x", "Female", "Malay", "Singaporean");
        assert_eq!(Grouping::Attribute(Race).key(&r), "Malay");
        let all = Grouping::Combination(vec![Gender, Race, Nationality]);
        assert_eq!(all.key(&r), "Female_Malay_Singaporean");
        assert_eq!(all.values(&r), vec!["Female", "Malay", "Singaporean"]);
    }

    #[test]
    fn test_frame_length_mismatch() {
        let records = vec![Record::new("D1-1", "x", "Female", "Malay", "Singaporean")];
        let outcome: Vec<String> = Vec::new();
        assert!(Frame::new(&records, &outcome, "label").is_err());
    }

    #[test]
    fn test_frame_table() {
        let records = vec![
            Record::new("D1-1", "x", "Female", "Malay", "Singaporean"),
            Record::new("D1-2", "y", "Male", "Malay", "Singaporean"),
            Record::new("D1-3", "y", "Male", "Malay", "Singaporean"),
        ];
        let outcome = vec!["x".to_string(), "y".to_string(), "y".to_string()];
        let frame = Frame::new(&records, &outcome, "label").unwrap();
        let t = frame.table(&Grouping::Attribute(Gender));
        assert_eq!(t.counts, vec![vec![1, 0], vec![0, 2]]);
        assert_eq!(frame.levels(Race), 1);
    }
}
