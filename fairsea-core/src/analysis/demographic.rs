//! Single-attribute analysis: one test and a set of indices per attribute.

use crate::analysis::frame::{Frame, Grouping};
use crate::analysis::unit::AnalysisUnit;
use crate::data::DemographicAttribute;
use crate::error::FairseaError;
use crate::metrics::{
    ContingencyTable, GroupScores, GroupStats, JsdScore, ProportionTable, TestKind, compare_groups,
    dbi, fdi, grouped_stats, idi, jsd,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Categorical outcome analysis of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalAttributeResult {
    #[serde(rename = "ct")]
    pub table: ContingencyTable<String>,
    #[serde(rename = "ct_pct")]
    pub proportions: ProportionTable<String>,
    pub chi2: f64,
    pub p: f64,
    pub dof: usize,
    pub fdi: GroupScores<String>,
    pub jsd: Vec<JsdScore<String>>,
    pub idi: GroupScores<Vec<String>>,
}

/// Continuous outcome analysis of one attribute.
///
/// `test`, `stat` and `p` are null when the group comparison cannot be run
/// (one level, a single-observation group, no within-group variance);
/// `test_skipped` then carries the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinuousAttributeResult {
    pub grouped: Vec<GroupStats<String>>,
    pub dbi: GroupScores<String>,
    pub test: Option<TestKind>,
    /// t for two groups, F otherwise.
    pub stat: Option<f64>,
    pub p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_skipped: Option<String>,
}

pub type CategoricalDemographics = BTreeMap<DemographicAttribute, AnalysisUnit<CategoricalAttributeResult>>;
pub type ContinuousDemographics = BTreeMap<DemographicAttribute, AnalysisUnit<ContinuousAttributeResult>>;

fn categorical_attribute<T: AsRef<str>>(
    frame: &Frame<'_, T>,
    attribute: DemographicAttribute,
    yates: bool,
) -> Result<CategoricalAttributeResult, FairseaError> {
    let grouping = Grouping::Attribute(attribute);
    let table = frame.table(&grouping);
    let chi = table.chi_square(yates)?;
    let proportions = table.normalized()?;
    let tuple_proportions = frame.tuple_table(&grouping).normalized()?;
    Ok(CategoricalAttributeResult {
        fdi: fdi(&proportions),
        jsd: jsd(&proportions),
        idi: idi(&tuple_proportions),
        chi2: chi.statistic,
        p: chi.p_value,
        dof: chi.dof,
        proportions,
        table,
    })
}

fn continuous_attribute(
    frame: &Frame<'_, f64>,
    attribute: DemographicAttribute,
) -> Result<ContinuousAttributeResult, FairseaError> {
    let scores = frame.scores(&Grouping::Attribute(attribute));
    let dbi = dbi(&scores)?;
    let grouped = grouped_stats(&scores);
    let unit = format!("{} test", attribute.column());
    Ok(match AnalysisUnit::capture(compare_groups(&scores), &unit)? {
        AnalysisUnit::Computed(test) => ContinuousAttributeResult {
            grouped,
            dbi,
            test: Some(test.kind),
            stat: Some(test.statistic),
            p: Some(test.p_value),
            test_skipped: None,
        },
        AnalysisUnit::Skipped { reason } => ContinuousAttributeResult {
            grouped,
            dbi,
            test: None,
            stat: None,
            p: None,
            test_skipped: Some(reason),
        },
    })
}

/// Chi-square, FDI, JSD and single-attribute IDI for each attribute.
pub fn analyze_categorical<T: AsRef<str>>(
    frame: &Frame<'_, T>,
    attributes: &[DemographicAttribute],
    yates: bool,
) -> Result<CategoricalDemographics, FairseaError> {
    attributes
        .iter()
        .map(|&attr| {
            let unit = AnalysisUnit::capture(categorical_attribute(frame, attr, yates), attr.column())?;
            Ok((attr, unit))
        })
        .collect()
}

/// Grouped stats, DBI and a t-test or ANOVA for each attribute. The test is
/// chosen by the attribute's cardinality.
pub fn analyze_continuous(
    frame: &Frame<'_, f64>,
    attributes: &[DemographicAttribute],
) -> Result<ContinuousDemographics, FairseaError> {
    attributes
        .iter()
        .map(|&attr| {
            let unit = AnalysisUnit::capture(continuous_attribute(frame, attr), attr.column())?;
            Ok((attr, unit))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Record;
    use pretty_assertions::assert_eq;
    use DemographicAttribute::*;

    fn ninety_ten() -> (Vec<Record>, Vec<String>) {
        let mut records = Vec::new();
        let mut labels = Vec::new();
        for i in 0..100 {
            let (gender, x) = if i < 50 { ("Female", i < 45) } else { ("Male", i < 55) };
            let race = if i % 2 == 0 { "Chinese" } else { "Malay" };
            records.push(Record::new(format!("D1-{i}"), "", gender, race, "Singaporean"));
            labels.push(if x { "X" } else { "Y" }.to_string());
        }
        (records, labels)
    }

    #[test]
    fn test_categorical_ninety_ten() {
        let (records, labels) = ninety_ten();
        let frame = Frame::new(&records, &labels, "label").unwrap();
        let results = analyze_categorical(&frame, &DemographicAttribute::ALL, true).unwrap();

        let gender = results[&Gender].computed().unwrap();
        assert!(gender.p < 0.01);
        assert_eq!(gender.table.counts, vec![vec![45, 5], vec![5, 45]]);
        for score in gender.fdi.iter() {
            assert!((score.value - 0.4).abs() < 1e-12);
        }
        assert!(gender.jsd.iter().all(|s| s.divergence > 0.0));
        assert_eq!(gender.idi.len(), 2);

        assert!(results[&Race].computed().is_some());
    }

    #[test]
    fn test_single_nationality_keeps_table_and_indices() {
        let (records, labels) = ninety_ten();
        let frame = Frame::new(&records, &labels, "label").unwrap();
        let results = analyze_categorical(&frame, &[Nationality], true).unwrap();

        let nat = results[&Nationality].computed().unwrap();
        assert_eq!(nat.dof, 0);
        assert_eq!(nat.chi2, 0.0);
        assert_eq!(nat.p, 1.0);
        assert_eq!(nat.table.counts, vec![vec![50, 50]]);
        assert_eq!(nat.proportions.values, vec![vec![0.5, 0.5]]);
        assert_eq!(nat.fdi.get(&"Singaporean".to_string()), Some(0.0));
        assert_eq!(nat.jsd.len(), 1);
        assert_eq!(nat.idi.len(), 1);
    }

    #[test]
    fn test_lone_observation_keeps_dbi_and_grouped_stats() {
        let mut records = Vec::new();
        let mut scores = Vec::new();
        for i in 0..10 {
            let gender = if i < 9 { "Female" } else { "Male" };
            records.push(Record::new(format!("D2-{i}"), "", gender, "Chinese", "Singaporean"));
            scores.push(i as f64 / 10.0);
        }
        let frame = Frame::new(&records, &scores, "sentiment_score").unwrap();
        let results = analyze_continuous(&frame, &[Gender]).unwrap();

        let gender = results[&Gender].computed().unwrap();
        assert_eq!(gender.test, None);
        assert_eq!(gender.stat, None);
        assert_eq!(gender.p, None);
        assert!(gender.test_skipped.as_deref().unwrap().contains("two observations"));
        assert_eq!(gender.grouped.len(), 2);
        assert_eq!(gender.grouped[1].count, 1);
        assert!(gender.dbi.get(&"Male".to_string()).unwrap() > 0.0);

        let json = serde_json::to_value(&results[&Gender]).unwrap();
        assert_eq!(json["status"], "computed");
        assert!(json["result"]["p"].is_null());
    }

    #[test]
    fn test_continuous_dispatch() {
        let records = vec![
            Record::new("D2-1", "", "Female", "Chinese", "Singaporean"),
            Record::new("D2-2", "", "Female", "Malay", "Singaporean"),
            Record::new("D2-3", "", "Male", "Indian", "Singaporean"),
            Record::new("D2-4", "", "Male", "Chinese", "Singaporean"),
            Record::new("D2-5", "", "Female", "Malay", "Singaporean"),
            Record::new("D2-6", "", "Male", "Indian", "Singaporean"),
        ];
        let scores = vec![0.8, 0.6, 0.1, 0.3, 0.7, 0.0];
        let frame = Frame::new(&records, &scores, "sentiment_score").unwrap();
        let results = analyze_continuous(&frame, &DemographicAttribute::ALL).unwrap();

        let gender = results[&Gender].computed().unwrap();
        assert_eq!(gender.test, Some(TestKind::WelchT));
        assert!(gender.stat.unwrap() > 0.0);
        assert_eq!(gender.grouped.len(), 2);

        let race = results[&Race].computed().unwrap();
        assert_eq!(race.test, Some(TestKind::OneWayAnova));

        // one nationality: no test, but the rest of the unit survives
        let nat = results[&Nationality].computed().unwrap();
        assert_eq!(nat.test, None);
        assert_eq!(nat.grouped.len(), 1);
    }
}
