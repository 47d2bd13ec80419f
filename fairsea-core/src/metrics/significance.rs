//! Group comparisons for continuous outcomes.

use crate::error::FairseaError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::collections::BTreeMap;

/// Descriptive statistics of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats<K> {
    pub group: K,
    pub mean: f64,
    /// Sample standard deviation; absent below two observations.
    pub std: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    WelchT,
    OneWayAnova,
}

/// Result of a two-sample t-test or one-way ANOVA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceTest {
    pub kind: TestKind,
    /// t for Welch, F for ANOVA.
    pub statistic: f64,
    pub p_value: f64,
    pub df: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub df_denominator: Option<f64>,
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

fn split_groups<K: Ord + Clone>(observations: &[(K, f64)]) -> BTreeMap<K, Vec<f64>> {
    let mut groups: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for (group, value) in observations {
        groups.entry(group.clone()).or_default().push(*value);
    }
    groups
}

/// Mean, sample std and count per group, in sorted group order.
pub fn grouped_stats<K: Ord + Clone>(observations: &[(K, f64)]) -> Vec<GroupStats<K>> {
    split_groups(observations)
        .into_iter()
        .map(|(group, values)| GroupStats {
            mean: mean(&values),
            std: (values.len() >= 2).then(|| sample_variance(&values).sqrt()),
            count: values.len(),
            group,
        })
        .collect()
}

/// Welch's unequal-variance t-test, two-sided.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<SignificanceTest, FairseaError> {
    if a.len() < 2 || b.len() < 2 {
        return Err(FairseaError::insufficient(
            "t-test needs at least two observations per group",
        ));
    }
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (va, vb) = (sample_variance(a) / na, sample_variance(b) / nb);
    let se2 = va + vb;
    if se2 <= 0.0 {
        return Err(FairseaError::zero_variance("both groups are constant"));
    }
    let statistic = (mean(a) - mean(b)) / se2.sqrt();
    let df = se2.powi(2) / (va.powi(2) / (na - 1.0) + vb.powi(2) / (nb - 1.0));

    let t = StudentsT::new(0.0, 1.0, df).map_err(|e| FairseaError::invalid_input(e.to_string()))?;
    Ok(SignificanceTest {
        kind: TestKind::WelchT,
        statistic,
        p_value: (2.0 * t.sf(statistic.abs())).min(1.0),
        df,
        df_denominator: None,
    })
}

/// One-way analysis of variance across groups.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Result<SignificanceTest, FairseaError> {
    let k = groups.len();
    if k < 2 || groups.iter().any(|g| g.is_empty()) {
        return Err(FairseaError::insufficient(
            "ANOVA needs at least two non-empty groups",
        ));
    }
    let n: usize = groups.iter().map(Vec::len).sum();
    if n <= k {
        return Err(FairseaError::insufficient("no within-group degrees of freedom"));
    }
    let grand = groups.iter().flatten().sum::<f64>() / n as f64;
    let ss_between: f64 = groups
        .iter()
        .map(|g| g.len() as f64 * (mean(g) - grand).powi(2))
        .sum();
    let ss_within: f64 = groups
        .iter()
        .map(|g| {
            let m = mean(g);
            g.iter().map(|v| (v - m).powi(2)).sum::<f64>()
        })
        .sum();
    if ss_within <= 0.0 {
        return Err(FairseaError::zero_variance("no within-group variation"));
    }

    let (df_b, df_w) = ((k - 1) as f64, (n - k) as f64);
    let statistic = (ss_between / df_b) / (ss_within / df_w);
    let f = FisherSnedecor::new(df_b, df_w)
        .map_err(|e| FairseaError::invalid_input(e.to_string()))?;
    Ok(SignificanceTest {
        kind: TestKind::OneWayAnova,
        statistic,
        p_value: f.sf(statistic),
        df: df_b,
        df_denominator: Some(df_w),
    })
}

/// Welch t-test for exactly two groups (sorted order), one-way ANOVA for more.
pub fn compare_groups<K: Ord + Clone>(
    observations: &[(K, f64)],
) -> Result<SignificanceTest, FairseaError> {
    let groups: Vec<Vec<f64>> = split_groups(observations).into_values().collect();
    match groups.as_slice() {
        [] | [_] => Err(FairseaError::insufficient("fewer than two groups")),
        [a, b] => welch_t_test(a, b),
        _ => one_way_anova(&groups),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouped_stats() {
        let obs = vec![("b", 1.0), ("a", 2.0), ("a", 4.0)];
        let stats = grouped_stats(&obs);
        assert_eq!(stats[0].group, "a");
        assert_eq!(stats[0].mean, 3.0);
        assert!((stats[0].std.unwrap() - 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(stats[1].std, None);
        assert_eq!(stats[1].count, 1);
    }

    #[test]
    fn test_welch_known_values() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [2.0, 4.0, 6.0, 8.0, 10.0];
        let r = welch_t_test(&a, &b).unwrap();
        assert!((r.statistic + 3.0 / 2.5f64.sqrt()).abs() < 1e-12);
        assert!((r.df - 6.25 / 1.0625).abs() < 1e-9);
        assert!(r.p_value > 0.09 && r.p_value < 0.13);
    }

    #[test]
    fn test_welch_constant_groups() {
        let err = welch_t_test(&[1.0, 1.0], &[2.0, 2.0]).unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_anova_known_values() {
        let groups = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
        let r = one_way_anova(&groups).unwrap();
        assert!((r.statistic - 27.0).abs() < 1e-9);
        // F(2, 6) survival: (1 + 2x/6)^-3
        assert!((r.p_value - 0.001).abs() < 1e-9);
        assert_eq!(r.df_denominator, Some(6.0));
    }

    #[test]
    fn test_compare_groups_dispatch() {
        let two = vec![("F", 0.1), ("F", 0.3), ("M", 0.6), ("M", 0.9)];
        assert_eq!(compare_groups(&two).unwrap().kind, TestKind::WelchT);

        let three = vec![("a", 0.1), ("a", 0.2), ("b", 0.5), ("b", 0.4), ("c", 0.9), ("c", 0.7)];
        assert_eq!(compare_groups(&three).unwrap().kind, TestKind::OneWayAnova);

        let one = vec![("a", 0.1), ("a", 0.2)];
        assert!(compare_groups(&one).unwrap_err().is_degenerate());
    }
}
