//! Disparity indices: FDI, IDI, JSD and DBI.

use crate::error::FairseaError;
use crate::metrics::contingency::ProportionTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Score attached to one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupScore<K> {
    pub group: K,
    pub value: f64,
}

/// Per-group scores, in table row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupScores<K>(pub Vec<GroupScore<K>>);

impl<K: PartialEq> GroupScores<K> {
    pub fn get(&self, group: &K) -> Option<f64> {
        self.0.iter().find(|s| &s.group == group).map(|s| s.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupScore<K>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fairness Deviation Index: half the L1 distance between each group's
/// distribution and the unweighted mean distribution. Range `[0, 1]`.
pub fn fdi<K: Clone>(table: &ProportionTable<K>) -> GroupScores<K> {
    let mean = table.mean_row();
    GroupScores(
        table
            .rows
            .iter()
            .zip(&table.values)
            .map(|(group, row)| GroupScore {
                group: group.clone(),
                value: 0.5 * row.iter().zip(&mean).map(|(p, m)| (p - m).abs()).sum::<f64>(),
            })
            .collect(),
    )
}

/// Intersectional Disparity Index: FDI over attribute-combination rows.
pub fn idi(table: &ProportionTable<Vec<String>>) -> GroupScores<Vec<String>> {
    fdi(table)
}

/// Jensen-Shannon comparison of one group against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsdScore<K> {
    pub group: K,
    /// Base-2 divergence, in `[0, 1]`.
    pub divergence: f64,
    /// Square root of the divergence.
    pub distance: f64,
}

/// Jensen-Shannon divergence of each group's distribution from the
/// unweighted mean distribution across groups.
pub fn jsd<K: Clone>(table: &ProportionTable<K>) -> Vec<JsdScore<K>> {
    let baseline = table.mean_row();
    table
        .rows
        .iter()
        .zip(&table.values)
        .map(|(group, row)| {
            let divergence = js_divergence(row, &baseline);
            JsdScore {
                group: group.clone(),
                divergence,
                distance: divergence.sqrt(),
            }
        })
        .collect()
}

/// Base-2 Jensen-Shannon divergence. Inputs are renormalized to sum 1;
/// a zero-mass input yields 0.
pub fn js_divergence(p: &[f64], q: &[f64]) -> f64 {
    let sp: f64 = p.iter().sum();
    let sq: f64 = q.iter().sum();
    if sp <= 0.0 || sq <= 0.0 {
        return 0.0;
    }
    let kl = |a: &[f64], sa: f64, m: &[f64]| -> f64 {
        a.iter()
            .zip(m)
            .map(|(x, mi)| {
                let x = x / sa;
                if x > 0.0 { x * (x / mi).log2() } else { 0.0 }
            })
            .sum()
    };
    let m: Vec<f64> = p
        .iter()
        .zip(q)
        .map(|(a, b)| 0.5 * (a / sp + b / sq))
        .collect();
    (0.5 * kl(p, sp, &m) + 0.5 * kl(q, sq, &m)).clamp(0.0, 1.0)
}

/// Directional Bias Index: `(mean(score | g) - mean(score)) / std(score)`
/// with the population standard deviation over every observation.
pub fn dbi<K: Ord + Clone>(observations: &[(K, f64)]) -> Result<GroupScores<K>, FairseaError> {
    if observations.is_empty() {
        return Err(FairseaError::insufficient("no scores"));
    }
    let n = observations.len() as f64;
    let mean = observations.iter().map(|(_, v)| v).sum::<f64>() / n;
    let variance = observations
        .iter()
        .map(|(_, v)| (v - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    if std <= f64::EPSILON * mean.abs().max(1.0) {
        return Err(FairseaError::zero_variance("scores are constant"));
    }

    let mut groups: BTreeMap<&K, (f64, usize)> = BTreeMap::new();
    for (group, value) in observations {
        let entry = groups.entry(group).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    Ok(GroupScores(
        groups
            .into_iter()
            .map(|(group, (sum, count))| GroupScore {
                group: group.clone(),
                value: (sum / count as f64 - mean) / std,
            })
            .collect(),
    ))
}
