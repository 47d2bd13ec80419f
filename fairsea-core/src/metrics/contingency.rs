//! Contingency tables, row proportions and Pearson's chi-square test.

use crate::error::FairseaError;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

/// Count matrix of (group, outcome) co-occurrences.
///
/// Rows and columns hold only the levels that were observed, both in sorted
/// order, so every row and column sum is positive for a non-empty table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContingencyTable<K> {
    pub rows: Vec<K>,
    pub columns: Vec<String>,
    pub counts: Vec<Vec<u64>>,
}

impl<K: Ord + Clone> ContingencyTable<K> {
    /// Cross-tabulate `(group, outcome)` observations.
    pub fn from_observations<S, I>(observations: I) -> Self
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (K, S)>,
    {
        let mut cells: BTreeMap<K, BTreeMap<String, u64>> = BTreeMap::new();
        let mut columns = BTreeSet::new();
        for (group, outcome) in observations {
            let outcome = outcome.as_ref().to_string();
            columns.insert(outcome.clone());
            *cells.entry(group).or_default().entry(outcome).or_insert(0) += 1;
        }
        let columns: Vec<String> = columns.into_iter().collect();
        let (rows, counts) = cells
            .into_iter()
            .map(|(group, row)| {
                let counts = columns
                    .iter()
                    .map(|c| row.get(c).copied().unwrap_or(0))
                    .collect();
                (group, counts)
            })
            .unzip();
        Self {
            rows,
            columns,
            counts,
        }
    }
}

impl<K: Clone> ContingencyTable<K> {
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    pub fn row_sums(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn column_sums(&self) -> Vec<u64> {
        (0..self.columns.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum())
            .collect()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// Divide each row by its sum. Fails on an empty row.
    pub fn normalized(&self) -> Result<ProportionTable<K>, FairseaError> {
        let values = self
            .counts
            .iter()
            .zip(self.row_sums())
            .enumerate()
            .map(|(i, (row, sum))| {
                if sum == 0 {
                    return Err(FairseaError::degenerate(format!("row {i} sums to zero")));
                }
                Ok(row.iter().map(|&c| c as f64 / sum as f64).collect())
            })
            .collect::<Result<Vec<Vec<f64>>, _>>()?;
        Ok(ProportionTable {
            rows: self.rows.clone(),
            columns: self.columns.clone(),
            values,
        })
    }

    /// Pearson chi-square test of independence.
    ///
    /// Expected counts are `row_sum * col_sum / total`. With one degree of
    /// freedom and `yates` set, each observed count moves toward its expected
    /// count by at most 0.5.
    ///
    /// A single row or column has no degrees of freedom: the observed counts
    /// equal their expectations, so the statistic is 0 with p = 1.
    pub fn chi_square(&self, yates: bool) -> Result<ChiSquareResult, FairseaError> {
        let (r, c) = self.shape();
        let total = self.total();
        if r == 0 || c == 0 || total == 0 {
            return Err(FairseaError::degenerate(format!("table is empty ({r}x{c})")));
        }
        let row_sums = self.row_sums();
        let col_sums = self.column_sums();
        if row_sums.contains(&0) || col_sums.contains(&0) {
            return Err(FairseaError::degenerate("a row or column sums to zero"));
        }

        let dof = (r - 1) * (c - 1);
        let correct = yates && dof == 1;
        let mut statistic = 0.0;
        let mut expected = vec![vec![0.0; c]; r];
        for i in 0..r {
            for j in 0..c {
                let e = row_sums[i] as f64 * col_sums[j] as f64 / total as f64;
                let mut o = self.counts[i][j] as f64;
                if correct {
                    let diff = e - o;
                    o += diff.signum() * diff.abs().min(0.5);
                }
                statistic += (o - e).powi(2) / e;
                expected[i][j] = e;
            }
        }

        let p_value = if dof == 0 {
            1.0
        } else {
            ChiSquared::new(dof as f64)
                .map_err(|e| FairseaError::invalid_input(e.to_string()))?
                .sf(statistic)
        };
        Ok(ChiSquareResult {
            statistic,
            p_value,
            dof,
            expected,
            yates_corrected: correct,
        })
    }
}

/// Outcome of a chi-square independence test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    pub expected: Vec<Vec<f64>>,
    pub yates_corrected: bool,
}

/// Row-normalized contingency table: each row is a distribution over outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProportionTable<K> {
    pub rows: Vec<K>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl<K> ProportionTable<K> {
    /// Outcome distribution averaged uniformly across group rows.
    pub fn mean_row(&self) -> Vec<f64> {
        let n = self.values.len().max(1) as f64;
        (0..self.columns.len())
            .map(|j| self.values.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect()
    }

    pub fn row(&self, group: &K) -> Option<&[f64]>
    where
        K: PartialEq,
    {
        self.rows
            .iter()
            .position(|g| g == group)
            .map(|i| self.values[i].as_slice())
    }
}
