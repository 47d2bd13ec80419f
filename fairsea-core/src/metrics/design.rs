//! Treatment-coded factorial design matrices and rank-aware least squares.

use crate::error::FairseaError;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeSet;

/// A categorical predictor coded against its first (sorted) level.
#[derive(Debug, Clone)]
pub struct Factor {
    pub name: String,
    pub levels: Vec<String>,
    codes: Vec<usize>,
}

impl Factor {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        let levels: Vec<String> = values
            .iter()
            .map(|v| v.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let codes = values
            .iter()
            .map(|v| levels.iter().position(|l| l == v).unwrap_or(0))
            .collect();
        Self {
            name: name.into(),
            levels,
            codes,
        }
    }

    /// Number of dummy columns (levels beyond the reference).
    pub fn width(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

/// One model term: a main effect or an interaction of several factors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub factors: Vec<usize>,
}

impl Term {
    /// `self` is marginal to `other` when its factors are a proper subset.
    pub fn contained_in(&self, other: &Term) -> bool {
        self.factors.len() < other.factors.len()
            && self.factors.iter().all(|f| other.factors.contains(f))
    }
}

/// Full-factorial design: intercept plus every non-empty factor subset.
#[derive(Debug, Clone)]
pub struct FactorialDesign {
    factors: Vec<Factor>,
    terms: Vec<Term>,
    n: usize,
}

impl FactorialDesign {
    pub fn new(factors: Vec<Factor>) -> Result<Self, FairseaError> {
        let n = factors.first().map_or(0, |f| f.codes.len());
        if factors.iter().any(|f| f.codes.len() != n) {
            return Err(FairseaError::invalid_input("factors have unequal lengths"));
        }
        if n == 0 {
            return Err(FairseaError::insufficient("no observations"));
        }

        let k = factors.len();
        let mut terms: Vec<Term> = (1u32..(1 << k))
            .map(|mask| Term {
                factors: (0..k).filter(|i| mask & (1 << i) != 0).collect(),
            })
            .collect();
        // main effects first, then two-way, ... each in factor order
        terms.sort_by(|a, b| {
            a.factors
                .len()
                .cmp(&b.factors.len())
                .then_with(|| a.factors.cmp(&b.factors))
        });
        Ok(Self { factors, terms, n })
    }

    pub fn observations(&self) -> usize {
        self.n
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn term_name(&self, term: &Term) -> String {
        term.factors
            .iter()
            .map(|&i| self.factors[i].name.as_str())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Dummy columns and their labels for one term.
    fn term_columns(&self, term: &Term) -> Vec<(String, Vec<f64>)> {
        let mut columns: Vec<(String, Vec<f64>)> = vec![(String::new(), vec![1.0; self.n])];
        for &fi in &term.factors {
            let factor = &self.factors[fi];
            let mut next = Vec::with_capacity(columns.len() * factor.width());
            for (label, values) in &columns {
                for level in 1..factor.levels.len() {
                    let name = format!("{}[T.{}]", factor.name, factor.levels[level]);
                    let label = if label.is_empty() {
                        name
                    } else {
                        format!("{label}:{name}")
                    };
                    let column = values
                        .iter()
                        .zip(&factor.codes)
                        .map(|(v, &c)| if c == level { *v } else { 0.0 })
                        .collect();
                    next.push((label, column));
                }
            }
            columns = next;
        }
        columns
    }

    /// Intercept plus the columns of the selected terms.
    pub fn matrix(&self, include: impl Fn(&Term) -> bool) -> (DMatrix<f64>, Vec<String>) {
        let mut names = vec!["Intercept".to_string()];
        let mut data: Vec<f64> = vec![1.0; self.n];
        for term in self.terms.iter().filter(|t| include(t)) {
            for (name, column) in self.term_columns(term) {
                names.push(name);
                data.extend(column);
            }
        }
        (DMatrix::from_column_slice(self.n, names.len(), &data), names)
    }

    /// Full design reduced to linearly independent columns, kept in order.
    pub fn full_rank_matrix(&self) -> (DMatrix<f64>, Vec<String>) {
        let (x, names) = self.matrix(|_| true);
        let keep = independent_columns(&x);
        let reduced = x.select_columns(&keep);
        let names = keep.iter().map(|&i| names[i].clone()).collect();
        (reduced, names)
    }
}

/// Indices of columns that are not linear combinations of earlier ones
/// (modified Gram-Schmidt with a relative tolerance).
pub fn independent_columns(x: &DMatrix<f64>) -> Vec<usize> {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut keep = Vec::new();
    for j in 0..x.ncols() {
        let original = x.column(j).into_owned();
        let scale = original.norm();
        if scale == 0.0 {
            continue;
        }
        let mut v = original;
        for q in &basis {
            let proj = q.dot(&v);
            v -= q * proj;
        }
        let norm = v.norm();
        if norm > 1e-9 * scale {
            basis.push(v / norm);
            keep.push(j);
        }
    }
    keep
}

/// Least-squares fit summary.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    pub coefficients: DVector<f64>,
    pub rss: f64,
    pub rank: usize,
}

/// Minimum-norm least squares through the SVD; rank-deficient designs are fine.
pub fn least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<LeastSquares, FairseaError> {
    if x.nrows() != y.len() {
        return Err(FairseaError::invalid_input("design and response lengths differ"));
    }
    let svd = x.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    let eps = max_sv * x.nrows().max(x.ncols()) as f64 * f64::EPSILON;
    let rank = svd.rank(eps);
    let coefficients = svd
        .solve(y, eps)
        .map_err(|e| FairseaError::invalid_input(e.to_string()))?;
    let residual = y - x * &coefficients;
    Ok(LeastSquares {
        rss: residual.norm_squared(),
        coefficients,
        rank,
    })
}
