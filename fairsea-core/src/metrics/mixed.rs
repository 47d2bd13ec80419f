//! Random-intercept linear mixed model fitted by restricted maximum likelihood.
//!
//! Model: `y = X b + u[group] + e`, `u ~ N(0, g * s2)`, `e ~ N(0, s2)`.
//! Within a group of size `n`, the inverse covariance (in units of `s2`) is
//! `I - c 11'` with `c = g / (1 + n g)`, so every quantity the likelihood
//! needs reduces to per-group sums. `s2` is profiled out and the variance
//! ratio `g` is optimized on a log scale by golden-section search, with the
//! boundary `g = 0` checked separately.

use crate::error::FairseaError;
use nalgebra::{DMatrix, DVector, linalg::Cholesky};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;
use std::fmt;

const LOG_RATIO_BOUNDS: (f64, f64) = (-15.0, 10.0);
const SEARCH_TOLERANCE: f64 = 1e-8;
const MAX_ITERATIONS: usize = 200;

/// One fixed-effect coefficient with its Wald test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedEffect {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z: f64,
    pub p_value: f64,
}

/// Fitted random-intercept model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixedModelFit {
    pub dependent: String,
    pub group_column: String,
    pub fixed_effects: Vec<FixedEffect>,
    /// Variance of the random intercept.
    pub group_variance: f64,
    /// Residual variance.
    pub scale: f64,
    pub log_likelihood: f64,
    pub observations: usize,
    pub groups: usize,
    pub min_group_size: usize,
    pub max_group_size: usize,
    pub converged: bool,
}

struct Sufficient {
    xtx: DMatrix<f64>,
    xty: DVector<f64>,
    yty: f64,
    // per group: size, column sums of X, sum of y
    groups: Vec<(f64, DVector<f64>, f64)>,
    n: usize,
    p: usize,
}

struct Profile {
    log_likelihood: f64,
    beta: DVector<f64>,
    covariance_unscaled: DMatrix<f64>,
    scale: f64,
}

impl Sufficient {
    fn new(x: &DMatrix<f64>, y: &DVector<f64>, membership: &[usize], n_groups: usize) -> Self {
        let p = x.ncols();
        let mut groups = vec![(0.0, DVector::zeros(p), 0.0); n_groups];
        for (i, &g) in membership.iter().enumerate() {
            let entry = &mut groups[g];
            entry.0 += 1.0;
            entry.1 += x.row(i).transpose();
            entry.2 += y[i];
        }
        Self {
            xtx: x.transpose() * x,
            xty: x.transpose() * y,
            yty: y.dot(y),
            groups,
            n: x.nrows(),
            p,
        }
    }

    fn profile(&self, ratio: f64) -> Option<Profile> {
        let mut a = self.xtx.clone();
        let mut b = self.xty.clone();
        let mut ywy = self.yty;
        let mut log_det_v = 0.0;
        for (size, sx, sy) in &self.groups {
            let c = ratio / (1.0 + size * ratio);
            a -= sx * sx.transpose() * c;
            b -= sx * (c * sy);
            ywy -= c * sy * sy;
            log_det_v += (1.0 + size * ratio).ln();
        }

        let chol = Cholesky::new(a)?;
        let beta = chol.solve(&b);
        let rwr = ywy - b.dot(&beta);
        let dof = (self.n - self.p) as f64;
        let scale = rwr / dof;
        if scale.is_nan() || scale <= 0.0 {
            return None;
        }
        let log_det_a: f64 = 2.0 * chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();
        let log_likelihood = -0.5
            * (dof * scale.ln()
                + log_det_v
                + log_det_a
                + dof * (1.0 + (2.0 * std::f64::consts::PI).ln()));
        Some(Profile {
            log_likelihood,
            covariance_unscaled: chol.inverse(),
            beta,
            scale,
        })
    }
}

/// Maximize `f` on `[lo, hi]`; the flag reports whether the bracket
/// shrank below tolerance.
fn golden_section(f: impl Fn(f64) -> f64, lo: f64, hi: f64) -> (f64, bool) {
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let (mut a, mut b) = (lo, hi);
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let (mut fc, mut fd) = (f(c), f(d));
    for _ in 0..MAX_ITERATIONS {
        if (b - a).abs() < SEARCH_TOLERANCE {
            return ((a + b) / 2.0, true);
        }
        if fc > fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = f(d);
        }
    }
    ((a + b) / 2.0, (b - a).abs() < SEARCH_TOLERANCE)
}

/// Fit `response ~ design` with a random intercept per `groups` value.
///
/// `design` must have full column rank.
pub fn fit_random_intercept(
    design: &DMatrix<f64>,
    names: &[String],
    response: &[f64],
    groups: &[&str],
    dependent: &str,
    group_column: &str,
) -> Result<MixedModelFit, FairseaError> {
    let n = response.len();
    if design.nrows() != n || groups.len() != n || names.len() != design.ncols() {
        return Err(FairseaError::invalid_input("mixed model inputs have mismatched sizes"));
    }
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for g in groups {
        let next = index.len();
        index.entry(*g).or_insert(next);
    }
    if index.len() < 2 {
        return Err(FairseaError::insufficient("mixed model needs at least two groups"));
    }
    if n <= design.ncols() {
        return Err(FairseaError::insufficient(
            "mixed model has no residual degrees of freedom",
        ));
    }

    let membership: Vec<usize> = groups.iter().map(|g| index[g]).collect();
    let y = DVector::from_column_slice(response);
    let stats = Sufficient::new(design, &y, &membership, index.len());

    let objective = |log_ratio: f64| {
        stats
            .profile(log_ratio.exp())
            .map_or(f64::NEG_INFINITY, |p| p.log_likelihood)
    };
    let (best_log, converged) = golden_section(objective, LOG_RATIO_BOUNDS.0, LOG_RATIO_BOUNDS.1);

    let interior = stats.profile(best_log.exp()).map(|p| (best_log.exp(), p));
    let boundary = stats.profile(0.0).map(|p| (0.0, p));
    let (ratio, profile) = match (interior, boundary) {
        (Some(i), Some(b)) => {
            if b.1.log_likelihood >= i.1.log_likelihood { b } else { i }
        }
        (Some(i), None) => i,
        (None, Some(b)) => b,
        (None, None) => {
            return Err(FairseaError::insufficient(
                "mixed model covariance is singular",
            ));
        }
    };

    let normal = Normal::new(0.0, 1.0).map_err(|e| FairseaError::invalid_input(e.to_string()))?;
    let fixed_effects = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let estimate = profile.beta[j];
            let std_error = (profile.scale * profile.covariance_unscaled[(j, j)]).sqrt();
            let z = estimate / std_error;
            FixedEffect {
                name: name.clone(),
                estimate,
                std_error,
                z,
                p_value: 2.0 * normal.sf(z.abs()),
            }
        })
        .collect();

    let sizes: Vec<usize> = stats.groups.iter().map(|(s, _, _)| *s as usize).collect();
    Ok(MixedModelFit {
        dependent: dependent.to_string(),
        group_column: group_column.to_string(),
        fixed_effects,
        group_variance: ratio * profile.scale,
        scale: profile.scale,
        log_likelihood: profile.log_likelihood,
        observations: n,
        groups: sizes.len(),
        min_group_size: sizes.iter().copied().min().unwrap_or(0),
        max_group_size: sizes.iter().copied().max().unwrap_or(0),
        converged,
    })
}

impl fmt::Display for MixedModelFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .fixed_effects
            .iter()
            .map(|e| e.name.len())
            .chain(["Group Var".len()])
            .max()
            .unwrap_or(9);
        writeln!(f, "Mixed Linear Model Regression Results")?;
        writeln!(f, "{}", "=".repeat(width + 44))?;
        writeln!(f, "Model:            MixedLM   Dependent Variable: {}", self.dependent)?;
        writeln!(f, "No. Observations: {:<9} Method:             REML", self.observations)?;
        writeln!(f, "No. Groups:       {:<9} Scale:              {:.4}", self.groups, self.scale)?;
        writeln!(
            f,
            "Min. group size:  {:<9} Log-Likelihood:     {:.4}",
            self.min_group_size, self.log_likelihood
        )?;
        writeln!(
            f,
            "Max. group size:  {:<9} Converged:          {}",
            self.max_group_size,
            if self.converged { "Yes" } else { "No" }
        )?;
        writeln!(f, "{}", "-".repeat(width + 44))?;
        writeln!(f, "{:<width$} {:>10} {:>10} {:>10} {:>10}", "", "Coef.", "Std.Err.", "z", "P>|z|")?;
        for e in &self.fixed_effects {
            writeln!(
                f,
                "{:<width$} {:>10.4} {:>10.4} {:>10.3} {:>10.3}",
                e.name, e.estimate, e.std_error, e.z, e.p_value
            )?;
        }
        writeln!(f, "{:<width$} {:>10.4}", "Group Var", self.group_variance)?;
        write!(f, "{}", "=".repeat(width + 44))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intercept_only(n: usize) -> (DMatrix<f64>, Vec<String>) {
        (DMatrix::from_element(n, 1, 1.0), vec!["Intercept".to_string()])
    }

    #[test]
    fn test_golden_section_finds_maximum() {
        let (x, converged) = golden_section(|v| -(v - 1.5).powi(2), -5.0, 5.0);
        assert!(converged);
        assert!((x - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_strong_group_effect() {
        let offsets = [-1.0, 0.0, 1.0, 2.0];
        let noise = [-0.1, 0.1, -0.05, 0.05];
        let mut y = Vec::new();
        let mut groups = Vec::new();
        let labels = ["m1", "m2", "m3", "m4"];
        for (g, offset) in offsets.iter().enumerate() {
            for e in noise {
                y.push(offset + e);
                groups.push(labels[g]);
            }
        }
        let (x, names) = intercept_only(y.len());
        let fit = fit_random_intercept(&x, &names, &y, &groups, "score", "model").unwrap();
        assert_eq!(fit.groups, 4);
        assert_eq!(fit.min_group_size, 4);
        assert!((fit.fixed_effects[0].estimate - 0.5).abs() < 1e-9);
        assert!(fit.group_variance > 0.5);
        assert!(fit.scale < 0.05);
        assert!(fit.converged);
    }

    #[test]
    fn test_no_group_effect_hits_boundary() {
        // every group has mean zero
        let y = vec![-1.0, 1.0, -0.5, 0.5, -2.0, 2.0, -1.5, 1.5];
        let groups = vec!["a", "a", "b", "b", "c", "c", "d", "d"];
        let (x, names) = intercept_only(y.len());
        let fit = fit_random_intercept(&x, &names, &y, &groups, "score", "model").unwrap();
        assert!(fit.group_variance < 1e-4);
        assert!(fit.scale > 1.0);
    }

    #[test]
    fn test_single_group_is_insufficient() {
        let y = vec![0.1, 0.2, 0.3];
        let (x, names) = intercept_only(3);
        let err = fit_random_intercept(&x, &names, &y, &["a", "a", "a"], "score", "model")
            .unwrap_err();
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_summary_rendering() {
        let y = vec![0.0, 0.2, 1.0, 1.3, 2.1, 1.9];
        let groups = vec!["a", "a", "b", "b", "c", "c"];
        let (x, names) = intercept_only(y.len());
        let fit = fit_random_intercept(&x, &names, &y, &groups, "sentiment_score", "model")
            .unwrap();
        let text = fit.to_string();
        assert!(text.contains("Mixed Linear Model Regression Results"));
        assert!(text.contains("Dependent Variable: sentiment_score"));
        assert!(text.contains("Group Var"));
        assert!(text.contains("Intercept"));
    }
}
