//! Full-factorial analysis of variance with Type II sums of squares.

use crate::error::FairseaError;
use crate::metrics::design::{FactorialDesign, Term, least_squares};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnovaRow {
    pub term: String,
    pub sum_sq: f64,
    pub df: f64,
    /// Absent for the residual row and for fully aliased terms.
    pub f_statistic: Option<f64>,
    pub p_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnovaTable {
    pub rows: Vec<AnovaRow>,
}

impl AnovaTable {
    pub fn row(&self, term: &str) -> Option<&AnovaRow> {
        self.rows.iter().find(|r| r.term == term)
    }
}

/// Fit every main effect and interaction of `design` to `response`.
///
/// Each term's sum of squares is the drop in residual sum of squares when the
/// term is added to the model holding every term that does not contain it.
/// Empty cells lower a term's degrees of freedom through the design rank.
pub fn factorial_anova(
    design: &FactorialDesign,
    response: &[f64],
) -> Result<AnovaTable, FairseaError> {
    if response.len() != design.observations() {
        return Err(FairseaError::invalid_input(
            "response length does not match design",
        ));
    }
    let y = DVector::from_column_slice(response);
    let (x_full, _) = design.matrix(|_| true);
    let full = least_squares(&x_full, &y)?;

    let df_resid = response.len().saturating_sub(full.rank);
    if df_resid == 0 {
        return Err(FairseaError::insufficient(
            "no residual degrees of freedom for factorial ANOVA",
        ));
    }
    let mean_sq_resid = full.rss / df_resid as f64;
    if mean_sq_resid <= f64::EPSILON {
        return Err(FairseaError::zero_variance("no residual variation"));
    }

    let mut rows = Vec::with_capacity(design.terms().len() + 1);
    for term in design.terms() {
        let covers = |t: &Term| t == term || term.contained_in(t);
        let (x_reduced, _) = design.matrix(|t| !covers(t));
        let (x_with, _) = design.matrix(|t| !covers(t) || t == term);
        let reduced = least_squares(&x_reduced, &y)?;
        let with = least_squares(&x_with, &y)?;

        let df = with.rank.saturating_sub(reduced.rank);
        let sum_sq = (reduced.rss - with.rss).max(0.0);
        let (f_statistic, p_value) = if df > 0 {
            let f = (sum_sq / df as f64) / mean_sq_resid;
            let dist = FisherSnedecor::new(df as f64, df_resid as f64)
                .map_err(|e| FairseaError::invalid_input(e.to_string()))?;
            (Some(f), Some(dist.sf(f)))
        } else {
            (None, None)
        };
        rows.push(AnovaRow {
            term: design.term_name(term),
            sum_sq,
            df: df as f64,
            f_statistic,
            p_value,
        });
    }
    rows.push(AnovaRow {
        term: "Residual".to_string(),
        sum_sq: full.rss,
        df: df_resid as f64,
        f_statistic: None,
        p_value: None,
    });
    Ok(AnovaTable { rows })
}
