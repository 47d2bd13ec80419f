//! Analysis over attribute combinations.

use crate::analysis::frame::{Frame, Grouping, combinations};
use crate::analysis::unit::AnalysisUnit;
use crate::data::DemographicAttribute;
use crate::error::FairseaError;
use crate::metrics::{
    AnovaTable, ContingencyTable, Factor, FactorialDesign, GroupScores, MixedModelFit,
    ProportionTable, dbi, factorial_anova, fdi, fit_random_intercept, idi,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Chi-square and FDI of one combination column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationResult {
    #[serde(rename = "ct")]
    pub table: ContingencyTable<String>,
    #[serde(rename = "ct_pct")]
    pub proportions: ProportionTable<String>,
    pub chi2: f64,
    pub p: f64,
    pub dof: usize,
    pub fdi: GroupScores<String>,
}

/// Chi-square on the table keyed by the full attribute tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiwayResult {
    #[serde(rename = "ct")]
    pub table: ContingencyTable<Vec<String>>,
    pub chi2: f64,
    pub p: f64,
    pub dof: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalIntersections {
    /// Keyed by combination name (`Gender_Race`, ..., `Gender_Race_Nat`).
    #[serde(flatten)]
    pub combinations: BTreeMap<String, AnalysisUnit<CombinationResult>>,
    pub multiway: AnalysisUnit<MultiwayResult>,
    pub idi_all: GroupScores<Vec<String>>,
}

/// Random-intercept fit plus its rendered summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixedModelReport {
    pub fit: MixedModelFit,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinuousIntersections {
    pub anova_table: AnalysisUnit<AnovaTable>,
    /// Present only when every record names its model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixedlm_summary: Option<AnalysisUnit<MixedModelReport>>,
    pub dbi_intersection: AnalysisUnit<GroupScores<String>>,
}

fn combination_result<T: AsRef<str>>(
    frame: &Frame<'_, T>,
    grouping: &Grouping,
    yates: bool,
) -> Result<CombinationResult, FairseaError> {
    let table = frame.table(grouping);
    let chi = table.chi_square(yates)?;
    let proportions = table.normalized()?;
    Ok(CombinationResult {
        fdi: fdi(&proportions),
        chi2: chi.statistic,
        p: chi.p_value,
        dof: chi.dof,
        proportions,
        table,
    })
}

fn multiway_result<T: AsRef<str>>(
    frame: &Frame<'_, T>,
    grouping: &Grouping,
    yates: bool,
) -> Result<MultiwayResult, FairseaError> {
    let table = frame.tuple_table(grouping);
    let chi = table.chi_square(yates)?;
    Ok(MultiwayResult {
        chi2: chi.statistic,
        p: chi.p_value,
        dof: chi.dof,
        table,
    })
}

/// Every pairwise combination plus the full cross, the tuple-keyed multiway
/// table and the aggregate IDI. Degenerate combinations are flagged and the
/// rest are still computed.
pub fn analyze_categorical_intersections<T: AsRef<str>>(
    frame: &Frame<'_, T>,
    attributes: &[DemographicAttribute],
    yates: bool,
) -> Result<CategoricalIntersections, FairseaError> {
    let mut results = BTreeMap::new();
    for grouping in combinations(attributes) {
        let name = grouping.name();
        let unit = AnalysisUnit::capture(combination_result(frame, &grouping, yates), &name)?;
        results.insert(name, unit);
    }

    let full = Grouping::Combination(sorted(attributes));
    let multiway = AnalysisUnit::capture(multiway_result(frame, &full, yates), "multiway")?;
    let idi_all = idi(&frame.tuple_table(&full).normalized()?);

    Ok(CategoricalIntersections {
        combinations: results,
        multiway,
        idi_all,
    })
}

fn sorted(attributes: &[DemographicAttribute]) -> Vec<DemographicAttribute> {
    let mut attrs = attributes.to_vec();
    attrs.sort();
    attrs.dedup();
    attrs
}

fn design_for(
    frame: &Frame<'_, f64>,
    attributes: &[DemographicAttribute],
) -> Result<FactorialDesign, FairseaError> {
    let factors = attributes
        .iter()
        .map(|attr| {
            let values: Vec<&str> = frame.records.iter().map(|r| attr.value(r)).collect();
            Factor::new(attr.column(), &values)
        })
        .collect();
    FactorialDesign::new(factors)
}

fn mixed_model_report(
    frame: &Frame<'_, f64>,
    design: &FactorialDesign,
    models: &[&str],
) -> Result<MixedModelReport, FairseaError> {
    let (x, names) = design.full_rank_matrix();
    let fit = fit_random_intercept(&x, &names, frame.outcome, models, frame.outcome_name, "model")?;
    Ok(MixedModelReport {
        summary: fit.to_string(),
        fit,
    })
}

/// Model ids when every record carries one and at least two are distinct.
fn model_ids<'a>(frame: &Frame<'a, f64>) -> Option<Vec<&'a str>> {
    let ids: Vec<&str> = frame
        .records
        .iter()
        .map(|r| r.model.as_deref())
        .collect::<Option<Vec<_>>>()?;
    let distinct: BTreeSet<&str> = ids.iter().copied().collect();
    (distinct.len() >= 2).then_some(ids)
}

/// Full-factorial ANOVA, the optional random-intercept model and the DBI of
/// the full attribute combination.
pub fn analyze_continuous_intersections(
    frame: &Frame<'_, f64>,
    attributes: &[DemographicAttribute],
    mixed_model: bool,
) -> Result<ContinuousIntersections, FairseaError> {
    let attrs = sorted(attributes);
    let design = design_for(frame, &attrs);

    let anova_table = AnalysisUnit::capture(
        design
            .as_ref()
            .map_err(|e| FairseaError::insufficient(e.to_string()))
            .and_then(|d| factorial_anova(d, frame.outcome)),
        "anova_table",
    )?;

    let mixedlm_summary = match (mixed_model, model_ids(frame), design.as_ref()) {
        (true, Some(models), Ok(design)) => Some(AnalysisUnit::capture(
            mixed_model_report(frame, design, &models),
            "mixedlm_summary",
        )?),
        _ => None,
    };

    let full = Grouping::Combination(attrs);
    let dbi_intersection =
        AnalysisUnit::capture(dbi(&frame.scores(&full)), "dbi_intersection")?;

    Ok(ContinuousIntersections {
        anova_table,
        mixedlm_summary,
        dbi_intersection,
    })
}
