//! Demographic and intersectional analyzers.

pub mod demographic;
pub mod frame;
pub mod intersectional;
pub mod unit;

pub use demographic::{
    CategoricalAttributeResult, CategoricalDemographics, ContinuousAttributeResult,
    ContinuousDemographics, analyze_categorical, analyze_continuous,
};
pub use frame::{Frame, Grouping, combinations};
pub use intersectional::{
    CategoricalIntersections, CombinationResult, ContinuousIntersections, MixedModelReport,
    MultiwayResult, analyze_categorical_intersections, analyze_continuous_intersections,
};
pub use unit::AnalysisUnit;

use serde::Serialize;

/// Per-attribute results, shaped by the outcome type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DemographicResults {
    Categorical(CategoricalDemographics),
    Continuous(ContinuousDemographics),
}

/// Per-combination results, shaped by the outcome type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IntersectionalResults {
    Categorical(CategoricalIntersections),
    Continuous(ContinuousIntersections),
}
