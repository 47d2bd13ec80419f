//! Fairness index library: contingency tests, disparity indices and
//! variance models.

pub mod anova;
pub mod contingency;
pub mod design;
pub mod indices;
pub mod mixed;
pub mod significance;

pub use anova::{AnovaRow, AnovaTable, factorial_anova};
pub use contingency::{ChiSquareResult, ContingencyTable, ProportionTable};
pub use design::{Factor, FactorialDesign};
pub use indices::{GroupScore, GroupScores, JsdScore, dbi, fdi, idi, js_divergence, jsd};
pub use mixed::{FixedEffect, MixedModelFit, fit_random_intercept};
pub use significance::{
    GroupStats, SignificanceTest, TestKind, compare_groups, grouped_stats, one_way_anova,
    welch_t_test,
};
