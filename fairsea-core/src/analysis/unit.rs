//! Per-unit outcome of an analysis: computed, or skipped on degenerate data.

use crate::error::FairseaError;
use serde::Serialize;

/// One attribute's or one combination's analysis.
///
/// Serializes as `{"status": "computed", "result": ...}` or
/// `{"status": "skipped", "result": {"reason": ...}}` so that every key of the
/// bundle is present even when its unit could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum AnalysisUnit<T> {
    Computed(T),
    Skipped { reason: String },
}

impl<T> AnalysisUnit<T> {
    /// Turn degenerate-data errors into a skipped unit; anything else propagates.
    pub fn capture(result: Result<T, FairseaError>, unit: &str) -> Result<Self, FairseaError> {
        match result {
            Ok(value) => {
                tracing::debug!(unit, "Analysis unit computed");
                Ok(Self::Computed(value))
            }
            Err(e) if e.is_degenerate() => {
                tracing::warn!(unit, reason = %e, "Analysis unit skipped");
                Ok(Self::Skipped {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn computed(&self) -> Option<&T> {
        match self {
            Self::Computed(value) => Some(value),
            Self::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}
