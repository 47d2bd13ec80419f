//! Deriving the analyzed outcome column from raw model outputs.

use crate::categorize::{SimilarityCategorizer, Taxonomy};
use crate::data::Record;
use crate::error::FairseaError;
use crate::sentiment::SentimentScorer;
use regex::{Regex, RegexBuilder};

/// Derived outcome values, index-aligned with the analyzed records.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Labels(Vec<String>),
    Scores(Vec<f64>),
}

impl Outcome {
    pub fn len(&self) -> usize {
        match self {
            Self::Labels(labels) => labels.len(),
            Self::Scores(scores) => scores.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First case-insensitive match of a fixed phrase list, lowercased, with a
/// fallback label for outputs that match nothing.
#[derive(Debug, Clone)]
pub struct PhraseExtractor {
    pattern: Regex,
    fallback: String,
}

impl PhraseExtractor {
    pub fn new(pattern: &str, fallback: impl Into<String>) -> Result<Self, FairseaError> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| FairseaError::config(format!("invalid extraction pattern: {e}")))?;
        Ok(Self {
            pattern,
            fallback: fallback.into(),
        })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        self.pattern
            .find(text)
            .map(|m| m.as_str().trim().to_lowercase())
    }

    pub fn label(&self, text: &str) -> String {
        self.extract(text).unwrap_or_else(|| self.fallback.clone())
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

const UNKNOWN_DECISION: &str = "Unknown";

/// Standalone yes/no decision anywhere in an output.
#[derive(Debug, Clone)]
pub struct DecisionExtractor {
    pattern: Regex,
}

impl DecisionExtractor {
    pub fn new() -> Result<Self, FairseaError> {
        let pattern = Regex::new(r"(?i)\b(yes|no)\b")
            .map_err(|e| FairseaError::config(format!("invalid decision pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// `Yes`, `No` or `Unknown`.
    pub fn decision(&self, text: &str) -> String {
        match self.pattern.find(text) {
            Some(m) => capitalize(m.as_str()),
            None => UNKNOWN_DECISION.to_string(),
        }
    }

    /// The output with its first yes/no removed.
    pub fn justification(&self, text: &str) -> String {
        self.pattern.replacen(text, 1, "").trim().to_string()
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// How a family turns outputs into its outcome column.
#[derive(Debug, Clone)]
pub enum OutcomeSpec {
    /// Nearest taxonomy anchor by embedding similarity.
    Semantic(Taxonomy),
    /// Compound sentiment of the output.
    Sentiment,
    /// Fixed phrase list with a fallback label.
    Phrase(PhraseExtractor),
    /// Leading yes/no decision.
    Decision(DecisionExtractor),
    /// The (cleaned) output itself.
    RawOutput,
}

impl OutcomeSpec {
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::Sentiment)
    }

    pub fn derive(
        &self,
        records: &[Record],
        categorizer: &SimilarityCategorizer,
        scorer: &dyn SentimentScorer,
    ) -> Result<Outcome, FairseaError> {
        let outputs = records.iter().map(|r| r.llm_output.as_str());
        let outcome = match self {
            Self::Semantic(taxonomy) => {
                let texts: Vec<&str> = outputs.collect();
                Outcome::Labels(categorizer.categorize(&texts, taxonomy)?)
            }
            Self::Sentiment => Outcome::Scores(outputs.map(|t| scorer.score(t)).collect()),
            Self::Phrase(extractor) => Outcome::Labels(outputs.map(|t| extractor.label(t)).collect()),
            Self::Decision(extractor) => {
                Outcome::Labels(outputs.map(|t| extractor.decision(t)).collect())
            }
            Self::RawOutput => Outcome::Labels(outputs.map(str::to_string).collect()),
        };
        Ok(outcome)
    }
}
