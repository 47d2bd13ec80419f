//! Domain pipelines: one per prompt family.
//!
//! A pipeline selects its family's records, derives the outcome column,
//! runs the demographic and intersectional analyzers in the matching mode and
//! attaches family-specific extras (reference comparison, sentiment summary).

pub mod families;
pub mod outcome;

pub use families::{FamilyDefinition, definition};
pub use outcome::{DecisionExtractor, Outcome, OutcomeSpec, PhraseExtractor};

use crate::analysis::{
    DemographicResults, Frame, IntersectionalResults, analyze_categorical,
    analyze_categorical_intersections, analyze_continuous, analyze_continuous_intersections,
};
use crate::categorize::SimilarityCategorizer;
use crate::config::{AnalysisConfig, FairseaConfig};
use crate::data::{DemographicAttribute, Record};
use crate::embeddings::{Embedder, create_embedder};
use crate::error::{FairseaError, FetchError};
use crate::reference::{
    Comparison, ComparisonRow, DataGovSgSource, DisabledReferenceSource, ReferenceSource,
    ReferenceTable, ShareMatrix, compare,
};
use crate::sentiment::{SentimentScorer, create_scorer};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Prompt family, identified by the prefix of `prompt_id_full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PromptFamily {
    D1,
    D2,
    D3,
    D4,
    I1,
    I2,
    I3,
    I4,
}

impl PromptFamily {
    pub const ALL: [PromptFamily; 8] = [
        Self::D1,
        Self::D2,
        Self::D3,
        Self::D4,
        Self::I1,
        Self::I2,
        Self::I3,
        Self::I4,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::D1 => "D1",
            Self::D2 => "D2",
            Self::D3 => "D3",
            Self::D4 => "D4",
            Self::I1 => "I1",
            Self::I2 => "I2",
            Self::I3 => "I3",
            Self::I4 => "I4",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::D1 => "Leadership critique, semantic category",
            Self::D2 => "Description sentiment, continuous",
            Self::D3 => "Direct answer, raw output",
            Self::D4 => "Family reaction, semantic category",
            Self::I1 => "Occupation group, with reference comparison",
            Self::I2 => "Industry, with reference comparison",
            Self::I3 => "Yes/no decision, with justification sentiment",
            Self::I4 => "Appearance critique, semantic category",
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        record.family_prefix() == self.code()
    }
}

impl fmt::Display for PromptFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PromptFamily {
    type Err = FairseaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|f| f.code() == code)
            .ok_or_else(|| FairseaError::UnknownFamily(s.trim().to_string()))
    }
}

/// Prefixes found in a dataset, split into registered families and the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamilyDiscovery {
    pub known: Vec<PromptFamily>,
    pub unknown: Vec<String>,
}

/// Distinct `prompt_id_full` prefixes, sorted.
pub fn discover_families(records: &[Record]) -> FamilyDiscovery {
    let prefixes: BTreeSet<&str> = records
        .iter()
        .map(Record::family_prefix)
        .filter(|p| !p.is_empty())
        .collect();
    let mut discovery = FamilyDiscovery::default();
    for prefix in prefixes {
        match prefix.parse::<PromptFamily>() {
            Ok(family) if family.code() == prefix => discovery.known.push(family),
            _ => discovery.unknown.push(prefix.to_string()),
        }
    }
    discovery
}

/// Reference comparison extras. All four fields are `None` when the
/// reference statistics could not be obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceComparison {
    pub ground_truth: Option<ReferenceTable>,
    pub comparison: Option<Vec<ComparisonRow>>,
    pub comparison_fig_male: Option<ShareMatrix>,
    pub comparison_fig_female: Option<ShareMatrix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_error: Option<String>,
}

impl ReferenceComparison {
    pub fn available(table: ReferenceTable, comparison: Comparison) -> Self {
        Self {
            ground_truth: Some(table),
            comparison: Some(comparison.rows),
            comparison_fig_male: Some(comparison.male),
            comparison_fig_female: Some(comparison.female),
            reference_error: None,
        }
    }

    pub fn unavailable(error: &FetchError) -> Self {
        Self {
            ground_truth: None,
            comparison: None,
            comparison_fig_male: None,
            comparison_fig_female: None,
            reference_error: Some(error.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.comparison.is_some()
    }
}

/// Mean justification sentiment of one Gender x Race cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentCell {
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Race")]
    pub race: String,
    pub sentiment_score: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BundleExtras {
    #[serde(flatten)]
    pub reference: Option<ReferenceComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment_summary: Option<Vec<SentimentCell>>,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisBundle {
    #[serde(skip)]
    pub family: PromptFamily,
    #[serde(skip)]
    pub records: usize,
    pub is_continuous: bool,
    pub demographic: DemographicResults,
    pub intersectional: IntersectionalResults,
    #[serde(flatten)]
    pub extras: BundleExtras,
}

/// One preview row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRow {
    pub prompt_text: String,
    pub llm_output: String,
}

/// Result of one family within [`PipelineRegistry::run_all`].
pub type FamilyOutcome = Result<AnalysisBundle, FairseaError>;

/// Upper bound on preview rows.
pub const SAMPLE_LIMIT: usize = 5;

/// A runnable analysis for one prompt family.
pub trait DomainPipeline: Send + Sync {
    fn family(&self) -> PromptFamily;

    /// Analyze the family's records. Degenerate units are flagged inside the
    /// bundle; configuration and embedding failures abort the run.
    fn run(&self, records: &[Record]) -> Result<AnalysisBundle, FairseaError>;

    /// Deterministic preview of at most `sample_size` (capped at
    /// [`SAMPLE_LIMIT`]) of the family's records.
    fn sample(&self, records: &[Record]) -> Vec<SampleRow>;
}

/// Collaborators shared by every pipeline.
#[derive(Clone)]
pub struct PipelineContext {
    pub categorizer: SimilarityCategorizer,
    pub scorer: Arc<dyn SentimentScorer>,
    pub reference: Arc<dyn ReferenceSource>,
    pub analysis: AnalysisConfig,
}

impl PipelineContext {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        scorer: Arc<dyn SentimentScorer>,
        reference: Arc<dyn ReferenceSource>,
        analysis: AnalysisConfig,
    ) -> Self {
        Self {
            categorizer: SimilarityCategorizer::new(embedder, batch_size),
            scorer,
            reference,
            analysis,
        }
    }

    pub fn from_config(config: &FairseaConfig) -> Result<Self, FairseaError> {
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        let scorer = create_scorer(&config.sentiment);
        let reference: Arc<dyn ReferenceSource> = if config.reference.enabled {
            match DataGovSgSource::new(config.reference.clone()) {
                Ok(source) => Arc::new(source),
                Err(e) => {
                    tracing::warn!(error = %e, "Reference client unavailable, comparisons disabled");
                    Arc::new(DisabledReferenceSource)
                }
            }
        } else {
            Arc::new(DisabledReferenceSource)
        };
        tracing::debug!(
            embedder = embedder.provider_name(),
            reference = config.reference.enabled,
            "Pipeline context ready"
        );
        Ok(Self::new(
            embedder,
            config.embedding.batch_size,
            scorer,
            reference,
            config.analysis.clone(),
        ))
    }
}

/// Pipeline driven by a [`FamilyDefinition`].
pub struct FamilyPipeline {
    definition: FamilyDefinition,
    context: Arc<PipelineContext>,
}

impl FamilyPipeline {
    pub fn new(definition: FamilyDefinition, context: Arc<PipelineContext>) -> Self {
        Self {
            definition,
            context,
        }
    }

    pub fn definition(&self) -> &FamilyDefinition {
        &self.definition
    }

    fn select(&self, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .filter(|r| self.definition.family.matches(r))
            .cloned()
            .collect()
    }

    fn check_attributes(&self, records: &[Record]) -> Result<(), FairseaError> {
        let attributes = &self.context.analysis.attributes;
        if attributes.is_empty() {
            return Err(FairseaError::config("no demographic attributes configured"));
        }
        for (row, record) in records.iter().enumerate() {
            if let Some(attr) = attributes.iter().find(|a| a.value(record).trim().is_empty()) {
                return Err(FairseaError::MissingValue {
                    column: attr.column().to_string(),
                    row,
                });
            }
        }
        Ok(())
    }

    fn reference_comparison(
        &self,
        records: &[Record],
        labels: &[String],
    ) -> Result<Option<ReferenceComparison>, FairseaError> {
        let Some((topic, remap)) = &self.definition.reference else {
            return Ok(None);
        };
        let extras = match self.context.reference.fetch(*topic) {
            Ok(table) => {
                let comparison = compare(records, labels, remap, &table)?;
                ReferenceComparison::available(table, comparison)
            }
            Err(e) => {
                tracing::warn!(
                    family = %self.definition.family,
                    topic = %topic,
                    error = %e,
                    "Reference statistics unavailable"
                );
                ReferenceComparison::unavailable(&e)
            }
        };
        Ok(Some(extras))
    }

    fn sentiment_summary(&self, records: &[Record]) -> Result<Vec<SentimentCell>, FairseaError> {
        let OutcomeSpec::Decision(extractor) = &self.definition.outcome else {
            return Err(FairseaError::config(format!(
                "{} has no decision outcome for a sentiment summary",
                self.definition.family
            )));
        };
        let mut cells: BTreeMap<(&str, &str), (f64, usize)> = BTreeMap::new();
        for record in records {
            let score = self
                .context
                .scorer
                .score(&extractor.justification(&record.llm_output));
            let cell = cells
                .entry((
                    DemographicAttribute::Gender.value(record),
                    DemographicAttribute::Race.value(record),
                ))
                .or_insert((0.0, 0));
            cell.0 += score;
            cell.1 += 1;
        }
        Ok(cells
            .into_iter()
            .map(|((gender, race), (sum, count))| SentimentCell {
                gender: gender.to_string(),
                race: race.to_string(),
                sentiment_score: sum / count as f64,
                count,
            })
            .collect())
    }
}

impl DomainPipeline for FamilyPipeline {
    fn family(&self) -> PromptFamily {
        self.definition.family
    }

    fn run(&self, records: &[Record]) -> Result<AnalysisBundle, FairseaError> {
        let family = self.definition.family;
        let records = self.select(records);
        if records.is_empty() {
            return Err(FairseaError::insufficient(format!("no {family} records")));
        }
        self.check_attributes(&records)?;

        let outcome_column = self.definition.outcome_column;
        tracing::info!(
            family = %family,
            records = records.len(),
            outcome = outcome_column,
            "Running pipeline"
        );

        let analysis = &self.context.analysis;
        let attributes = &analysis.attributes;
        let outcome = self.definition.outcome.derive(
            &records,
            &self.context.categorizer,
            self.context.scorer.as_ref(),
        )?;

        let mut extras = BundleExtras::default();
        let (demographic, intersectional) = match &outcome {
            Outcome::Labels(labels) => {
                let frame = Frame::new(&records, labels, outcome_column)?;
                let yates = analysis.yates_correction;
                extras.reference = self.reference_comparison(&records, labels)?;
                (
                    DemographicResults::Categorical(analyze_categorical(&frame, attributes, yates)?),
                    IntersectionalResults::Categorical(analyze_categorical_intersections(
                        &frame, attributes, yates,
                    )?),
                )
            }
            Outcome::Scores(scores) => {
                let frame = Frame::new(&records, scores, outcome_column)?;
                (
                    DemographicResults::Continuous(analyze_continuous(&frame, attributes)?),
                    IntersectionalResults::Continuous(analyze_continuous_intersections(
                        &frame,
                        attributes,
                        analysis.mixed_model,
                    )?),
                )
            }
        };
        if self.definition.sentiment_summary {
            extras.sentiment_summary = Some(self.sentiment_summary(&records)?);
        }

        tracing::info!(
            family = %family,
            continuous = self.definition.outcome.is_continuous(),
            "Pipeline finished"
        );
        Ok(AnalysisBundle {
            family,
            records: records.len(),
            is_continuous: self.definition.outcome.is_continuous(),
            demographic,
            intersectional,
            extras,
        })
    }

    fn sample(&self, records: &[Record]) -> Vec<SampleRow> {
        let selected: Vec<&Record> = records
            .iter()
            .filter(|r| self.definition.family.matches(r))
            .collect();
        let amount = self
            .context
            .analysis
            .sample_size
            .min(SAMPLE_LIMIT)
            .min(selected.len());
        let mut rng = StdRng::seed_from_u64(self.context.analysis.sample_seed);
        rand::seq::index::sample(&mut rng, selected.len(), amount)
            .into_iter()
            .map(|i| SampleRow {
                prompt_text: selected[i].prompt_text.clone(),
                llm_output: selected[i].llm_output.clone(),
            })
            .collect()
    }
}

/// Registered pipelines keyed by family.
pub struct PipelineRegistry {
    pipelines: BTreeMap<PromptFamily, Box<dyn DomainPipeline>>,
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            pipelines: BTreeMap::new(),
        }
    }

    /// All eight family pipelines over a shared context.
    pub fn with_context(context: PipelineContext) -> Result<Self, FairseaError> {
        let context = Arc::new(context);
        let mut registry = Self::new();
        for family in PromptFamily::ALL {
            registry.register(Box::new(FamilyPipeline::new(
                definition(family)?,
                Arc::clone(&context),
            )));
        }
        Ok(registry)
    }

    pub fn from_config(config: &FairseaConfig) -> Result<Self, FairseaError> {
        Self::with_context(PipelineContext::from_config(config)?)
    }

    /// Register a pipeline, replacing any previous one for the same family.
    pub fn register(&mut self, pipeline: Box<dyn DomainPipeline>) {
        let family = pipeline.family();
        tracing::debug!(family = %family, "Registering pipeline");
        self.pipelines.insert(family, pipeline);
    }

    pub fn get(&self, family: PromptFamily) -> Option<&dyn DomainPipeline> {
        self.pipelines.get(&family).map(|p| p.as_ref())
    }

    pub fn families(&self) -> impl Iterator<Item = PromptFamily> + '_ {
        self.pipelines.keys().copied()
    }

    pub fn run(&self, family: PromptFamily, records: &[Record]) -> Result<AnalysisBundle, FairseaError> {
        self.get(family)
            .ok_or_else(|| FairseaError::UnknownFamily(family.to_string()))?
            .run(records)
    }

    pub fn sample(&self, family: PromptFamily, records: &[Record]) -> Result<Vec<SampleRow>, FairseaError> {
        Ok(self
            .get(family)
            .ok_or_else(|| FairseaError::UnknownFamily(family.to_string()))?
            .sample(records))
    }

    /// Run every registered family present in `records`. Unregistered
    /// prefixes are logged and skipped. A failing family is reported in its
    /// own entry and does not stop the others.
    pub fn run_all(&self, records: &[Record]) -> BTreeMap<PromptFamily, FamilyOutcome> {
        let discovery = discover_families(records);
        for prefix in &discovery.unknown {
            tracing::warn!(prefix = %prefix, "No pipeline for prompt family, skipping");
        }
        let mut outcomes = BTreeMap::new();
        for family in discovery.known {
            if !self.pipelines.contains_key(&family) {
                continue;
            }
            let outcome = self.run(family, records);
            if let Err(e) = &outcome {
                tracing::error!(family = %family, error = %e, "Pipeline failed");
            }
            outcomes.insert(family, outcome);
        }
        outcomes
    }
}
