//! # fairsea-core - demographic bias metrics for language model outputs
//!
//! Turns a collection of model responses, each tagged with the Gender, Race
//! and Nationality of the persona it was prompted with, into:
//!
//! 1. an outcome column per prompt family (semantic category, sentiment score,
//!    extracted phrase or decision),
//! 2. per-attribute and per-intersection significance tests, and
//! 3. normalized disparity indices (FDI, DBI, JSD, IDI) comparable across runs.
//!
//! Degenerate sub-analyses are reported as skipped units inside the result
//! bundle; configuration and embedding failures abort the run.

pub mod analysis;
pub mod categorize;
pub mod config;
pub mod data;
pub mod embeddings;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod reference;
pub mod sentiment;

// Re-exports
pub use analysis::{AnalysisUnit, DemographicResults, Frame, Grouping, IntersectionalResults};
pub use categorize::{SimilarityCategorizer, Taxonomy};
pub use config::{FairseaConfig, load_config};
pub use data::{DemographicAttribute, FileSource, Record, RecordSource, prepare_records};
pub use embeddings::{Embedder, EmbeddingConfig, create_embedder};
pub use error::{FairseaError, FetchError};
pub use pipeline::{
    AnalysisBundle, DomainPipeline, FamilyOutcome, PipelineContext, PipelineRegistry, PromptFamily,
    SampleRow, discover_families,
};
pub use reference::{ReferenceSource, ReferenceTable, ReferenceTopic};
pub use sentiment::{LexiconScorer, SentimentScorer, VaderScorer, create_scorer};
