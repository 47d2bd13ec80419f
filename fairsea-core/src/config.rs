//! Configuration for the fairness analysis engine.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> explicit file -> environment -> overrides.

use crate::data::DemographicAttribute;
use crate::embeddings::EmbeddingConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FairseaConfig {
    /// Embedding provider used by the similarity categorizer.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// Sentiment scorer configuration.
    #[serde(default)]
    pub sentiment: SentimentConfig,
    /// External reference statistics.
    #[serde(default)]
    pub reference: ReferenceConfig,
    /// Statistical analysis options.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Which sentiment scorer the continuous pipelines use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentProvider {
    /// The reference VADER lexicon and rules.
    #[default]
    Vader,
    /// Built-in compact lexicon, extensible through `extra_lexicon`.
    Lexicon,
}

/// Sentiment scorer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentConfig {
    #[serde(default)]
    pub provider: SentimentProvider,
    /// Normalization constant of the compound score, `s / sqrt(s^2 + alpha)`.
    #[serde(default = "default_sentiment_alpha")]
    pub alpha: f64,
    /// Optional extra lexicon entries (word -> valence in [-4, 4]).
    #[serde(default)]
    pub extra_lexicon: Vec<(String, f64)>,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            provider: SentimentProvider::default(),
            alpha: default_sentiment_alpha(),
            extra_lexicon: Vec::new(),
        }
    }
}

fn default_sentiment_alpha() -> f64 {
    15.0
}

/// Reference (ground-truth) statistics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Fetch reference statistics for the occupation and industry pipelines.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Datastore search endpoint.
    #[serde(default = "default_reference_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_reference_timeout")]
    pub timeout_secs: u64,
    /// Maximum rows requested per dataset.
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
    #[serde(default = "default_occupation_female")]
    pub occupation_female_dataset: String,
    #[serde(default = "default_occupation_male")]
    pub occupation_male_dataset: String,
    #[serde(default = "default_industry_female")]
    pub industry_female_dataset: String,
    #[serde(default = "default_industry_male")]
    pub industry_male_dataset: String,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_reference_url(),
            timeout_secs: default_reference_timeout(),
            row_limit: default_row_limit(),
            occupation_female_dataset: default_occupation_female(),
            occupation_male_dataset: default_occupation_male(),
            industry_female_dataset: default_industry_female(),
            industry_male_dataset: default_industry_male(),
        }
    }
}

fn default_reference_url() -> String {
    "https://data.gov.sg/api/action/datastore_search".to_string()
}

fn default_reference_timeout() -> u64 {
    20
}

fn default_row_limit() -> usize {
    5000
}

fn default_occupation_female() -> String {
    "d_8edfaa8f0eb39484897594b631b9b3db".to_string()
}

fn default_occupation_male() -> String {
    "d_0ffa357488160f26f108be7969fc1ac0".to_string()
}

fn default_industry_female() -> String {
    "d_a31f7f149ba860506c127ab0e0f62985".to_string()
}

fn default_industry_male() -> String {
    "d_5854d81fe22ed46e8e365214b52f4f27".to_string()
}

/// Statistical analysis options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Demographic attributes to analyze, in combination order.
    #[serde(default = "default_attributes")]
    pub attributes: Vec<DemographicAttribute>,
    /// Apply Yates' continuity correction to 1-degree-of-freedom chi-square tests.
    #[serde(default = "default_true")]
    pub yates_correction: bool,
    /// Fit the random-intercept model when records carry a model id.
    #[serde(default = "default_true")]
    pub mixed_model: bool,
    /// Maximum rows in a preview sample.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Seed of the preview sampler.
    #[serde(default = "default_sample_seed")]
    pub sample_seed: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            attributes: default_attributes(),
            yates_correction: true,
            mixed_model: true,
            sample_size: default_sample_size(),
            sample_seed: default_sample_seed(),
        }
    }
}

fn default_attributes() -> Vec<DemographicAttribute> {
    DemographicAttribute::ALL.to_vec()
}

fn default_sample_size() -> usize {
    5
}

fn default_sample_seed() -> u64 {
    42
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides
/// 2. Environment variables (prefixed with `FAIRSEA_`, `__` as section separator)
/// 3. Explicit config file
/// 4. Workspace config (`.fairsea/config.toml`)
/// 5. User config (`~/.config/fairsea/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&FairseaConfig>,
) -> Result<FairseaConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FairseaConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".fairsea").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(file) = config_file {
        figment = figment.merge(Toml::file(file));
    }

    // FAIRSEA_EMBEDDING__PROVIDER, FAIRSEA_REFERENCE__ENABLED, ...
    figment = figment.merge(Env::prefixed("FAIRSEA_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Location of the user-level config file, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "fairsea", "fairsea")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FairseaConfig::default();
        assert_eq!(config.embedding.provider, "local");
        assert!(config.reference.enabled);
        assert_eq!(config.reference.timeout_secs, 20);
        assert!(config.analysis.yates_correction);
        assert_eq!(config.analysis.sample_size, 5);
        assert_eq!(config.analysis.sample_seed, 42);
        assert_eq!(config.analysis.attributes.len(), 3);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = FairseaConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: FairseaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.reference.base_url, config.reference.base_url);
        assert_eq!(parsed.analysis.attributes, config.analysis.attributes);
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let parsed: FairseaConfig =
            serde_json::from_str(r#"{"analysis": {"yates_correction": false}}"#).unwrap();
        assert!(!parsed.analysis.yates_correction);
        assert_eq!(parsed.analysis.sample_seed, 42);
        assert_eq!(parsed.embedding.batch_size, 32);
    }

    #[test]
    fn test_load_config_from_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".fairsea");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[reference]\nenabled = false\n\n[analysis]\nsample_size = 3\n",
        )
        .unwrap();
        let config = load_config(Some(dir.path()), None, None).unwrap();
        assert!(!config.reference.enabled);
        assert_eq!(config.analysis.sample_size, 3);
    }

    #[test]
    fn test_load_config_overrides_win() {
        let mut overrides = FairseaConfig::default();
        overrides.analysis.sample_seed = 7;
        let config = load_config(None, None, Some(&overrides)).unwrap();
        assert_eq!(config.analysis.sample_seed, 7);
    }
}
