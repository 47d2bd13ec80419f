//! Lexicon-based sentiment scoring.
//!
//! [`VaderScorer`] wraps the VADER analyzer and is the default. [`LexiconScorer`]
//! is a compact VADER-style scorer whose lexicon can be extended from config:
//! negation flipping, intensity boosters, contrastive "but" weighting,
//! capitalization and exclamation emphasis.

use crate::config::{SentimentConfig, SentimentProvider};
use std::collections::HashMap;
use std::sync::Arc;
use vader_sentiment::SentimentIntensityAnalyzer;

/// Black-box sentiment function consumed by the continuous pipelines.
pub trait SentimentScorer: Send + Sync {
    /// Compound polarity of `text`, in `[-1, 1]`.
    fn score(&self, text: &str) -> f64;
}

/// Build the configured scorer.
pub fn create_scorer(config: &SentimentConfig) -> Arc<dyn SentimentScorer> {
    tracing::debug!(provider = ?config.provider, "Creating sentiment scorer");
    match config.provider {
        SentimentProvider::Vader => Arc::new(VaderScorer::new()),
        SentimentProvider::Lexicon => Arc::new(LexiconScorer::from_config(config)),
    }
}

/// VADER compound score.
pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn score(&self, text: &str) -> f64 {
        self.analyzer
            .polarity_scores(text)
            .get("compound")
            .copied()
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0)
    }
}

const NEGATION_SCALAR: f64 = -0.74;
const BOOSTER_INCREMENT: f64 = 0.293;
const CAPS_INCREMENT: f64 = 0.733;
const EXCLAMATION_INCREMENT: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "nowhere", "cannot",
    "cant", "can't", "dont", "don't", "doesnt", "doesn't", "didnt", "didn't", "isnt", "isn't",
    "wasnt", "wasn't", "arent", "aren't", "werent", "weren't", "wont", "won't", "wouldnt",
    "wouldn't", "shouldnt", "shouldn't", "without", "hardly", "rarely", "seldom",
];

const BOOSTERS_UP: &[&str] = &[
    "absolutely", "very", "extremely", "really", "so", "too", "highly", "incredibly", "truly",
    "deeply", "especially", "exceptionally", "remarkably", "totally", "utterly", "most", "more",
    "quite", "particularly", "hugely", "entirely", "completely",
];

const BOOSTERS_DOWN: &[&str] = &[
    "slightly", "somewhat", "barely", "marginally", "partly", "kinda", "sort", "little", "less",
    "occasionally", "fairly", "mildly",
];

/// Base valence lexicon, scores in `[-4, 4]`.
const LEXICON: &[(&str, f64)] = &[
    ("able", 1.1), ("accepting", 1.6), ("accomplished", 1.8), ("admirable", 2.6),
    ("admire", 2.4), ("aggressive", -0.6), ("ambitious", 2.1), ("amazing", 2.8),
    ("angry", -2.3), ("annoying", -1.8), ("anxious", -1.0), ("arrogant", -1.8),
    ("awful", -2.0), ("bad", -2.5), ("beautiful", 2.9), ("best", 3.2), ("better", 1.9),
    ("biased", -1.1), ("bold", 1.6), ("boring", -1.3), ("brave", 2.4), ("bright", 1.9),
    ("brilliant", 2.8), ("calm", 1.3), ("capable", 1.6), ("careful", 1.1), ("careless", -1.5),
    ("caring", 2.2), ("charming", 2.8), ("cheerful", 2.5), ("clever", 2.0), ("cold", -0.3),
    ("competent", 1.3), ("confident", 2.2), ("confused", -1.3), ("considerate", 1.9),
    ("cooperative", 1.3), ("courageous", 2.4), ("creative", 1.9), ("cruel", -2.8),
    ("dedicated", 2.0), ("dependable", 1.8), ("difficult", -1.5), ("diligent", 1.7),
    ("disappointed", -1.9), ("disappointing", -2.2), ("dishonest", -2.7), ("disorganized", -1.1),
    ("dull", -1.7), ("dutiful", 1.4), ("eager", 1.5), ("efficient", 1.8), ("emotional", 0.6),
    ("empathetic", 1.8), ("energetic", 1.8), ("enthusiastic", 1.9), ("excellent", 2.7),
    ("exceptional", 2.7), ("fail", -2.5), ("failure", -2.3), ("fair", 1.3), ("fantastic", 2.6),
    ("fine", 0.8), ("friendly", 2.2), ("generous", 2.3), ("gentle", 1.9), ("genuine", 1.8),
    ("good", 1.9), ("great", 3.1), ("happy", 2.7), ("hardworking", 2.0), ("harsh", -1.9),
    ("hate", -2.7), ("helpful", 1.8), ("honest", 2.3), ("hostile", -2.4), ("humble", 1.2),
    ("ignorant", -1.7), ("impressive", 2.3), ("incompetent", -2.3), ("independent", 1.2),
    ("innovative", 1.9), ("insecure", -1.2), ("inspiring", 2.5), ("intelligent", 2.0),
    ("kind", 2.4), ("lazy", -2.3), ("like", 1.5), ("love", 3.2), ("loyal", 2.1),
    ("mature", 1.0), ("mean", -1.9), ("modest", 1.2), ("motivated", 1.9), ("nasty", -2.6),
    ("negative", -2.7), ("nice", 1.8), ("passionate", 2.4), ("patient", 1.3), ("pleasant", 2.3),
    ("polite", 2.0), ("poor", -2.1), ("positive", 2.6), ("proud", 2.1), ("prudent", 1.3),
    ("reliable", 1.9), ("resilient", 1.6), ("resourceful", 1.9), ("respectful", 2.1),
    ("respected", 2.1), ("responsible", 1.3), ("rude", -2.0), ("sad", -2.1), ("selfish", -2.1),
    ("sincere", 1.7), ("skilled", 1.8), ("smart", 1.7), ("strong", 2.3), ("stubborn", -1.4),
    ("stupid", -2.4), ("successful", 2.7), ("supportive", 2.0), ("talented", 2.3),
    ("terrible", -2.1), ("thoughtful", 1.6), ("trustworthy", 2.3), ("ugly", -2.3),
    ("unfair", -2.1), ("unfriendly", -1.5), ("unhappy", -1.8), ("unprofessional", -1.9),
    ("unreliable", -1.9), ("warm", 0.9), ("weak", -1.9), ("wise", 1.8), ("wonderful", 2.7),
    ("worse", -2.1), ("worst", -3.1), ("wrong", -2.1),
];

/// Valence-lexicon compound scorer.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    lexicon: HashMap<String, f64>,
    alpha: f64,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::from_config(&SentimentConfig::default())
    }
}

impl LexiconScorer {
    pub fn from_config(config: &SentimentConfig) -> Self {
        let mut lexicon: HashMap<String, f64> = LEXICON
            .iter()
            .map(|(word, valence)| (word.to_string(), *valence))
            .collect();
        for (word, valence) in &config.extra_lexicon {
            lexicon.insert(word.to_lowercase(), valence.clamp(-4.0, 4.0));
        }
        Self {
            lexicon,
            alpha: config.alpha.max(f64::EPSILON),
        }
    }

    fn booster(word: &str, valence: f64) -> f64 {
        let magnitude = if BOOSTERS_UP.contains(&word) {
            BOOSTER_INCREMENT
        } else if BOOSTERS_DOWN.contains(&word) {
            -BOOSTER_INCREMENT
        } else {
            return 0.0;
        };
        if valence < 0.0 { -magnitude } else { magnitude }
    }

    fn valences(&self, tokens: &[&str], mixed_case: bool) -> Vec<f64> {
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let mut valences = Vec::with_capacity(tokens.len());

        for (i, word) in lowered.iter().enumerate() {
            let Some(&base) = self.lexicon.get(word) else {
                valences.push(0.0);
                continue;
            };
            if BOOSTERS_UP.contains(&word.as_str()) || BOOSTERS_DOWN.contains(&word.as_str()) {
                valences.push(0.0);
                continue;
            }

            let mut valence = base;
            let raw = tokens[i];
            if mixed_case && raw.len() > 1 && raw.chars().all(|c| !c.is_lowercase()) {
                valence += CAPS_INCREMENT * valence.signum();
            }

            for (distance, damping) in [(1usize, 1.0), (2, 0.95), (3, 0.9)] {
                if i < distance {
                    break;
                }
                let previous = lowered[i - distance].as_str();
                valence += Self::booster(previous, valence) * damping;
                if NEGATIONS.contains(&previous) {
                    valence *= NEGATION_SCALAR;
                }
            }
            valences.push(valence);
        }

        if let Some(pivot) = lowered.iter().position(|w| w == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < pivot {
                    *v *= 0.5;
                } else if i > pivot {
                    *v *= 1.5;
                }
            }
        }
        valences
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> f64 {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\''))
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            return 0.0;
        }

        let has_upper = tokens.iter().any(|t| t.chars().any(char::is_uppercase));
        let has_lower = tokens.iter().any(|t| t.chars().any(char::is_lowercase));
        let valences = self.valences(&tokens, has_upper && has_lower);

        let mut sum: f64 = valences.iter().sum();
        if sum == 0.0 {
            return 0.0;
        }

        let exclamations = text.matches('!').count().min(MAX_EXCLAMATIONS);
        sum += sum.signum() * exclamations as f64 * EXCLAMATION_INCREMENT;

        (sum / (sum * sum + self.alpha).sqrt()).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> LexiconScorer {
        LexiconScorer::default()
    }

    #[test]
    fn test_neutral_text_scores_zero() {
        assert_eq!(scorer().score("the meeting is on tuesday"), 0.0);
        assert_eq!(scorer().score(""), 0.0);
    }

    #[test]
    fn test_polarity_sign() {
        assert!(scorer().score("She is kind and helpful") > 0.5);
        assert!(scorer().score("He is lazy and rude") < -0.5);
    }

    #[test]
    fn test_negation_flips_sign() {
        let s = scorer();
        assert!(s.score("good") > 0.0);
        assert!(s.score("not good") < 0.0);
    }

    #[test]
    fn test_booster_increases_magnitude() {
        let s = scorer();
        assert!(s.score("very good") > s.score("good"));
        assert!(s.score("slightly good") < s.score("good"));
    }

    #[test]
    fn test_but_shifts_weight() {
        let s = scorer();
        assert!(s.score("talented but lazy") < 0.0);
    }

    #[test]
    fn test_exclamation_emphasis() {
        let s = scorer();
        assert!(s.score("great!!!") > s.score("great"));
    }

    #[test]
    fn test_compound_bounded() {
        let s = scorer();
        let text = "amazing wonderful excellent great best love ".repeat(20);
        let v = s.score(&text);
        assert!(v <= 1.0 && v > 0.99);
    }

    #[test]
    fn test_vader_polarity() {
        let s = VaderScorer::new();
        assert!(s.score("She is kind and helpful") > 0.5);
        assert!(s.score("He is lazy and rude") < -0.3);
        assert!(s.score("good") > 0.0);
        assert!(s.score("not good") < 0.0);
        assert_eq!(s.score("the meeting is on tuesday"), 0.0);
    }

    #[test]
    fn test_create_scorer_follows_provider() {
        let lexicon = SentimentConfig {
            provider: SentimentProvider::Lexicon,
            extra_lexicon: vec![("zorblat".into(), 2.0)],
            ..Default::default()
        };
        assert!(create_scorer(&lexicon).score("zorblat") > 0.0);
        // unknown to VADER
        assert_eq!(create_scorer(&SentimentConfig::default()).score("zorblat"), 0.0);
    }

    #[test]
    fn test_extra_lexicon() {
        let config = SentimentConfig {
            extra_lexicon: vec![("steadfast".into(), 2.0), ("Flaky".into(), -9.0)],
            ..Default::default()
        };
        let s = LexiconScorer::from_config(&config);
        assert!(s.score("steadfast") > 0.0);
        assert!(s.score("flaky") < 0.0);
        assert!(s.score("flaky") >= -1.0);
    }
}
