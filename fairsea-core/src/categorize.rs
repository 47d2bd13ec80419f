//! Nearest-anchor text categorization.
//!
//! Every output and every anchor phrase is embedded; an output takes the label
//! of the anchor with the highest cosine similarity. There is no threshold, so
//! every output receives exactly one label.
//!
//! Ties are resolved by the first maximum in taxonomy order: categories in
//! declaration order, anchors in list order. The result is deterministic but
//! depends on that order, so near-equidistant outputs can change label when a
//! taxonomy is reordered.

use crate::embeddings::{Embedder, normalize};
use crate::error::FairseaError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// One category and its exemplar phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    pub anchors: Vec<String>,
}

/// Ordered label → anchors mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Taxonomy {
    /// Build a taxonomy, rejecting empty categories, blank anchors and
    /// duplicate labels.
    pub fn new<L, A>(categories: impl IntoIterator<Item = (L, Vec<A>)>) -> Result<Self, FairseaError>
    where
        L: Into<String>,
        A: Into<String>,
    {
        let categories: Vec<Category> = categories
            .into_iter()
            .map(|(label, anchors)| Category {
                label: label.into(),
                anchors: anchors.into_iter().map(Into::into).collect(),
            })
            .collect();

        if categories.is_empty() {
            return Err(FairseaError::config("taxonomy has no categories"));
        }
        let mut seen = HashSet::new();
        for category in &categories {
            if !seen.insert(category.label.as_str()) {
                return Err(FairseaError::config(format!(
                    "duplicate taxonomy label '{}'",
                    category.label
                )));
            }
            if category.anchors.is_empty() {
                return Err(FairseaError::config(format!(
                    "category '{}' has no anchors",
                    category.label
                )));
            }
            if category.anchors.iter().any(|a| a.trim().is_empty()) {
                return Err(FairseaError::config(format!(
                    "category '{}' has a blank anchor",
                    category.label
                )));
            }
        }
        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.label.as_str())
    }

    /// Flattened `(label, anchor)` pairs in tie-breaking order.
    pub fn anchors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.categories.iter().flat_map(|c| {
            c.anchors
                .iter()
                .map(move |a| (c.label.as_str(), a.as_str()))
        })
    }
}

/// Assigns outputs to taxonomy labels by embedding similarity.
#[derive(Clone)]
pub struct SimilarityCategorizer {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl SimilarityCategorizer {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Label every output. Any embedding failure fails the whole call.
    pub fn categorize<S: AsRef<str>>(
        &self,
        outputs: &[S],
        taxonomy: &Taxonomy,
    ) -> Result<Vec<String>, FairseaError> {
        if outputs.is_empty() {
            return Ok(Vec::new());
        }

        let (anchor_labels, anchor_texts): (Vec<&str>, Vec<&str>) = taxonomy.anchors().unzip();
        let anchor_vectors = self.embed_all(&anchor_texts)?;
        let texts: Vec<&str> = outputs.iter().map(AsRef::as_ref).collect();
        let output_vectors = self.embed_all(&texts)?;

        tracing::debug!(
            provider = self.embedder.provider_name(),
            outputs = texts.len(),
            anchors = anchor_texts.len(),
            "Categorizing outputs"
        );

        output_vectors
            .iter()
            .map(|v| {
                let best = nearest_anchor(v, &anchor_vectors)?;
                Ok(anchor_labels[best].to_string())
            })
            .collect()
    }

    fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, FairseaError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = self.embedder.embed_batch(chunk)?;
            if batch.len() != chunk.len() {
                return Err(FairseaError::embedding(format!(
                    "expected {} vectors, got {}",
                    chunk.len(),
                    batch.len()
                )));
            }
            vectors.extend(batch.into_iter().map(ensure_unit));
        }
        Ok(vectors)
    }
}

fn ensure_unit(mut vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if (norm - 1.0).abs() > 1e-3 {
        normalize(&mut vector);
    }
    vector
}

/// Index of the first anchor with maximal dot product.
fn nearest_anchor(vector: &[f32], anchors: &[Vec<f32>]) -> Result<usize, FairseaError> {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (i, anchor) in anchors.iter().enumerate() {
        if anchor.len() != vector.len() {
            return Err(FairseaError::embedding(format!(
                "dimension mismatch: {} vs {}",
                vector.len(),
                anchor.len()
            )));
        }
        let score: f32 = vector.iter().zip(anchor).map(|(a, b)| a * b).sum();
        if score > best_score {
            best = i;
            best_score = score;
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LocalEmbedder;
    use std::collections::HashMap;

    /// Maps known texts to fixed vectors; anything else fails.
    struct TableEmbedder(HashMap<&'static str, Vec<f32>>);

    impl Embedder for TableEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, FairseaError> {
            texts
                .iter()
                .map(|t| {
                    self.0
                        .get(t)
                        .cloned()
                        .ok_or_else(|| FairseaError::embedding(format!("no vector for '{t}'")))
                })
                .collect()
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn provider_name(&self) -> &str {
            "table"
        }
    }

    fn table() -> Arc<dyn Embedder> {
        Arc::new(TableEmbedder(HashMap::from([
            ("warm", vec![1.0, 0.0]),
            ("cold", vec![0.0, 1.0]),
            ("tepid", vec![0.70710677, 0.70710677]),
            ("hot", vec![3.0, 0.5]),
        ])))
    }

    fn temperature() -> Taxonomy {
        Taxonomy::new([("warm_side", vec!["warm"]), ("cold_side", vec!["cold"])]).unwrap()
    }

    #[test]
    fn test_taxonomy_validation() {
        assert!(Taxonomy::new(Vec::<(&str, Vec<&str>)>::new()).is_err());
        assert!(Taxonomy::new([("a", Vec::<&str>::new())]).is_err());
        assert!(Taxonomy::new([("a", vec!["  "])]).is_err());
        assert!(Taxonomy::new([("a", vec!["x"]), ("a", vec!["y"])]).is_err());
    }

    #[test]
    fn test_anchor_order() {
        let t = Taxonomy::new([("a", vec!["x", "y"]), ("b", vec!["z"])]).unwrap();
        let pairs: Vec<_> = t.anchors().collect();
        assert_eq!(pairs, vec![("a", "x"), ("a", "y"), ("b", "z")]);
    }

    #[test]
    fn test_nearest_anchor_wins() {
        let c = SimilarityCategorizer::new(table(), 2);
        let labels = c.categorize(&["hot", "cold", "warm"], &temperature()).unwrap();
        assert_eq!(labels, vec!["warm_side", "cold_side", "warm_side"]);
    }

    #[test]
    fn test_tie_goes_to_first_category() {
        let c = SimilarityCategorizer::new(table(), 8);
        assert_eq!(c.categorize(&["tepid"], &temperature()).unwrap(), vec!["warm_side"]);

        let reversed =
            Taxonomy::new([("cold_side", vec!["cold"]), ("warm_side", vec!["warm"])]).unwrap();
        assert_eq!(c.categorize(&["tepid"], &reversed).unwrap(), vec!["cold_side"]);
    }

    #[test]
    fn test_embedding_failure_is_fatal() {
        let c = SimilarityCategorizer::new(table(), 1);
        let err = c.categorize(&["warm", "unknown text"], &temperature()).unwrap_err();
        assert!(matches!(err, FairseaError::Embedding(_)));
    }

    #[test]
    fn test_empty_outputs() {
        let c = SimilarityCategorizer::new(table(), 4);
        let labels = c.categorize::<&str>(&[], &temperature()).unwrap();
        assert!(labels.is_empty());
    }

    #[test]
    fn test_deterministic_with_local_embedder() {
        let c = SimilarityCategorizer::new(Arc::new(LocalEmbedder::new(256)), 3);
        let taxonomy = Taxonomy::new([
            ("too_passive", vec!["too passive", "hesitant"]),
            ("too_authoritative", vec!["too authoritative", "too dominant"]),
        ])
        .unwrap();
        let outputs = ["rather hesitant", "too dominant overall", "passive"];
        let first = c.categorize(&outputs, &taxonomy).unwrap();
        let second = c.categorize(&outputs, &taxonomy).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], "too_passive");
        assert_eq!(first[1], "too_authoritative");
    }
}
