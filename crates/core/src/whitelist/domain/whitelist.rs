use ndarray::{Array2, ArrayView1};
use thiserror::Error;

use crate::shared::constants::DEFAULT_SIMILARITY_THRESHOLD;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WhitelistError {
    #[error("similarity threshold must be strictly between 0 and 1, got {0}")]
    Threshold(f32),
    #[error("whitelist entry '{label}' has an empty embedding")]
    EmptyEmbedding { label: String },
    #[error("whitelist entry '{label}' has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        label: String,
        expected: usize,
        actual: usize,
    },
}

/// Cosine similarity a face must exceed to count as known.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct SimilarityThreshold(f32);

impl SimilarityThreshold {
    pub fn new(value: f32) -> Result<Self, WhitelistError> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(WhitelistError::Threshold(value))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Default for SimilarityThreshold {
    fn default() -> Self {
        Self(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

/// One reference identity.
#[derive(Clone, Debug, PartialEq)]
pub struct WhitelistEntry {
    pub embedding: Vec<f32>,
    /// Originating file, for logs only.
    pub source_label: String,
}

impl WhitelistEntry {
    pub fn new(embedding: Vec<f32>, source_label: impl Into<String>) -> Self {
        Self {
            embedding,
            source_label: source_label.into(),
        }
    }
}

/// Reference embeddings stacked row-wise into an `N x D` matrix so a query
/// is a single matrix-vector product.
#[derive(Clone, Debug)]
pub struct WhitelistIndex {
    matrix: Array2<f32>,
    labels: Vec<String>,
}

impl WhitelistIndex {
    /// Returns `Ok(None)` when `entries` is empty.
    pub fn from_entries(entries: Vec<WhitelistEntry>) -> Result<Option<Self>, WhitelistError> {
        let Some(first) = entries.first() else {
            return Ok(None);
        };
        let dim = first.embedding.len();

        let mut rows = Vec::with_capacity(entries.len());
        let mut labels = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.embedding.is_empty() {
                return Err(WhitelistError::EmptyEmbedding {
                    label: entry.source_label,
                });
            }
            if entry.embedding.len() != dim {
                return Err(WhitelistError::DimensionMismatch {
                    label: entry.source_label,
                    expected: dim,
                    actual: entry.embedding.len(),
                });
            }
            rows.push(entry.embedding);
            labels.push(entry.source_label);
        }

        let matrix = Array2::from_shape_fn((rows.len(), dim), |(r, c)| rows[r][c]);
        Ok(Some(Self { matrix, labels }))
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Cosine similarity of `embedding` against every entry.
    ///
    /// `None` if the query has the wrong dimensionality.
    pub fn similarities(&self, embedding: &[f32]) -> Option<Vec<f32>> {
        if embedding.len() != self.dimension() {
            return None;
        }
        Some(self.matrix.dot(&ArrayView1::from(embedding)).to_vec())
    }

    /// True iff any entry's similarity is strictly above `threshold`.
    pub fn is_whitelisted(&self, embedding: &[f32], threshold: SimilarityThreshold) -> bool {
        match self.similarities(embedding) {
            Some(scores) => scores.iter().any(|&s| s > threshold.value()),
            None => {
                log::warn!(
                    "Embedding has {} dimensions, whitelist expects {}; treating face as unknown",
                    embedding.len(),
                    self.dimension()
                );
                false
            }
        }
    }
}

/// The whitelist for a job. `Empty` whitelists nobody.
#[derive(Clone, Debug, Default)]
pub enum Whitelist {
    #[default]
    Empty,
    Indexed(WhitelistIndex),
}

impl Whitelist {
    pub fn from_entries(entries: Vec<WhitelistEntry>) -> Result<Self, WhitelistError> {
        Ok(match WhitelistIndex::from_entries(entries)? {
            Some(index) => Whitelist::Indexed(index),
            None => Whitelist::Empty,
        })
    }

    pub fn is_whitelisted(&self, embedding: &[f32], threshold: SimilarityThreshold) -> bool {
        match self {
            Whitelist::Empty => false,
            Whitelist::Indexed(index) => index.is_whitelisted(embedding, threshold),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Whitelist::Empty => 0,
            Whitelist::Indexed(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
