//! Word-vector sentence model.
//!
//! A compact JSON word-vector table standing in for the pre-trained sentence
//! embedding artifact: a phrase embeds as the mean of its words' vectors.
//! Loaded once at startup and treated as read-only from then on.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use essence_core::{EssenceError, Result, SentenceModel};

/// Sentence model backed by a fixed word-vector table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordVectorModel {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl WordVectorModel {
    /// Build a model from an in-memory table.
    #[must_use]
    pub fn new(dimension: usize, vectors: HashMap<String, Vec<f32>>) -> Self {
        Self { dimension, vectors }
    }

    /// Load a model from a JSON artifact.
    ///
    /// # Errors
    ///
    /// Returns [`EssenceError::ModelUnavailable`] if the file cannot be read
    /// or parsed — a missing model is fatal for the whole run.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            EssenceError::ModelUnavailable(format!("reading {}: {e}", path.display()))
        })?;
        let model: Self = serde_json::from_slice(&bytes).map_err(|e| {
            EssenceError::ModelUnavailable(format!("parsing {}: {e}", path.display()))
        })?;

        info!(
            words = model.vectors.len(),
            dimension = model.dimension,
            "loaded word-vector model"
        );
        Ok(model)
    }

    /// Embedding dimension of the table.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl SentenceModel for WordVectorModel {
    /// Mean-pool the vectors of the phrase's known words. Words absent from
    /// the table are skipped; a phrase with no known words embeds as the
    /// zero vector, which downstream normalization leaves untouched.
    fn sentence_vector(&self, phrase: &str) -> Result<Vec<f32>> {
        let mut sum = vec![0.0f32; self.dimension];
        let mut known = 0usize;

        for word in phrase.split_whitespace() {
            if let Some(vector) = self.vectors.get(word) {
                if vector.len() != self.dimension {
                    return Err(EssenceError::ModelUnavailable(format!(
                        "word {word:?} has dimension {} (table is {})",
                        vector.len(),
                        self.dimension
                    )));
                }
                for (s, v) in sum.iter_mut().zip(vector) {
                    *s += v;
                }
                known += 1;
            }
        }

        if known > 0 {
            for s in sum.iter_mut() {
                *s /= known as f32;
            }
        }
        Ok(sum)
    }
}
