//! # Flat Vector Index
//!
//! An exact, append-only nearest-neighbor index over fixed-dimension vectors.
//! Every vector carries the label set of the phrase it embeds; `search`
//! returns squared-Euclidean distances together with those label sets,
//! nearest first. The whole index serializes to a JSON snapshot.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EssenceError, Result};
use crate::persist;

/// How the index treats repeated [`FlatIndex::add`] calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexMode {
    /// Each `add` grows the index; nothing is ever discarded.
    Incremental,
    /// Each `add` rebuilds the index from scratch with only the given batch.
    /// Used by evaluation folds that must not carry state between calls.
    Rebuild,
}

/// Flat (exhaustive-scan) similarity index with per-vector label sets.
///
/// Vectors and label sets are parallel arrays in insertion order; insertion
/// order breaks distance ties, which keeps `search` fully deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    mode: IndexMode,
    vectors: Vec<Vec<f32>>,
    labels: Vec<Vec<String>>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize, mode: IndexMode) -> Self {
        Self {
            dimension,
            mode,
            vectors: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Append a batch of vectors with their label sets.
    ///
    /// In [`IndexMode::Rebuild`] the existing contents (vectors and labels
    /// both) are discarded first. The batch is validated before any state is
    /// touched, so a rejected call leaves the index exactly as it was.
    ///
    /// # Errors
    ///
    /// [`EssenceError::DimensionMismatch`] if any vector is not of the
    /// configured dimension; [`EssenceError::LengthMismatch`] if the two
    /// batches differ in length.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, label_sets: Vec<Vec<String>>) -> Result<()> {
        if vectors.len() != label_sets.len() {
            return Err(EssenceError::LengthMismatch {
                vectors: vectors.len(),
                labels: label_sets.len(),
            });
        }
        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(EssenceError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        if self.mode == IndexMode::Rebuild {
            self.vectors.clear();
            self.labels.clear();
        }

        self.vectors.extend(vectors);
        self.labels.extend(label_sets);
        debug_assert_eq!(self.vectors.len(), self.labels.len());
        Ok(())
    }

    /// Find the `k` nearest indexed vectors for each query.
    ///
    /// Returns, per query, `(squared_distance, label_set)` pairs ordered
    /// nearest first. If fewer than `k` vectors are indexed, all of them are
    /// returned; an empty index yields an empty row per query rather than an
    /// error — callers must treat that as "no labels known".
    ///
    /// # Errors
    ///
    /// [`EssenceError::DimensionMismatch`] if any query vector is not of the
    /// configured dimension; a truncated distance over mismatched vectors
    /// would be silently wrong.
    pub fn search(&self, queries: &[Vec<f32>], k: usize) -> Result<Vec<Vec<(f32, &[String])>>> {
        for query in queries {
            if query.len() != self.dimension {
                return Err(EssenceError::DimensionMismatch {
                    expected: self.dimension,
                    actual: query.len(),
                });
            }
        }

        let rows = queries
            .iter()
            .map(|query| {
                let mut scored: Vec<(f32, usize)> = self
                    .vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (squared_distance(query, v), i))
                    .collect();
                // Stable ordering: distance first, insertion index on ties.
                scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                scored.truncate(k);
                scored
                    .into_iter()
                    .map(|(d, i)| (d, self.labels[i].as_slice()))
                    .collect()
            })
            .collect();
        Ok(rows)
    }

    /// Write the full index to a snapshot file.
    pub fn snapshot(&self, path: &Path) -> Result<()> {
        persist::save_json(path, self)?;
        debug!(vectors = self.len(), path = %path.display(), "wrote index snapshot");
        Ok(())
    }

    /// Restore an index from a snapshot written by [`snapshot`](Self::snapshot).
    ///
    /// Searching the restored index is bit-for-bit equivalent to searching
    /// the one that was snapshotted.
    pub fn restore(path: &Path) -> Result<Self> {
        let index: Self = persist::load_json(path)?;
        debug!(vectors = index.len(), path = %path.display(), "restored index snapshot");
        Ok(index)
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index holds no vectors yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// The vector dimension this index accepts.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The construction mode this index was created with.
    #[must_use]
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Replace the mode, keeping the indexed contents. Used when a restored
    /// snapshot must follow the restoring configuration's mode.
    pub(crate) fn set_mode(&mut self, mode: IndexMode) {
        self.mode = mode;
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
