//! # Confidence-Gated Nearest-Neighbor Classifier
//!
//! Ties the embedder and the flat index together: training embeds labeled
//! phrases into the index, prediction retrieves the nearest neighbors of a
//! query and aggregates their label sets into a ranked, size-capped result,
//! gated by a caller-supplied confidence limit.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::embed::{EMBEDDING_DIM, Embedder, SentenceModel};
use crate::error::Result;
use crate::index::{FlatIndex, IndexMode};

/// Number of neighbors retrieved per query.
pub const DEFAULT_NEIGHBORS: usize = 25;

/// Cap on the number of labels a single prediction may carry.
pub const DEFAULT_MAX_LABELS: usize = 10;

/// Configuration for a [`Classifier`].
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Embedding dimension the index accepts.
    pub dimension: usize,
    /// Neighbors retrieved per query.
    pub neighbors: usize,
    /// Maximum labels returned per prediction.
    pub max_labels: usize,
    /// How repeated training calls treat existing index contents.
    pub index_mode: IndexMode,
    /// Embedding cache file; in-memory only when unset.
    pub cache_path: Option<PathBuf>,
    /// Index snapshot file; snapshots are skipped when unset.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            dimension: EMBEDDING_DIM,
            neighbors: DEFAULT_NEIGHBORS,
            max_labels: DEFAULT_MAX_LABELS,
            index_mode: IndexMode::Incremental,
            cache_path: None,
            snapshot_path: None,
        }
    }
}

impl ClassifierConfig {
    /// Create a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the embedding dimension.
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Set the number of neighbors retrieved per query.
    #[must_use]
    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// Set the per-prediction label cap.
    #[must_use]
    pub fn with_max_labels(mut self, max_labels: usize) -> Self {
        self.max_labels = max_labels;
        self
    }

    /// Set the index construction mode.
    #[must_use]
    pub fn with_index_mode(mut self, mode: IndexMode) -> Self {
        self.index_mode = mode;
        self
    }

    /// Persist the embedding cache at the given path.
    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Persist index snapshots at the given path.
    #[must_use]
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }
}

/// One query's ranked, size-capped prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    /// The queried phrase (surface form as passed in).
    pub phrase: String,
    /// Candidate labels, nearest neighbors contributing first.
    pub labels: Vec<String>,
    /// Whether at least one neighbor fell within the distance threshold.
    pub confident: bool,
}

/// Nearest-neighbor multi-label classifier.
///
/// Each instance owns its embedder cache and its index; independently
/// constructed classifiers share no state.
pub struct Classifier {
    config: ClassifierConfig,
    embedder: Embedder,
    index: FlatIndex,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("config", &self.config)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Create an untrained classifier.
    ///
    /// # Errors
    ///
    /// Fails if a configured embedding cache file exists but cannot be read.
    pub fn new(model: Box<dyn SentenceModel>, config: ClassifierConfig) -> Result<Self> {
        let embedder = match &config.cache_path {
            Some(path) => Embedder::with_cache_file(model, path.clone())?,
            None => Embedder::new(model),
        };
        let index = FlatIndex::new(config.dimension, config.index_mode);

        Ok(Self {
            config,
            embedder,
            index,
        })
    }

    /// Create a classifier from a previously written index snapshot.
    ///
    /// The snapshot's dimension must match `config.dimension`; a snapshot of
    /// differently-sized vectors would make every distance silently wrong.
    /// The restored index follows `config.index_mode`, whatever mode it was
    /// snapshotted with.
    ///
    /// # Errors
    ///
    /// Fails if the configured snapshot path is unset or unreadable, or with
    /// [`crate::EssenceError::DimensionMismatch`] if the snapshot's dimension
    /// differs from the configured one.
    pub fn restore(model: Box<dyn SentenceModel>, config: ClassifierConfig) -> Result<Self> {
        let path = config.snapshot_path.clone().ok_or_else(|| {
            crate::EssenceError::persistence(
                "restoring classifier",
                std::io::Error::new(std::io::ErrorKind::NotFound, "no snapshot path configured"),
            )
        })?;
        let mut index = FlatIndex::restore(&path)?;
        if index.dimension() != config.dimension {
            return Err(crate::EssenceError::DimensionMismatch {
                expected: config.dimension,
                actual: index.dimension(),
            });
        }
        index.set_mode(config.index_mode);

        let mut classifier = Self::new(model, config)?;
        classifier.index = index;
        Ok(classifier)
    }

    /// Embed labeled phrases into the index.
    ///
    /// In [`IndexMode::Incremental`] the index grows and a snapshot is
    /// written when a snapshot path is configured; in [`IndexMode::Rebuild`]
    /// the index is rebuilt from this batch alone and snapshots are skipped
    /// (per-fold throwaway indexes have no restorable value).
    pub fn fit(&mut self, phrases: &[String], label_sets: &[Vec<String>]) -> Result<()> {
        let vectors = self.embedder.embed(phrases)?;
        self.index.add(vectors, label_sets.to_vec())?;

        if self.config.index_mode == IndexMode::Incremental {
            if let Some(path) = &self.config.snapshot_path {
                self.index.snapshot(path)?;
            }
        }

        debug!(indexed = self.index.len(), "fit batch");
        Ok(())
    }

    /// Predict label sets for a batch of phrases.
    ///
    /// `confidence_limit` lies in `[0, 1]` and converts to a distance
    /// threshold `T = 1 − limit`. When at least one of the retrieved
    /// neighbors sits within `T`, only neighbors within `T` contribute
    /// labels; otherwise all retrieved neighbors do. Candidates always come
    /// from the already-retrieved top-k result, never a radius re-query.
    ///
    /// An empty index yields an empty, unconfident prediction per phrase.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::EssenceError::ModelUnavailable`] from embedding.
    pub fn predict(
        &mut self,
        phrases: &[String],
        confidence_limit: f32,
    ) -> Result<Vec<Prediction>> {
        if self.index.is_empty() {
            warn!("predicting against an empty index; no labels are known yet");
        }

        let threshold = 1.0 - confidence_limit;
        let vectors = self.embedder.embed(phrases)?;
        let rows = self.index.search(&vectors, self.config.neighbors)?;

        let predictions = phrases
            .iter()
            .zip(rows)
            .map(|(phrase, row)| {
                let confident = row.iter().any(|(d, _)| *d <= threshold);
                let labels = if confident {
                    top_labels(
                        row.iter().filter(|(d, _)| *d <= threshold).map(|(_, l)| *l),
                        self.config.max_labels,
                    )
                } else {
                    top_labels(row.iter().map(|(_, l)| *l), self.config.max_labels)
                };

                Prediction {
                    phrase: phrase.clone(),
                    labels,
                    confident,
                }
            })
            .collect();

        Ok(predictions)
    }

    /// Whether the index holds any training examples.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        !self.index.is_empty()
    }

    /// Number of indexed training examples.
    #[must_use]
    pub fn indexed_len(&self) -> usize {
        self.index.len()
    }

    /// The classifier configuration.
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

/// Union label sets in rank order, keeping first-seen order, capped at `cap`.
///
/// Nearer neighbors contribute first, so the cap preferentially keeps labels
/// from closer matches. The accumulation is insertion-ordered on purpose:
/// the cap boundary is order-sensitive and must not depend on hash iteration.
fn top_labels<'a>(sets: impl Iterator<Item = &'a [String]>, cap: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for set in sets {
        for label in set {
            if out.len() >= cap {
                return out;
            }
            if !out.contains(label) {
                out.push(label.clone());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EssenceError;
    use std::collections::HashMap;

    /// Stub model mapping fixed phrases to fixed unit vectors.
    struct TableModel {
        table: HashMap<String, Vec<f32>>,
    }

    impl TableModel {
        fn new(entries: &[(&str, Vec<f32>)]) -> Self {
            let table = entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
            Self { table }
        }
    }

    impl SentenceModel for TableModel {
        fn sentence_vector(&self, phrase: &str) -> Result<Vec<f32>> {
            self.table
                .get(phrase)
                .cloned()
                .ok_or_else(|| EssenceError::ModelUnavailable(format!("no vector for {phrase}")))
        }
    }

    /// Unit vector at squared distance `d` from `(1, 0)`.
    fn unit_at(d: f32) -> Vec<f32> {
        let cos = 1.0 - d / 2.0;
        vec![cos, (1.0 - cos * cos).sqrt()]
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Training set from the perfumery scenario: three phrases whose vectors
    /// sit at squared distances ~0.04, ~0.08, ~0.9 from the query.
    fn scenario_classifier() -> Classifier {
        let model = TableModel::new(&[
            ("p1", unit_at(0.04)),
            ("p2", unit_at(0.08)),
            ("p3", unit_at(0.9)),
            ("q", vec![1.0, 0.0]),
        ]);
        let config = ClassifierConfig::new().with_dimension(2);
        let mut classifier = Classifier::new(Box::new(model), config).unwrap();
        classifier
            .fit(
                &strings(&["p1", "p2", "p3"]),
                &[
                    strings(&["rose"]),
                    strings(&["rose", "floral"]),
                    strings(&["citrus"]),
                ],
            )
            .unwrap();
        classifier
    }

    #[test]
    fn strict_limit_keeps_only_close_neighbors() {
        let mut classifier = scenario_classifier();
        let out = classifier.predict(&strings(&["q"]), 0.95).unwrap();

        assert!(out[0].confident);
        assert_eq!(out[0].labels, strings(&["rose"]));
    }

    #[test]
    fn permissive_limit_aggregates_all_neighbors_in_rank_order() {
        let mut classifier = scenario_classifier();
        let out = classifier.predict(&strings(&["q"]), 0.0).unwrap();

        assert!(out[0].confident);
        assert_eq!(out[0].labels, strings(&["rose", "floral", "citrus"]));
    }

    #[test]
    fn unconfident_branch_uses_all_neighbors() {
        // Threshold 0 and no exact-distance-0 neighbor: the gate fails but
        // all retrieved neighbors still contribute labels.
        let mut classifier = scenario_classifier();
        let out = classifier.predict(&strings(&["q"]), 1.0).unwrap();

        assert!(!out[0].confident);
        assert_eq!(out[0].labels, strings(&["rose", "floral", "citrus"]));
    }

    #[test]
    fn all_far_neighbors_fall_back_to_unconfident_branch() {
        // Every neighbor sits beyond squared distance 1, so even the most
        // permissive limit fails the gate and all neighbors contribute.
        let model = TableModel::new(&[
            ("opposite", unit_at(3.0)),
            ("sideways", unit_at(2.0)),
            ("q", vec![1.0, 0.0]),
        ]);
        let config = ClassifierConfig::new().with_dimension(2);
        let mut classifier = Classifier::new(Box::new(model), config).unwrap();
        classifier
            .fit(
                &strings(&["opposite", "sideways"]),
                &[strings(&["a"]), strings(&["b"])],
            )
            .unwrap();

        let out = classifier.predict(&strings(&["q"]), 0.0).unwrap();
        assert!(!out[0].confident);
        assert_eq!(out[0].labels, strings(&["b", "a"]));
    }

    #[test]
    fn exact_match_gates_at_limit_one() {
        let mut classifier = scenario_classifier();
        // p1 is indexed, so querying it finds a distance-0 neighbor.
        let out = classifier.predict(&strings(&["p1"]), 1.0).unwrap();

        assert!(out[0].confident);
        assert_eq!(out[0].labels, strings(&["rose"]));
    }

    #[test]
    fn label_cap_prefers_nearer_neighbors() {
        let model = TableModel::new(&[
            ("near", unit_at(0.02)),
            ("far", unit_at(0.5)),
            ("q", vec![1.0, 0.0]),
        ]);
        let config = ClassifierConfig::new().with_dimension(2).with_max_labels(3);
        let mut classifier = Classifier::new(Box::new(model), config).unwrap();
        classifier
            .fit(
                &strings(&["near", "far"]),
                &[strings(&["a", "b"]), strings(&["c", "d", "e"])],
            )
            .unwrap();

        let out = classifier.predict(&strings(&["q"]), 0.0).unwrap();
        assert_eq!(out[0].labels, strings(&["a", "b", "c"]));
    }

    #[test]
    fn duplicate_labels_across_neighbors_collapse() {
        let model = TableModel::new(&[
            ("x", unit_at(0.02)),
            ("y", unit_at(0.06)),
            ("q", vec![1.0, 0.0]),
        ]);
        let config = ClassifierConfig::new().with_dimension(2);
        let mut classifier = Classifier::new(Box::new(model), config).unwrap();
        classifier
            .fit(
                &strings(&["x", "y"]),
                &[strings(&["rose"]), strings(&["rose", "woody"])],
            )
            .unwrap();

        let out = classifier.predict(&strings(&["q"]), 0.0).unwrap();
        assert_eq!(out[0].labels, strings(&["rose", "woody"]));
    }

    #[test]
    fn empty_index_predicts_no_labels() {
        let model = TableModel::new(&[("q", vec![1.0, 0.0])]);
        let config = ClassifierConfig::new().with_dimension(2);
        let mut classifier = Classifier::new(Box::new(model), config).unwrap();

        let out = classifier.predict(&strings(&["q"]), 0.5).unwrap();
        assert!(!classifier.is_trained());
        assert!(out[0].labels.is_empty());
        assert!(!out[0].confident);
    }

    #[test]
    fn embedding_failure_propagates() {
        let model = TableModel::new(&[]);
        let config = ClassifierConfig::new().with_dimension(2);
        let mut classifier = Classifier::new(Box::new(model), config).unwrap();

        let err = classifier.predict(&strings(&["unknown"]), 0.5).unwrap_err();
        assert!(matches!(err, EssenceError::ModelUnavailable(_)));
    }

    #[test]
    fn rebuild_mode_fit_discards_previous_fold() {
        let model = TableModel::new(&[
            ("p1", unit_at(0.04)),
            ("p3", unit_at(0.9)),
            ("q", vec![1.0, 0.0]),
        ]);
        let config = ClassifierConfig::new()
            .with_dimension(2)
            .with_index_mode(IndexMode::Rebuild);
        let mut classifier = Classifier::new(Box::new(model), config).unwrap();

        classifier
            .fit(&strings(&["p1"]), &[strings(&["rose"])])
            .unwrap();
        classifier
            .fit(&strings(&["p3"]), &[strings(&["citrus"])])
            .unwrap();

        assert_eq!(classifier.indexed_len(), 1);
        let out = classifier.predict(&strings(&["q"]), 0.0).unwrap();
        assert_eq!(out[0].labels, strings(&["citrus"]));
    }

    #[test]
    fn snapshot_restores_into_equivalent_classifier() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("index.json");

        let entries: Vec<(&str, Vec<f32>)> = vec![
            ("p1", unit_at(0.04)),
            ("p2", unit_at(0.08)),
            ("p3", unit_at(0.9)),
            ("q", vec![1.0, 0.0]),
        ];
        let config = ClassifierConfig::new()
            .with_dimension(2)
            .with_snapshot_path(&snapshot);

        let mut trained =
            Classifier::new(Box::new(TableModel::new(&entries)), config.clone()).unwrap();
        trained
            .fit(
                &strings(&["p1", "p2", "p3"]),
                &[
                    strings(&["rose"]),
                    strings(&["rose", "floral"]),
                    strings(&["citrus"]),
                ],
            )
            .unwrap();

        let mut restored =
            Classifier::restore(Box::new(TableModel::new(&entries)), config).unwrap();
        assert_eq!(restored.indexed_len(), 3);
        assert_eq!(
            trained.predict(&strings(&["q"]), 0.95).unwrap(),
            restored.predict(&strings(&["q"]), 0.95).unwrap()
        );
    }

    #[test]
    fn restore_rejects_mismatched_dimension() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("index.json");

        let entries: Vec<(&str, Vec<f32>)> = vec![("p1", unit_at(0.04))];
        let config = ClassifierConfig::new()
            .with_dimension(2)
            .with_snapshot_path(&snapshot);
        let mut trained =
            Classifier::new(Box::new(TableModel::new(&entries)), config.clone()).unwrap();
        trained
            .fit(&strings(&["p1"]), &[strings(&["rose"])])
            .unwrap();

        let err = Classifier::restore(
            Box::new(TableModel::new(&entries)),
            config.with_dimension(3),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EssenceError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn restore_adopts_configured_index_mode() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("index.json");

        let entries: Vec<(&str, Vec<f32>)> = vec![
            ("p1", unit_at(0.04)),
            ("p3", unit_at(0.9)),
            ("q", vec![1.0, 0.0]),
        ];
        let config = ClassifierConfig::new()
            .with_dimension(2)
            .with_snapshot_path(&snapshot);
        let mut trained =
            Classifier::new(Box::new(TableModel::new(&entries)), config.clone()).unwrap();
        trained
            .fit(&strings(&["p1"]), &[strings(&["rose"])])
            .unwrap();

        // Snapshotted as Incremental, restored as Rebuild: the next fit
        // replaces the restored contents instead of appending to them.
        let mut restored = Classifier::restore(
            Box::new(TableModel::new(&entries)),
            config.with_index_mode(IndexMode::Rebuild),
        )
        .unwrap();
        restored
            .fit(&strings(&["p3"]), &[strings(&["citrus"])])
            .unwrap();

        assert_eq!(restored.indexed_len(), 1);
        let out = restored.predict(&strings(&["q"]), 0.0).unwrap();
        assert_eq!(out[0].labels, strings(&["citrus"]));
    }

    #[test]
    fn config_builder() {
        let config = ClassifierConfig::new()
            .with_dimension(128)
            .with_neighbors(5)
            .with_max_labels(3)
            .with_index_mode(IndexMode::Rebuild);

        assert_eq!(config.dimension, 128);
        assert_eq!(config.neighbors, 5);
        assert_eq!(config.max_labels, 3);
        assert_eq!(config.index_mode, IndexMode::Rebuild);
        assert!(config.cache_path.is_none());
    }
}
