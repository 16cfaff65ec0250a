//! # Leave-One-Out Harness
//!
//! Drives repeated train/predict/score cycles: each fold holds out one
//! labeled phrase, rebuilds the classifier's index from the remaining
//! examples, predicts the held-out phrase, and scores the prediction. Fold
//! results accumulate into two tables — flattened prediction rows and
//! per-fold metric rows — written as TSV at the end of the run.
//!
//! N folds each rebuild an N−1 index, so the run is O(N²). That is fine for
//! evaluation sets of hundreds of phrases and a ceiling beyond that.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, ensure};
use tracing::{debug, info};

use essence_core::{Averaging, Classifier, IndexMode, score};

use crate::dataset::LabeledPhrase;

/// One `(phrase, predicted_label, true_label)` row, exploded from the
/// prediction/true cross-product for downstream analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRow {
    pub phrase: String,
    pub predicted_label: String,
    pub true_label: String,
}

/// Per-fold metrics tagged with the held-out phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub phrase: String,
    pub f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub validation_size: usize,
}

/// Leave-one-out evaluation over a fixed training set.
pub struct LeaveOneOut {
    training: Vec<LabeledPhrase>,
    predictions: Vec<PredictionRow>,
    metrics: Vec<MetricsRow>,
}

impl LeaveOneOut {
    /// Create a harness over a de-duplicated, multi-label training set.
    #[must_use]
    pub fn new(training: Vec<LabeledPhrase>) -> Self {
        Self {
            training,
            predictions: Vec::new(),
            metrics: Vec::new(),
        }
    }

    /// Run all folds with the given confidence limit.
    ///
    /// The classifier must be in [`IndexMode::Rebuild`] so each fold's `fit`
    /// discards the previous fold's index entirely. A failed embedding call
    /// aborts the whole run; no partial fold is recorded.
    pub fn run(
        &mut self,
        classifier: &mut Classifier,
        limit: f32,
        averaging: Averaging,
    ) -> anyhow::Result<()> {
        ensure!(
            classifier.config().index_mode == IndexMode::Rebuild,
            "leave-one-out requires a Rebuild-mode classifier"
        );

        let n = self.training.len();
        info!(folds = n, limit, "starting leave-one-out run");

        for i in 0..n {
            let held_out = self.training[i].clone();

            let mut phrases = Vec::with_capacity(n - 1);
            let mut label_sets = Vec::with_capacity(n - 1);
            for (j, example) in self.training.iter().enumerate() {
                if j != i {
                    phrases.push(example.phrase.clone());
                    label_sets.push(example.labels.clone());
                }
            }

            classifier
                .fit(&phrases, &label_sets)
                .with_context(|| format!("training fold {i}"))?;

            let prediction = classifier
                .predict(std::slice::from_ref(&held_out.phrase), limit)
                .with_context(|| format!("predicting fold {i}"))?
                .remove(0);

            let record = score(
                std::slice::from_ref(&held_out.labels),
                std::slice::from_ref(&prediction.labels),
                averaging,
            );
            debug!(
                fold = i,
                phrase = %held_out.phrase,
                f1 = record.f1,
                confident = prediction.confident,
                "scored fold"
            );

            self.explode_prediction(&held_out, &prediction.labels);
            self.metrics.push(MetricsRow {
                phrase: held_out.phrase,
                f1: record.f1,
                precision: record.precision,
                recall: record.recall,
                validation_size: record.validation_size,
            });
        }

        let mean_f1 = if n == 0 {
            0.0
        } else {
            self.metrics.iter().map(|m| m.f1).sum::<f64>() / n as f64
        };
        info!(folds = n, mean_f1, "leave-one-out run complete");
        Ok(())
    }

    /// Flatten one fold into the predictions table: one row per
    /// predicted/true label pair. An empty prediction still produces rows,
    /// with an empty predicted cell, so every fold stays visible.
    fn explode_prediction(&mut self, held_out: &LabeledPhrase, predicted: &[String]) {
        let empty = [String::new()];
        let predicted: &[String] = if predicted.is_empty() {
            &empty
        } else {
            predicted
        };

        for predicted_label in predicted {
            for true_label in &held_out.labels {
                self.predictions.push(PredictionRow {
                    phrase: held_out.phrase.clone(),
                    predicted_label: predicted_label.clone(),
                    true_label: true_label.clone(),
                });
            }
        }
    }

    /// Accumulated prediction rows.
    #[must_use]
    pub fn predictions(&self) -> &[PredictionRow] {
        &self.predictions
    }

    /// Accumulated per-fold metric rows.
    #[must_use]
    pub fn metrics(&self) -> &[MetricsRow] {
        &self.metrics
    }

    /// Write both accumulated tables as TSV into `dir`, named after the
    /// confidence limit. Returns the two file paths.
    pub fn write_tables(&self, dir: &Path, limit: f32) -> anyhow::Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;

        let predictions_path = dir.join(format!("{limit}_predictions.tsv"));
        let mut out = BufWriter::new(fs::File::create(&predictions_path)?);
        writeln!(out, "phrase\tpredicted_label\ttrue_label")?;
        for row in &self.predictions {
            writeln!(
                out,
                "{}\t{}\t{}",
                row.phrase, row.predicted_label, row.true_label
            )?;
        }
        out.flush()?;

        let metrics_path = dir.join(format!("{limit}_metrics.tsv"));
        let mut out = BufWriter::new(fs::File::create(&metrics_path)?);
        writeln!(out, "phrase\tf1\tprecision\trecall\tvalidation_size")?;
        for row in &self.metrics {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                row.phrase, row.f1, row.precision, row.recall, row.validation_size
            )?;
        }
        out.flush()?;

        info!(
            predictions = self.predictions.len(),
            metrics = self.metrics.len(),
            dir = %dir.display(),
            "wrote evaluation tables"
        );
        Ok((predictions_path, metrics_path))
    }
}
