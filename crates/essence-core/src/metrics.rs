//! # Multi-Label Metrics
//!
//! Precision, recall, and F1 over batches of true/predicted label sets,
//! binarized against the classes observed in the batch. The zero-division
//! conventions are asymmetric on purpose: a class with no predicted
//! positives scores precision 1 (silence is not penalized) while a class
//! with no true positives scores recall 0.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Strategy for collapsing per-class scores into one scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Averaging {
    /// Average per-sample scores.
    Samples,
    /// Average per-class scores weighted by true support.
    Weighted,
    /// Average per-class scores equally.
    Macro,
    /// Pool true/false positive counts across classes first.
    Micro,
}

impl fmt::Display for Averaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Samples => "samples",
            Self::Weighted => "weighted",
            Self::Macro => "macro",
            Self::Micro => "micro",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Averaging {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "samples" => Ok(Self::Samples),
            "weighted" => Ok(Self::Weighted),
            "macro" => Ok(Self::Macro),
            "micro" => Ok(Self::Micro),
            other => Err(format!(
                "unknown averaging mode {other:?} (expected samples, weighted, macro, or micro)"
            )),
        }
    }
}

/// Scalar metrics for one scored batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// F1 score under the resolved averaging mode.
    pub f1: f64,
    /// Precision (zero-division resolves to 1).
    pub precision: f64,
    /// Recall (zero-division resolves to 0).
    pub recall: f64,
    /// Number of samples in the batch.
    pub validation_size: usize,
    /// The averaging mode actually applied.
    pub averaging: Averaging,
}

/// Score predicted label sets against true label sets.
///
/// The class universe is the union of all labels observed on either side of
/// the batch. A single-class universe forces [`Averaging::Weighted`]
/// regardless of the requested mode, since sample and macro averaging
/// degenerate there.
#[must_use]
pub fn score(y_true: &[Vec<String>], y_pred: &[Vec<String>], averaging: Averaging) -> MetricsRecord {
    debug_assert_eq!(y_true.len(), y_pred.len());
    let n = y_true.len();

    let classes = observed_classes(y_true, y_pred);
    let averaging = if classes.len() == 1 {
        Averaging::Weighted
    } else {
        averaging
    };

    let true_sets: Vec<HashSet<&str>> = y_true.iter().map(|v| as_set(v)).collect();
    let pred_sets: Vec<HashSet<&str>> = y_pred.iter().map(|v| as_set(v)).collect();

    let (precision, recall, f1) = match averaging {
        Averaging::Samples => samples_average(&true_sets, &pred_sets),
        Averaging::Weighted => class_average(&classes, &true_sets, &pred_sets, true),
        Averaging::Macro => class_average(&classes, &true_sets, &pred_sets, false),
        Averaging::Micro => micro_average(&classes, &true_sets, &pred_sets),
    };

    MetricsRecord {
        f1,
        precision,
        recall,
        validation_size: n,
        averaging,
    }
}

/// Union of all labels on either side, first-seen order.
fn observed_classes(y_true: &[Vec<String>], y_pred: &[Vec<String>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut classes = Vec::new();
    for set in y_true.iter().chain(y_pred) {
        for label in set {
            if seen.insert(label.as_str()) {
                classes.push(label.clone());
            }
        }
    }
    classes
}

fn as_set(labels: &[String]) -> HashSet<&str> {
    labels.iter().map(String::as_str).collect()
}

/// Per-class true/false positive and false negative counts.
fn class_counts(class: &str, true_sets: &[HashSet<&str>], pred_sets: &[HashSet<&str>]) -> Counts {
    let mut counts = Counts::default();
    for (t, p) in true_sets.iter().zip(pred_sets) {
        let in_true = t.contains(class);
        let in_pred = p.contains(class);
        match (in_true, in_pred) {
            (true, true) => counts.tp += 1,
            (false, true) => counts.fp += 1,
            (true, false) => counts.fn_ += 1,
            (false, false) => {}
        }
    }
    counts
}

#[derive(Default, Clone, Copy)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl Counts {
    // zero_division=1 for precision: no predicted positives is not a miss.
    fn precision(self) -> f64 {
        divide(self.tp, self.tp + self.fp, 1.0)
    }

    // zero_division=0 for recall: no true positives means nothing recalled.
    fn recall(self) -> f64 {
        divide(self.tp, self.tp + self.fn_, 0.0)
    }

    fn f1(self) -> f64 {
        divide(2 * self.tp, 2 * self.tp + self.fp + self.fn_, 0.0)
    }

    fn support(self) -> usize {
        self.tp + self.fn_
    }
}

fn divide(numerator: usize, denominator: usize, zero_division: f64) -> f64 {
    if denominator == 0 {
        zero_division
    } else {
        numerator as f64 / denominator as f64
    }
}

fn class_average(
    classes: &[String],
    true_sets: &[HashSet<&str>],
    pred_sets: &[HashSet<&str>],
    weighted: bool,
) -> (f64, f64, f64) {
    let counts: Vec<Counts> = classes
        .iter()
        .map(|c| class_counts(c, true_sets, pred_sets))
        .collect();

    if weighted {
        let total: usize = counts.iter().map(|c| c.support()).sum();
        if total == 0 {
            // No true labels anywhere: the zero-division conventions apply.
            return (1.0, 0.0, 0.0);
        }
        let weight = |f: fn(Counts) -> f64| {
            counts
                .iter()
                .map(|&c| f(c) * c.support() as f64)
                .sum::<f64>()
                / total as f64
        };
        (
            weight(Counts::precision),
            weight(Counts::recall),
            weight(Counts::f1),
        )
    } else {
        if classes.is_empty() {
            return (1.0, 0.0, 0.0);
        }
        let mean = |f: fn(Counts) -> f64| {
            counts.iter().map(|&c| f(c)).sum::<f64>() / counts.len() as f64
        };
        (
            mean(Counts::precision),
            mean(Counts::recall),
            mean(Counts::f1),
        )
    }
}

fn micro_average(
    classes: &[String],
    true_sets: &[HashSet<&str>],
    pred_sets: &[HashSet<&str>],
) -> (f64, f64, f64) {
    let mut pooled = Counts::default();
    for class in classes {
        let c = class_counts(class, true_sets, pred_sets);
        pooled.tp += c.tp;
        pooled.fp += c.fp;
        pooled.fn_ += c.fn_;
    }
    (pooled.precision(), pooled.recall(), pooled.f1())
}

fn samples_average(true_sets: &[HashSet<&str>], pred_sets: &[HashSet<&str>]) -> (f64, f64, f64) {
    let n = true_sets.len();
    if n == 0 {
        return (1.0, 0.0, 0.0);
    }

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for (t, p) in true_sets.iter().zip(pred_sets) {
        let intersection = t.intersection(p).count();
        precision += divide(intersection, p.len(), 1.0);
        recall += divide(intersection, t.len(), 0.0);
        f1 += divide(2 * intersection, t.len() + p.len(), 0.0);
    }

    (precision / n as f64, recall / n as f64, f1 / n as f64)
}
