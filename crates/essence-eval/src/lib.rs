//! # Essence Eval
//!
//! Leave-one-out evaluation for the essence phrase classifier: loads a
//! grouped multi-label training set, repeatedly retrains and re-scores the
//! classifier with one phrase held out per fold, and writes the accumulated
//! prediction and metric tables as TSV.

pub mod dataset;
pub mod harness;
pub mod model;

// Re-export primary API
pub use dataset::{LabeledPhrase, group_rows, load_training_set};
pub use harness::{LeaveOneOut, MetricsRow, PredictionRow};
pub use model::WordVectorModel;
