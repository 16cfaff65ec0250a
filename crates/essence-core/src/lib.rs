//! # Essence Core
//!
//! Nearest-neighbor multi-label phrase classification. Phrases are embedded
//! into a fixed-size vector space by an external [`embed::SentenceModel`],
//! cached, and indexed in a flat similarity index; prediction retrieves the
//! nearest labeled neighbors and aggregates their label sets under a
//! caller-supplied confidence limit. Multi-label precision/recall/F1 live in
//! [`metrics`].
//!
//! ## Quick Start
//!
//! ```rust
//! use essence_core::{Classifier, ClassifierConfig, SentenceModel};
//!
//! struct ToyModel;
//!
//! impl SentenceModel for ToyModel {
//!     fn sentence_vector(&self, phrase: &str) -> essence_core::Result<Vec<f32>> {
//!         // Real deployments load a 300-dim sentence-vector model instead.
//!         let mut v = vec![0.0f32; 4];
//!         for (i, b) in phrase.bytes().enumerate() {
//!             v[i % 4] += b as f32;
//!         }
//!         Ok(v)
//!     }
//! }
//!
//! let config = ClassifierConfig::new().with_dimension(4);
//! let mut classifier = Classifier::new(Box::new(ToyModel), config).unwrap();
//! classifier
//!     .fit(&["rose water".into()], &[vec!["floral".into()]])
//!     .unwrap();
//!
//! let out = classifier.predict(&["rose water".into()], 0.9).unwrap();
//! assert_eq!(out[0].labels, vec!["floral".to_string()]);
//! assert!(out[0].confident);
//! ```
pub mod classifier;
pub mod embed;
pub mod error;
pub mod index;
pub mod metrics;

mod persist;

// Re-export primary API
pub use classifier::{
    Classifier, ClassifierConfig, DEFAULT_MAX_LABELS, DEFAULT_NEIGHBORS, Prediction,
};
pub use embed::{EMBEDDING_DIM, Embedder, SentenceModel, normalize_phrase};
pub use error::{EssenceError, Result};
pub use index::{FlatIndex, IndexMode};
pub use metrics::{Averaging, MetricsRecord, score};
