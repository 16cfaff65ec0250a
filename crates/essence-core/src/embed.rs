//! # Sentence Embedder
//!
//! Wraps an external sentence-embedding model behind the [`SentenceModel`]
//! trait, unit-normalizes its output, and caches phrase vectors so repeated
//! phrases are never re-embedded. The cache is flushed to disk after every
//! successful batch.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::persist;

/// Embedding dimensionality used throughout the crate.
pub const EMBEDDING_DIM: usize = 300;

/// External sentence-embedding collaborator.
///
/// Loaded once at startup and treated as a black box: given a normalized
/// phrase it returns a raw fixed-dimension vector. Failures surface as
/// [`crate::EssenceError::ModelUnavailable`].
pub trait SentenceModel {
    /// Embed a single normalized phrase into a raw (not yet unit-length)
    /// vector.
    fn sentence_vector(&self, phrase: &str) -> Result<Vec<f32>>;
}

/// Normalize a phrase's surface form: lowercase, hyphen to space, trim.
///
/// This is the cache key for every embedding lookup, so callers and the
/// embedder must agree on it.
///
/// # Examples
/// ```
/// use essence_core::embed::normalize_phrase;
///
/// assert_eq!(normalize_phrase("  Rose-Water "), "rose water");
/// ```
pub fn normalize_phrase(text: &str) -> String {
    text.replace('-', " ").to_lowercase().trim().to_string()
}

/// Scale a vector to unit L2 length. A zero vector is returned unchanged.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Caching embedder over an external [`SentenceModel`].
///
/// Each instance owns its cache; two independently constructed embedders
/// share no state. A phrase's vector is stable once cached: hits are returned
/// unchanged and never recomputed.
pub struct Embedder {
    model: Box<dyn SentenceModel>,
    cache: HashMap<String, Vec<f32>>,
    cache_path: Option<PathBuf>,
}

impl Embedder {
    /// Create an embedder with no persistent cache file.
    pub fn new(model: Box<dyn SentenceModel>) -> Self {
        Self {
            model,
            cache: HashMap::new(),
            cache_path: None,
        }
    }

    /// Create an embedder backed by a cache file.
    ///
    /// If the file exists it is loaded eagerly; otherwise it is created on
    /// the first successful [`embed`](Self::embed) call.
    ///
    /// # Errors
    ///
    /// Returns a persistence or serialization error if an existing cache
    /// file cannot be read.
    pub fn with_cache_file(model: Box<dyn SentenceModel>, path: PathBuf) -> Result<Self> {
        let cache = if path.exists() {
            let cache: HashMap<String, Vec<f32>> = persist::load_json(&path)?;
            debug!(entries = cache.len(), path = %path.display(), "loaded embedding cache");
            cache
        } else {
            HashMap::new()
        };

        Ok(Self {
            model,
            cache,
            cache_path: Some(path),
        })
    }

    /// Embed a batch of phrases, returning one unit-length vector per phrase.
    ///
    /// Phrases are normalized before lookup. Cache misses invoke the model;
    /// if any model call fails the whole batch fails and nothing new is
    /// cached. After a successful batch the full cache is flushed to disk
    /// (durability over throughput — one flush per call is intentional).
    pub fn embed(&mut self, phrases: &[String]) -> Result<Vec<Vec<f32>>> {
        // Stage fresh vectors separately so a mid-batch model failure
        // leaves the cache untouched.
        let mut staged: HashMap<String, Vec<f32>> = HashMap::new();
        let mut out = Vec::with_capacity(phrases.len());

        for phrase in phrases {
            let key = normalize_phrase(phrase);
            if let Some(vector) = self.cache.get(&key).or_else(|| staged.get(&key)) {
                out.push(vector.clone());
                continue;
            }

            let mut vector = self.model.sentence_vector(&key)?;
            l2_normalize(&mut vector);
            out.push(vector.clone());
            staged.insert(key, vector);
        }

        let fresh = staged.len();
        self.cache.extend(staged);

        if let Some(path) = &self.cache_path {
            persist::save_json(path, &self.cache)?;
            debug!(fresh, total = self.cache.len(), "flushed embedding cache");
        }

        Ok(out)
    }

    /// Number of phrases currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Look up the cached vector for a phrase, if any.
    pub fn cached(&self, phrase: &str) -> Option<&[f32]> {
        self.cache.get(&normalize_phrase(phrase)).map(Vec::as_slice)
    }
}
