//! Labeled dataset loading for evaluation runs.
//!
//! The training input is a tab-separated file of `phrase`, `subtopic`, and
//! `frequency` rows. Rows are grouped by normalized phrase into one
//! multi-label example each, ordered by total frequency descending so the
//! most common phrases fold first.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use essence_core::normalize_phrase;

/// One unique phrase with its full set of true categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledPhrase {
    /// Normalized phrase text.
    pub phrase: String,
    /// De-duplicated categories, first-seen order.
    pub labels: Vec<String>,
    /// Total frequency across the grouped rows. Used only for ordering.
    pub frequency: u64,
}

/// Load a training set from a TSV file of `phrase \t subtopic \t frequency`
/// rows.
///
/// Blank lines and `#` comment lines are skipped; a missing frequency column
/// counts as 1. Rows sharing a normalized phrase are grouped into one
/// multi-label example.
pub fn load_training_set<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<LabeledPhrase>> {
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            continue;
        }

        let phrase = parts[0].to_string();
        let subtopic = parts[1].to_string();
        let frequency = parts
            .get(2)
            .and_then(|f| f.trim().parse::<u64>().ok())
            .unwrap_or(1);

        rows.push((phrase, subtopic, frequency));
    }

    Ok(group_rows(rows))
}

/// Group raw `(phrase, subtopic, frequency)` rows into labeled examples.
///
/// Phrases are normalized before grouping; duplicate subtopics collapse.
/// Output is ordered by total frequency descending, grouping order breaking
/// ties.
pub fn group_rows(rows: impl IntoIterator<Item = (String, String, u64)>) -> Vec<LabeledPhrase> {
    let mut grouped: Vec<LabeledPhrase> = Vec::new();

    for (phrase, subtopic, frequency) in rows {
        let phrase = normalize_phrase(&phrase);
        if phrase.is_empty() {
            continue;
        }

        match grouped.iter_mut().find(|e| e.phrase == phrase) {
            Some(entry) => {
                if !entry.labels.contains(&subtopic) {
                    entry.labels.push(subtopic);
                }
                entry.frequency += frequency;
            }
            None => grouped.push(LabeledPhrase {
                phrase,
                labels: vec![subtopic],
                frequency,
            }),
        }
    }

    grouped.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    grouped
}
