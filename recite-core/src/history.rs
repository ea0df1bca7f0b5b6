//! Append-only practice history with derived statistics
//!
//! Results are persisted as one JSON document under a single storage key.
//! Every append is written through before it becomes visible to readers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::storage::{KEY_PRACTICE_HISTORY, Storage};
use crate::types::{PracticeDifficulty, PracticeResult};

/// Current on-disk format version
pub const HISTORY_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct HistoryEnvelopeRef<'a> {
    version: u32,
    results: &'a [PracticeResult],
}

#[derive(Deserialize)]
struct HistoryEnvelope {
    version: u32,
    results: Vec<PracticeResult>,
}

/// Aggregates over the recorded history
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PracticeStats {
    pub count: usize,
    pub mean_score: u8,
    pub best_score: u8,
    pub by_difficulty: Vec<DifficultyStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyStats {
    pub difficulty: PracticeDifficulty,
    pub count: usize,
    pub mean_score: u8,
}

/// Integer mean rounded to nearest, halves up; 0 for no scores
pub fn mean_score<'a>(scores: impl IntoIterator<Item = &'a u8>) -> u8 {
    let (sum, n) = scores
        .into_iter()
        .fold((0u64, 0u64), |(sum, n), s| (sum + u64::from(*s), n + 1));
    if n == 0 {
        return 0;
    }
    ((sum * 2 + n) / (n * 2)) as u8
}

/// Decode a stored history document, versioned or legacy
fn decode_history(raw: &str) -> Result<Vec<PracticeResult>> {
    let value: Value = serde_json::from_str(raw)?;

    if value.is_array() {
        debug!("Reading unversioned history array");
        return Ok(serde_json::from_value(value)?);
    }

    let envelope: HistoryEnvelope = serde_json::from_value(value)?;
    if envelope.version > HISTORY_FORMAT_VERSION {
        return Err(Error::MalformedPayload(format!(
            "history format version {} is newer than supported {}",
            envelope.version, HISTORY_FORMAT_VERSION
        )));
    }
    Ok(envelope.results)
}

/// Durable, append-only log of practice results
pub struct HistoryStore {
    storage: Arc<Storage>,
    results: RwLock<Vec<PracticeResult>>,
}

impl HistoryStore {
    /// Load history from storage
    pub fn open(storage: Arc<Storage>) -> Result<Self> {
        let results = match storage.get_value(KEY_PRACTICE_HISTORY)? {
            Some(raw) => decode_history(&raw)?,
            None => Vec::new(),
        };

        info!("Loaded {} practice results", results.len());

        Ok(Self {
            storage,
            results: RwLock::new(results),
        })
    }

    /// Persist `result`, then make it visible. Nothing changes if persisting fails.
    pub fn append(&self, result: PracticeResult) -> Result<()> {
        let mut results = self.results.write();

        let mut next = Vec::with_capacity(results.len() + 1);
        next.extend_from_slice(&results);
        next.push(result);

        let encoded = serde_json::to_string(&HistoryEnvelopeRef {
            version: HISTORY_FORMAT_VERSION,
            results: &next,
        })?;
        self.storage.set_value(KEY_PRACTICE_HISTORY, &encoded)?;

        *results = next;
        debug!("Recorded practice result #{}", results.len());
        Ok(())
    }

    /// All results, oldest first
    pub fn results(&self) -> Vec<PracticeResult> {
        self.results.read().clone()
    }

    /// Most recent `limit` results, newest first
    pub fn recent(&self, limit: usize) -> Vec<PracticeResult> {
        self.results
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.results.read().len()
    }

    /// Mean score over all results; 0 when empty
    pub fn mean_score(&self) -> u8 {
        mean_score(self.results.read().iter().map(|r| &r.score))
    }

    pub fn stats(&self) -> PracticeStats {
        let results = self.results.read();

        let mut grouped: HashMap<PracticeDifficulty, Vec<u8>> = HashMap::new();
        for result in results.iter() {
            grouped.entry(result.difficulty).or_default().push(result.score);
        }

        let by_difficulty = PracticeDifficulty::all()
            .iter()
            .filter_map(|difficulty| {
                grouped.get(difficulty).map(|scores| DifficultyStats {
                    difficulty: *difficulty,
                    count: scores.len(),
                    mean_score: mean_score(scores),
                })
            })
            .collect();

        PracticeStats {
            count: results.len(),
            mean_score: mean_score(results.iter().map(|r| &r.score)),
            best_score: results.iter().map(|r| r.score).max().unwrap_or(0),
            by_difficulty,
        }
    }
}
