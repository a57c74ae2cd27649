//! Recorded runs and deterministic replay validation
//!
//! Same ticks in the same order must produce the same update stream. A run
//! records every published `CandleUpdate`, digests the serialized stream
//! with SHA-256 and can be replayed into a fresh engine for comparison.

use std::sync::Arc;

use footprint_engine::{CandlePublisher, EngineConfig, FootprintEngine};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};
use types::bucket::FootprintKey;
use types::candle::{CandleUpdate, FootprintCandle};
use types::errors::ConfigError;
use types::tick::Tick;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Engine configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Keeps every update in publish order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    updates: Mutex<Vec<CandleUpdate>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.lock().is_empty()
    }

    /// Drain the recorded stream.
    pub fn take(&self) -> Vec<CandleUpdate> {
        std::mem::take(&mut *self.updates.lock())
    }
}

impl CandlePublisher for RecordingPublisher {
    fn publish(&self, update: &CandleUpdate) {
        self.updates.lock().push(update.clone());
    }
}

/// SHA-256 over the JSON form of each update, in order.
pub fn stream_digest(updates: &[CandleUpdate]) -> Result<String, ReplayError> {
    let mut hasher = Sha256::new();
    for update in updates {
        hasher.update(serde_json::to_vec(update)?);
        hasher.update(b"\n");
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// A recorded run of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedRun {
    pub update_count: usize,
    pub digest: String,
    pub final_candle: Option<FootprintCandle>,
}

/// Apply `ticks` to `key` on a fresh engine and record the update stream.
/// Malformed ticks are skipped the same way a live feed would skip them.
pub fn record_run(config: &EngineConfig, key: &FootprintKey, ticks: &[Tick]) -> Result<RecordedRun, ReplayError> {
    let recorder = Arc::new(RecordingPublisher::new());
    let engine = FootprintEngine::with_publisher(config.clone(), Arc::clone(&recorder))?;

    let mut rejected = 0usize;
    for tick in ticks {
        if engine.apply(key, tick).is_err() {
            rejected += 1;
        }
    }
    if rejected > 0 {
        warn!(key = %key, rejected, "Recorded run skipped malformed ticks");
    }

    let updates = recorder.take();
    Ok(RecordedRun {
        update_count: updates.len(),
        digest: stream_digest(&updates)?,
        final_candle: engine.snapshot(key),
    })
}

/// Result of replay validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayValidation {
    pub matches: bool,
    pub original: RecordedRun,
    pub replayed: RecordedRun,
}

/// Replay `ticks` into a fresh engine and compare with `expected`.
pub fn validate_replay(
    config: &EngineConfig,
    key: &FootprintKey,
    ticks: &[Tick],
    expected: &RecordedRun,
) -> Result<ReplayValidation, ReplayError> {
    let replayed = record_run(config, key, ticks)?;
    let matches = replayed == *expected;
    if matches {
        info!(key = %key, digest = %replayed.digest, "Replay matches recorded run");
    } else {
        warn!(key = %key, expected = %expected.digest, actual = %replayed.digest, "Replay diverged");
    }
    Ok(ReplayValidation {
        matches,
        original: expected.clone(),
        replayed,
    })
}

/// Export a tick log as JSON.
pub fn export_tick_log(ticks: &[Tick]) -> Result<String, ReplayError> {
    Ok(serde_json::to_string_pretty(ticks)?)
}

/// Import a tick log from JSON.
pub fn import_tick_log(json: &str) -> Result<Vec<Tick>, ReplayError> {
    Ok(serde_json::from_str(json)?)
}
