//! Run export
//!
//! Serializes simulation metrics, engine counters and replay digests to
//! JSON for external consumption.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metrics::SimMetrics;
use crate::multi_key::KeyRun;

/// Per-key line of an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySummary {
    pub key: String,
    pub ticks_applied: u64,
    pub candles_finalized: u64,
    pub cumulative_volume: u64,
    pub cumulative_delta: i64,
}

impl From<&KeyRun> for KeySummary {
    fn from(run: &KeyRun) -> Self {
        let (cumulative_volume, cumulative_delta) = run
            .final_candle
            .as_ref()
            .map_or((0, 0), |c| (c.cumulative_volume, c.cumulative_delta));
        Self {
            key: run.key.to_string(),
            ticks_applied: run.metrics.ticks_applied,
            candles_finalized: run.metrics.candles_finalized,
            cumulative_volume,
            cumulative_delta,
        }
    }
}

/// Combined export containing all simulation outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationExport {
    pub version: String,
    pub engine_version: String,
    pub metrics: SimMetrics,
    pub keys: Vec<KeySummary>,
    /// Engine-side counters as exported by the engine
    pub engine_counters: BTreeMap<String, u64>,
    pub replay_digest: Option<String>,
}

/// Build a complete simulation export.
pub fn build_export(
    runs: &[KeyRun],
    metrics: &SimMetrics,
    engine_counters: BTreeMap<String, u64>,
    replay_digest: Option<String>,
) -> SimulationExport {
    SimulationExport {
        version: crate::VERSION.to_string(),
        engine_version: footprint_engine::ENGINE_VERSION.to_string(),
        metrics: metrics.clone(),
        keys: runs.iter().map(KeySummary::from).collect(),
        engine_counters,
        replay_digest,
    }
}

/// Export complete simulation data as JSON.
pub fn export_json(export: &SimulationExport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(export)
}

/// Write export to a file path.
pub fn write_to_file(export: &SimulationExport, path: &str) -> std::io::Result<()> {
    let json = export_json(export).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}
