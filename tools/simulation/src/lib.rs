//! Footprint Engine Simulation
//!
//! Load and determinism harness for the footprint engine. Generates seeded
//! trade flow, runs many keys against one shared engine and validates that
//! replaying a tick log reproduces the same update stream.
//!
//! # Modules
//! - `generator` — Seeded random-walk tick source
//! - `multi_key` — One thread per key over a shared engine
//! - `metrics` — Counters, latency histograms and throughput
//! - `replay` — Recorded update streams, digests and replay validation
//! - `export` — Metrics and run JSON export

pub mod generator;
pub mod multi_key;
pub mod metrics;
pub mod replay;
pub mod export;

/// Crate version constant
pub const VERSION: &str = "0.1.0";
