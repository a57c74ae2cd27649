//! Footprint Candle Engine
//!
//! Consumes trade ticks and incrementally builds footprint candles:
//! session-aligned OHLCV bars annotated with aggressor buy and sell volume
//! at every price level touched during the bar.
//!
//! - Aggressor classification (spread, book pressure, price direction)
//! - Decimal price bucketing by `(tick_size, multiplier)`
//! - Session-anchored time bins and cumulative delta/volume resets
//! - Continuation across reconnects via historical seeding
//! - Feed normalisation, historical resampling and dense ladders
//!
//! # Architecture
//!
//! ```text
//!      Feed messages          Historical bars
//!           │                       │
//!     ┌─────▼─────┐           ┌─────▼─────┐
//!     │ Ingestion │           │ Resample  │
//!     └─────┬─────┘           └─────┬─────┘
//!           │ Tick                  │ last candle
//!   ┌───────▼──────────────┐        │
//!   │ FootprintEngine      │◄───────┘ seed
//!   │  key → Mutex<State>  │
//!   └───────┬──────────────┘
//!           │ classify → bin → bucket → aggregate
//!     ┌─────▼─────┐
//!     │ Publisher │  ← open and finalized snapshots
//!     └───────────┘
//! ```

pub mod config;
pub mod bucketer;
pub mod session;
pub mod classifier;
pub mod aggregator;
pub mod seeder;
pub mod publisher;
pub mod metrics;
pub mod engine;
pub mod ingestion;
pub mod ladder;
pub mod history;

pub use aggregator::{AggregatorState, AppliedTick, ApplyOutcome};
pub use classifier::{Classification, ClassificationRule};
pub use config::{EngineConfig, SessionConfig};
pub use engine::FootprintEngine;
pub use ingestion::{IngestionResult, RawTick, TickNormalizer};
pub use publisher::{BroadcastPublisher, CandlePublisher, NullPublisher};
pub use seeder::SeedOutcome;
pub use session::SessionCalendar;

// Library version
pub const ENGINE_VERSION: &str = "0.1.0";
