//! Types library for the footprint candle engine
//!
//! This library provides the data model shared by the aggregation engine and
//! the simulation tooling: ticks in, footprint candles out.
//!
//! # Modules
//! - `ids`: Instrument symbols and feed trade identifiers
//! - `numeric`: Fixed-point price rounding
//! - `timeframe`: Candle timeframes
//! - `bucket`: Price bucket configuration and aggregator keys
//! - `tick`: Trade tick input
//! - `candle`: Footprint candle output
//! - `errors`: Error taxonomy

pub mod ids;
pub mod numeric;
pub mod timeframe;
pub mod bucket;
pub mod tick;
pub mod candle;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::timeframe::*;
    pub use crate::bucket::*;
    pub use crate::tick::*;
    pub use crate::candle::*;
    pub use crate::errors::*;
}
