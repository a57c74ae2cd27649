//! Footprint engine registry
//!
//! Owns one independently locked `AggregatorState` per key. The map's shard
//! lock is held only long enough to find or insert a key's handle; all work
//! on a key happens under that key's own mutex, so different keys never
//! block each other. No operation performs I/O.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, warn};
use types::bucket::FootprintKey;
use types::candle::{FootprintCandle, PriceLevelRow};
use types::errors::{ConfigError, EngineError, TickError};
use types::tick::Tick;

use crate::aggregator::{AggregatorState, ApplyOutcome};
use crate::config::EngineConfig;
use crate::ladder::build_ladder;
use crate::metrics::EngineMetrics;
use crate::publisher::{CandlePublisher, NullPublisher};
use crate::seeder::{seeded_state, SeedOutcome};
use crate::session::SessionCalendar;

type StateHandle = Arc<Mutex<AggregatorState>>;

/// Registry of live aggregators.
pub struct FootprintEngine<P: CandlePublisher = NullPublisher> {
    states: DashMap<FootprintKey, StateHandle>,
    calendar: SessionCalendar,
    config: EngineConfig,
    publisher: P,
    metrics: Arc<EngineMetrics>,
}

impl FootprintEngine<NullPublisher> {
    /// Engine that discards snapshots.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Self::with_publisher(config, NullPublisher)
    }
}

impl<P: CandlePublisher> FootprintEngine<P> {
    pub fn with_publisher(config: EngineConfig, publisher: P) -> Result<Self, ConfigError> {
        config.validate()?;
        let calendar = SessionCalendar::new(&config.session)?;
        info!(
            session_open = %config.session.open_time,
            utc_offset_minutes = config.session.utc_offset_minutes,
            tolerance_secs = config.out_of_order_tolerance_secs,
            "Footprint engine initialized"
        );
        Ok(Self {
            states: DashMap::new(),
            calendar,
            config,
            publisher,
            metrics: Arc::new(EngineMetrics::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calendar(&self) -> &SessionCalendar {
        &self.calendar
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Apply one tick to `key`, creating the key's state on first use.
    ///
    /// Malformed ticks and invalid bucket configurations are returned as
    /// errors and leave all state untouched. Out-of-order ticks are not
    /// errors; they come back as `ApplyOutcome::DroppedOutOfOrder`.
    pub fn apply(&self, key: &FootprintKey, tick: &Tick) -> Result<ApplyOutcome, EngineError> {
        if let Err(err) = self.check_tick(key, tick) {
            self.metrics.record_malformed();
            warn!(key = %key, error = %err, "Malformed tick dropped");
            return Err(err.into());
        }

        loop {
            let handle = self.handle(key)?;
            let mut state = handle.lock();
            if state.retired {
                // cleared between lookup and lock; retry against the fresh entry
                self.unlink(key, &handle);
                continue;
            }

            let started = Instant::now();
            let outcome = match state.apply(tick, &self.calendar, self.config.out_of_order_tolerance_secs) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.metrics.record_malformed();
                    warn!(key = %key, error = %err, "Unbucketable tick dropped");
                    return Err(err.into());
                }
            };
            match &outcome {
                ApplyOutcome::Applied(applied) => {
                    if let Some(finalized) = &applied.finalized {
                        self.publisher.publish(finalized);
                        self.metrics.record_finalized();
                    }
                    self.publisher.publish(&applied.update);
                    if applied.session_reset {
                        self.metrics.record_session_reset();
                    }
                    if applied.reconciled {
                        self.metrics.record_reconciliation();
                    }
                    self.metrics
                        .record_applied(started.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64);
                }
                ApplyOutcome::DroppedOutOfOrder { .. } => self.metrics.record_out_of_order(),
            }
            return Ok(outcome);
        }
    }

    /// Prime `key` from its last known candle. A no-op when the key
    /// already has live state; a cleared state still in the map counts as
    /// absent.
    pub fn seed(&self, key: &FootprintKey, candle: &FootprintCandle, now: i64) -> Result<SeedOutcome, EngineError> {
        loop {
            let existing = match self.states.entry(key.clone()) {
                Entry::Occupied(occupied) => Arc::clone(occupied.get()),
                Entry::Vacant(vacant) => {
                    let (state, outcome) = seeded_state(key.clone(), candle, &self.calendar, now)?;
                    vacant.insert(Arc::new(Mutex::new(state)));
                    self.metrics.record_seed(true);
                    return Ok(outcome);
                }
            };

            let state = existing.lock();
            if !state.retired {
                self.metrics.record_seed(false);
                info!(key = %key, "Seed skipped, aggregator already active");
                return Ok(SeedOutcome::AlreadyActive);
            }
            self.unlink(key, &existing);
        }
    }

    /// Destroy the state for `key`. Waits for any in-flight apply on the
    /// key; the next tick starts from an empty state. Returns false when
    /// the key had no state.
    pub fn clear(&self, key: &FootprintKey) -> bool {
        let Some(handle) = self.states.get(key).map(|entry| Arc::clone(entry.value())) else {
            return false;
        };
        let mut state = handle.lock();
        state.retired = true;
        let removed = self.unlink(key, &handle);
        if removed {
            self.metrics.record_clear();
            info!(key = %key, "Aggregator state cleared");
        }
        removed
    }

    /// Current open candle for `key`.
    pub fn snapshot(&self, key: &FootprintKey) -> Option<FootprintCandle> {
        let handle = self.states.get(key).map(|entry| Arc::clone(entry.value()))?;
        let state = handle.lock();
        state.snapshot()
    }

    /// Dense ladder of the open candle for `key`.
    pub fn ladder(&self, key: &FootprintKey) -> Option<Vec<PriceLevelRow>> {
        let handle = self.states.get(key).map(|entry| Arc::clone(entry.value()))?;
        let state = handle.lock();
        let candle = state.snapshot()?;
        Some(build_ladder(&candle, state.bucketer(), self.config.max_ladder_levels))
    }

    pub fn contains(&self, key: &FootprintKey) -> bool {
        self.states.contains_key(key)
    }

    pub fn keys(&self) -> Vec<FootprintKey> {
        self.states.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn check_tick(&self, key: &FootprintKey, tick: &Tick) -> Result<(), TickError> {
        tick.validate()?;
        if tick.quantity > self.config.max_trade_quantity {
            return Err(TickError::QuantityOutOfRange {
                quantity: tick.quantity,
                limit: self.config.max_trade_quantity,
            });
        }
        if tick.symbol != key.symbol {
            return Err(TickError::SymbolMismatch {
                key: key.symbol.to_string(),
                tick: tick.symbol.to_string(),
            });
        }
        Ok(())
    }

    /// Remove `handle` from the map if it is still the entry for `key`.
    /// Callers hold the handle's lock, so the order is mutex then shard,
    /// as in `clear`.
    fn unlink(&self, key: &FootprintKey, handle: &StateHandle) -> bool {
        self.states
            .remove_if(key, |_, current| Arc::ptr_eq(current, handle))
            .is_some()
    }

    fn handle(&self, key: &FootprintKey) -> Result<StateHandle, ConfigError> {
        if let Some(existing) = self.states.get(key) {
            return Ok(Arc::clone(existing.value()));
        }
        let fresh = AggregatorState::new(key.clone())?;
        let entry = self
            .states
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(fresh)));
        Ok(Arc::clone(entry.value()))
    }
}
