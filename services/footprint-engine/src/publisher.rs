//! Candle publishing
//!
//! The engine hands every snapshot to a `CandlePublisher`. Delivery to
//! subscribers lives outside the engine; consumers do their own throttling.

use tokio::sync::broadcast;
use types::candle::CandleUpdate;

/// Receives every open and finalized snapshot, in per-key order.
pub trait CandlePublisher: Send + Sync {
    fn publish(&self, update: &CandleUpdate);
}

/// Discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl CandlePublisher for NullPublisher {
    fn publish(&self, _update: &CandleUpdate) {}
}

/// Fans updates out over a tokio broadcast channel. Slow receivers lag
/// and see `RecvError::Lagged`; publishing never blocks.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<CandleUpdate>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CandleUpdate> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl CandlePublisher for BroadcastPublisher {
    fn publish(&self, update: &CandleUpdate) {
        // No receivers is not an error
        let _ = self.sender.send(update.clone());
    }
}

impl<P: CandlePublisher + ?Sized> CandlePublisher for std::sync::Arc<P> {
    fn publish(&self, update: &CandleUpdate) {
        (**self).publish(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use types::bucket::{BucketConfig, FootprintKey};
    use types::candle::{CandleStatus, FootprintCandle};
    use types::ids::Symbol;
    use types::timeframe::Timeframe;

    fn update() -> CandleUpdate {
        CandleUpdate {
            key: FootprintKey::new(
                Symbol::new("NSE:SBIN-EQ"),
                Timeframe::M1,
                BucketConfig::new(Decimal::new(5, 2), 10).unwrap(),
            ),
            status: CandleStatus::Open,
            candle: FootprintCandle {
                interval_start: 1705290300,
                open: Decimal::new(62_000, 2),
                high: Decimal::new(62_000, 2),
                low: Decimal::new(62_000, 2),
                close: Decimal::new(62_000, 2),
                volume: 0,
                buy_volume: 0,
                sell_volume: 0,
                delta: 0,
                cumulative_delta: 0,
                cumulative_volume: 0,
                rows: Vec::new(),
            },
        }
    }

    #[test]
    fn test_publish_without_receivers_is_ok() {
        let publisher = BroadcastPublisher::new(4);
        assert_eq!(publisher.receiver_count(), 0);
        publisher.publish(&update());
    }

    #[tokio::test]
    async fn test_broadcast_delivers_in_order() {
        let publisher = BroadcastPublisher::new(16);
        let mut rx = publisher.subscribe();

        let first = update();
        let mut second = update();
        second.status = CandleStatus::Finalized;
        publisher.publish(&first);
        publisher.publish(&second);

        assert_eq!(rx.recv().await.unwrap(), first);
        assert_eq!(rx.recv().await.unwrap().status, CandleStatus::Finalized);
    }

    #[tokio::test]
    async fn test_lagging_receiver_reports_lag() {
        let publisher = BroadcastPublisher::new(2);
        let mut rx = publisher.subscribe();
        for _ in 0..5 {
            publisher.publish(&update());
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
    }
}
