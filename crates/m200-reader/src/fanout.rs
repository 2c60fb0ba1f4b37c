//! Tag event fan-out.
//!
//! The scan loop writes into one mpsc sink. [`TagFanout`] drains it and hands
//! every event to two consumers:
//!
//! ```text
//!                       ┌──► persistence (mpsc, backpressured)
//! scan sink ──► fanout ─┤
//!                       └──► live subscribers (broadcast, lossy)
//! ```
//!
//! Persistence sees every tag. Broadcast subscribers that fall behind lose
//! the oldest events and never slow persistence down.

use m200_core::TagRead;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Counters reported when the fan-out ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutStats {
    /// Events received from the scan sink.
    pub received: u64,
    /// Events accepted by the persistence channel.
    pub persisted: u64,
    /// Events delivered to at least one broadcast subscriber.
    pub broadcast: u64,
}

/// Splits one tag stream into persistence and broadcast.
#[derive(Debug)]
pub struct TagFanout {
    persist_tx: mpsc::Sender<TagRead>,
    broadcast_tx: broadcast::Sender<TagRead>,
}

impl TagFanout {
    /// Create a fan-out and the persistence receiver it feeds.
    pub fn new(persist_capacity: usize, broadcast_capacity: usize) -> (Self, mpsc::Receiver<TagRead>) {
        let (persist_tx, persist_rx) = mpsc::channel(persist_capacity);
        let (broadcast_tx, _) = broadcast::channel(broadcast_capacity);
        (
            Self {
                persist_tx,
                broadcast_tx,
            },
            persist_rx,
        )
    }

    /// New live subscriber. Sees events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TagRead> {
        self.broadcast_tx.subscribe()
    }

    /// Forward events from `source` until it closes.
    ///
    /// A closed persistence receiver is logged once; broadcasting goes on.
    pub async fn run(self, mut source: mpsc::Receiver<TagRead>) -> FanoutStats {
        let mut stats = FanoutStats::default();
        let mut persist_open = true;

        while let Some(tag) = source.recv().await {
            stats.received += 1;
            trace!(epc = %tag.epc, rssi = tag.rssi, "Tag event");

            if persist_open {
                match self.persist_tx.send(tag.clone()).await {
                    Ok(()) => stats.persisted += 1,
                    Err(_) => {
                        warn!("Persistence channel closed, tags are no longer stored");
                        persist_open = false;
                    }
                }
            }

            if self.broadcast_tx.send(tag).is_ok() {
                stats.broadcast += 1;
            }
        }

        info!(
            received = stats.received,
            persisted = stats.persisted,
            broadcast = stats.broadcast,
            "Tag fan-out finished"
        );
        stats
    }

    /// Run on a background task.
    pub fn spawn(self, source: mpsc::Receiver<TagRead>) -> JoinHandle<FanoutStats> {
        debug!("Spawning tag fan-out");
        tokio::spawn(self.run(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(epc: &str) -> TagRead {
        TagRead::new(epc, -60, 1, 0x3000)
    }

    #[tokio::test]
    async fn test_every_event_reaches_both_sides() {
        let (fanout, mut persisted) = TagFanout::new(8, 8);
        let mut live = fanout.subscribe();
        let (tx, rx) = mpsc::channel(8);
        let task = fanout.spawn(rx);

        tx.send(tag("01")).await.unwrap();
        tx.send(tag("02")).await.unwrap();
        drop(tx);

        assert_eq!(persisted.recv().await.unwrap().epc, "01");
        assert_eq!(persisted.recv().await.unwrap().epc, "02");
        assert_eq!(live.recv().await.unwrap().epc, "01");
        assert_eq!(live.recv().await.unwrap().epc, "02");

        let stats = task.await.unwrap();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.persisted, 2);
        assert_eq!(stats.broadcast, 2);
    }

    #[tokio::test]
    async fn test_no_subscribers_does_not_block_persistence() {
        let (fanout, mut persisted) = TagFanout::new(8, 1);
        let (tx, rx) = mpsc::channel(8);
        let task = fanout.spawn(rx);

        for i in 0..5 {
            tx.send(tag(&format!("{i:02}"))).await.unwrap();
        }
        drop(tx);

        let stats = task.await.unwrap();
        assert_eq!(stats.persisted, 5);
        assert_eq!(stats.broadcast, 0);
        let mut count = 0;
        while persisted.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_loses_oldest_only() {
        let (fanout, mut persisted) = TagFanout::new(16, 2);
        let mut slow = fanout.subscribe();
        let (tx, rx) = mpsc::channel(16);
        let task = fanout.spawn(rx);

        for epc in ["01", "02", "03", "04"] {
            tx.send(tag(epc)).await.unwrap();
        }
        drop(tx);
        let stats = task.await.unwrap();
        assert_eq!(stats.persisted, 4);

        assert!(matches!(
            slow.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(slow.recv().await.unwrap().epc, "03");
        assert_eq!(slow.recv().await.unwrap().epc, "04");

        for epc in ["01", "02", "03", "04"] {
            assert_eq!(persisted.recv().await.unwrap().epc, epc);
        }
    }

    #[tokio::test]
    async fn test_closed_persistence_keeps_broadcasting() {
        let (fanout, persisted) = TagFanout::new(1, 8);
        drop(persisted);
        let mut live = fanout.subscribe();
        let (tx, rx) = mpsc::channel(8);
        let task = fanout.spawn(rx);

        tx.send(tag("AA")).await.unwrap();
        drop(tx);

        assert_eq!(live.recv().await.unwrap().epc, "AA");
        let stats = task.await.unwrap();
        assert_eq!(stats.persisted, 0);
        assert_eq!(stats.broadcast, 1);
    }
}
