//! Bounded max-heap of outbound messages, keyed on profit.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use rust_decimal::Decimal;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// One queued delivery.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Priority key: the surebet's profit.
    pub profit: Decimal,
    /// Destination channel id.
    pub channel: i64,
    /// Rendered HTML body.
    pub body: String,
    /// Event start as unix seconds, for stale-delivery logging.
    pub event_unix: i64,
    /// Send attempts made so far.
    pub attempts: u32,
    /// Bot index of the last failed attempt, for rotation on retry.
    pub last_bot: Option<usize>,
    /// Enqueue sequence number; stable tie-break for equal profit.
    seq: u64,
}

impl PartialEq for Outbound {
    fn eq(&self, other: &Self) -> bool {
        self.profit == other.profit && self.seq == other.seq
    }
}

impl Eq for Outbound {}

impl PartialOrd for Outbound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Outbound {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest profit first; earliest enqueue wins ties.
        self.profit
            .cmp(&other.profit)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Bounded priority queue shared between producers and bot consumers.
///
/// Admission on overflow: an incoming entry strictly beating the current
/// minimum evicts it; anything else is rejected. Rejection is the only
/// sanctioned loss path on the producer side.
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<Outbound>>,
    notify: Notify,
    capacity: usize,
    seq: AtomicU64,
}

impl PriorityQueue {
    /// Queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            seq: AtomicU64::new(0),
        }
    }

    /// Enqueue a delivery. Returns false when the queue is full and the
    /// entry does not strictly beat the minimum.
    pub async fn push(
        &self,
        profit: Decimal,
        channel: i64,
        body: String,
        event_unix: i64,
    ) -> bool {
        let entry = Outbound {
            profit,
            channel,
            body,
            event_unix,
            attempts: 0,
            last_bot: None,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
        };
        self.push_entry(entry).await
    }

    /// Re-enqueue an existing entry, preserving its priority and sequence.
    pub async fn requeue(&self, entry: Outbound) -> bool {
        self.push_entry(entry).await
    }

    async fn push_entry(&self, entry: Outbound) -> bool {
        let mut heap = self.heap.lock().await;

        if heap.len() < self.capacity {
            heap.push(entry);
            drop(heap);
            self.notify.notify_one();
            return true;
        }

        // Full: evict the minimum only for a strictly better candidate.
        let mut entries = std::mem::take(&mut *heap).into_vec();
        let min_index = entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(index, _)| index);

        match min_index {
            Some(index) if entries[index].profit < entry.profit => {
                entries.swap_remove(index);
                entries.push(entry);
                *heap = BinaryHeap::from(entries);
                drop(heap);
                self.notify.notify_one();
                true
            }
            _ => {
                *heap = BinaryHeap::from(entries);
                false
            }
        }
    }

    /// Pop the highest-priority entry, waiting until one is available or
    /// the token is cancelled.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<Outbound> {
        loop {
            let notified = self.notify.notified();
            if let Some(entry) = self.heap.lock().await.pop() {
                // Wake another consumer in case more entries remain.
                self.notify.notify_one();
                return Some(entry);
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return None,
            }
        }
    }

    /// Non-blocking pop, used while draining.
    pub async fn try_pop(&self) -> Option<Outbound> {
        self.heap.lock().await.pop()
    }

    /// Current queue depth.
    pub async fn len(&self) -> usize {
        self.heap.lock().await.len()
    }

    /// Whether the queue is empty.
    pub async fn is_empty(&self) -> bool {
        self.heap.lock().await.is_empty()
    }

    /// Lowest-priority profit currently queued.
    pub async fn min_profit(&self) -> Option<Decimal> {
        self.heap
            .lock()
            .await
            .iter()
            .map(|entry| entry.profit)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const EVENT_UNIX: i64 = 1_900_000_000;

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn pops_in_descending_profit_order() {
        let queue = PriorityQueue::new(10);
        queue.push(dec!(1.0), 1, "a".into(), EVENT_UNIX).await;
        queue.push(dec!(4.2), 1, "b".into(), EVENT_UNIX).await;
        queue.push(dec!(2.5), 1, "c".into(), EVENT_UNIX).await;

        let token = cancel();
        assert_eq!(queue.pop(&token).await.unwrap().body, "b");
        assert_eq!(queue.pop(&token).await.unwrap().body, "c");
        assert_eq!(queue.pop(&token).await.unwrap().body, "a");
    }

    #[tokio::test]
    async fn equal_profit_pops_in_enqueue_order() {
        let queue = PriorityQueue::new(10);
        queue.push(dec!(2.0), 1, "first".into(), EVENT_UNIX).await;
        queue.push(dec!(2.0), 1, "second".into(), EVENT_UNIX).await;
        queue.push(dec!(2.0), 1, "third".into(), EVENT_UNIX).await;

        let token = cancel();
        assert_eq!(queue.pop(&token).await.unwrap().body, "first");
        assert_eq!(queue.pop(&token).await.unwrap().body, "second");
        assert_eq!(queue.pop(&token).await.unwrap().body, "third");
    }

    #[tokio::test]
    async fn overflow_rejects_equal_profit() {
        let queue = PriorityQueue::new(2);
        assert!(queue.push(dec!(0.8), 1, "a".into(), EVENT_UNIX).await);
        assert!(queue.push(dec!(1.2), 1, "b".into(), EVENT_UNIX).await);

        // Equal to the minimum: rejected, not equal-or-greater.
        assert!(!queue.push(dec!(0.8), 1, "c".into(), EVENT_UNIX).await);
        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn overflow_evicts_minimum_for_strictly_better() {
        let queue = PriorityQueue::new(2);
        queue.push(dec!(0.8), 1, "min".into(), EVENT_UNIX).await;
        queue.push(dec!(1.2), 1, "mid".into(), EVENT_UNIX).await;

        assert!(queue.push(dec!(0.81), 1, "better".into(), EVENT_UNIX).await);
        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.min_profit().await, Some(dec!(0.81)));

        let token = cancel();
        assert_eq!(queue.pop(&token).await.unwrap().body, "mid");
        assert_eq!(queue.pop(&token).await.unwrap().body, "better");
        assert!(queue.try_pop().await.is_none());
    }

    #[tokio::test]
    async fn pop_returns_none_on_cancellation() {
        let queue = PriorityQueue::new(2);
        let token = cancel();
        token.cancel();
        assert!(queue.pop(&token).await.is_none());
    }

    #[tokio::test]
    async fn requeue_preserves_priority() {
        let queue = PriorityQueue::new(10);
        queue.push(dec!(3.0), 1, "big".into(), EVENT_UNIX).await;
        queue.push(dec!(1.0), 1, "small".into(), EVENT_UNIX).await;

        let token = cancel();
        let mut popped = queue.pop(&token).await.unwrap();
        assert_eq!(popped.body, "big");
        popped.attempts += 1;
        queue.requeue(popped).await;

        // Still ahead of the lower-profit entry.
        assert_eq!(queue.pop(&token).await.unwrap().body, "big");
    }
}
