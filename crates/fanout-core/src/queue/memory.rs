//! In-memory visibility-timeout queue.

use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{MessageRecord, MessageState, RedrivePolicy};
use crate::domain::ids::{MessageId, ReceiptHandle};
use crate::ports::{IdGenerator, MessageQueue, QueueCounts, QueueError, ReceivedMessage};

/// In-flight entry for the visibility heap.
///
/// Reverse ordering so BinaryHeap acts as a min-heap (earliest deadline first).
#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    visible_at: Instant,
    message_id: MessageId,
    receipt: ReceiptHandle,
}

impl PartialOrd for InFlight {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InFlight {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .visible_at
            .cmp(&self.visible_at)
            .then_with(|| other.message_id.cmp(&self.message_id))
    }
}

struct InMemoryQueueState {
    /// Live and dead messages (single source of truth). Acked messages are
    /// dropped and only counted.
    records: HashMap<MessageId, MessageRecord>,

    /// Visible messages, oldest first (ids only).
    ready: VecDeque<MessageId>,

    /// In-flight deliveries by visibility deadline. Entries whose receipt no
    /// longer matches the record are stale and skipped.
    in_flight: BinaryHeap<InFlight>,

    /// Receipts of live messages, superseded ones included, so stale acks
    /// can be told apart from unknown ones.
    receipts: HashMap<ReceiptHandle, MessageId>,

    acked: usize,
}

impl InMemoryQueueState {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            ready: VecDeque::new(),
            in_flight: BinaryHeap::new(),
            receipts: HashMap::new(),
            acked: 0,
        }
    }

    /// Move in-flight messages whose visibility lapsed back to the ready list.
    fn release_expired(&mut self, now: Instant) {
        while let Some(entry) = self.in_flight.peek() {
            if entry.visible_at > now {
                break; // Heap is sorted, so we can stop
            }
            let Some(entry) = self.in_flight.pop() else {
                break;
            };
            if let Some(record) = self.records.get_mut(&entry.message_id)
                && record.state == MessageState::InFlight
                && record.receipt == Some(entry.receipt)
            {
                record.make_visible();
                self.ready.push_back(entry.message_id);
            }
        }
    }

    /// Drop an acked message along with every receipt and heap entry that
    /// still points at it.
    fn remove_acked(&mut self, message_id: MessageId) {
        if let Some(record) = self.records.remove(&message_id) {
            for receipt in &record.issued {
                self.receipts.remove(receipt);
            }
        }
        self.in_flight.retain(|entry| entry.message_id != message_id);
        self.acked += 1;
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            acked: self.acked,
            ..QueueCounts::default()
        };
        for record in self.records.values() {
            match record.state {
                MessageState::Visible => counts.visible += 1,
                MessageState::InFlight => counts.in_flight += 1,
                MessageState::Dead => counts.dead += 1,
            }
        }
        counts
    }
}

/// Visibility-timeout queue held in process memory.
///
/// Cloning shares the same queue.
#[derive(Clone)]
pub struct InMemoryQueue {
    name: Arc<str>,
    visibility_timeout: Duration,
    redrive: RedrivePolicy,
    ids: Arc<dyn IdGenerator>,
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl InMemoryQueue {
    pub fn new(
        name: impl Into<String>,
        visibility_timeout: Duration,
        redrive: RedrivePolicy,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            name: Arc::from(name.into()),
            visibility_timeout,
            redrive,
            ids,
            state: Arc::new(Mutex::new(InMemoryQueueState::new())),
            notify: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// Refuse further sends. Messages already queued can still be received.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Take up to `max` visible messages, starting a delivery for each.
    async fn take_visible(&self, max: usize) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.release_expired(now);

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(message_id) = state.ready.pop_front() else {
                break;
            };
            let receipt = self.ids.receipt_handle();
            let visible_at = now + self.visibility_timeout;

            let Some(record) = state.records.get_mut(&message_id) else {
                continue;
            };
            if !record.state.is_receivable() {
                continue;
            }
            if !self.redrive.allows_delivery(record.receive_count) {
                let receive_count = record.receive_count;
                for old in record.mark_dead() {
                    state.receipts.remove(&old);
                }
                warn!(
                    queue = %self.name,
                    message_id = %message_id,
                    receive_count,
                    "receive limit reached, message moved to dead-letter state"
                );
                continue;
            }

            record.start_delivery(receipt, visible_at);
            let received = ReceivedMessage {
                message_id,
                receipt,
                body: record.body.clone(),
                receive_count: record.receive_count,
            };
            state.in_flight.push(InFlight {
                visible_at,
                message_id,
                receipt,
            });
            state.receipts.insert(receipt, message_id);
            batch.push(received);
        }

        let next_visible = state.in_flight.peek().map(|entry| entry.visible_at);
        (batch, next_visible)
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: String) -> Result<MessageId, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed(self.name.to_string()));
        }

        let message_id = self.ids.message_id();
        {
            let mut state = self.state.lock().await;
            state
                .records
                .insert(message_id, MessageRecord::new(message_id, body));
            state.ready.push_back(message_id);
        }

        // Notify outside the lock
        self.notify.notify_one();
        debug!(queue = %self.name, message_id = %message_id, "message sent");
        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let (batch, next_visible) = self.take_visible(max_messages.max(1)).await;
            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            // Wait for a send OR the next visibility deadline, bounded by `wait`
            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));
            tokio::select! {
                _ = self.notify.notified() => {},
                _ = tokio::time::sleep_until(wake_at) => {},
            }
        }
    }

    async fn ack(&self, receipt: ReceiptHandle) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let message_id = *state
            .receipts
            .get(&receipt)
            .ok_or_else(|| QueueError::UnknownMessage(receipt.to_string()))?;
        let record = state
            .records
            .get(&message_id)
            .ok_or_else(|| QueueError::UnknownMessage(message_id.to_string()))?;

        if record.state != MessageState::InFlight || record.receipt != Some(receipt) {
            return Err(QueueError::StaleReceipt { message_id });
        }
        state.remove_acked(message_id);
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, QueueError> {
        let state = self.state.lock().await;
        Ok(state.counts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{SystemClock, UlidGenerator};

    fn queue(visibility: Duration, redrive: RedrivePolicy) -> InMemoryQueue {
        InMemoryQueue::new(
            "test-queue",
            visibility,
            redrive,
            Arc::new(UlidGenerator::new(SystemClock)),
        )
    }

    #[tokio::test]
    async fn send_receive_ack() {
        let q = queue(Duration::from_secs(30), RedrivePolicy::unlimited());
        let id = q.send("hello".into()).await.unwrap();

        let batch = q.receive(10, Duration::ZERO).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].message_id, id);
        assert_eq!(batch[0].body, "hello");
        assert_eq!(batch[0].receive_count, 1);

        let counts = q.counts().await.unwrap();
        assert_eq!(counts.in_flight, 1);

        q.ack(batch[0].receipt).await.unwrap();
        let counts = q.counts().await.unwrap();
        assert_eq!(counts.acked, 1);
        assert_eq!(counts.outstanding(), 0);
    }

    #[tokio::test]
    async fn receive_respects_batch_size() {
        let q = queue(Duration::from_secs(30), RedrivePolicy::unlimited());
        for i in 0..7 {
            q.send(format!("m{i}")).await.unwrap();
        }

        let first = q.receive(5, Duration::ZERO).await.unwrap();
        let second = q.receive(5, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(second.len(), 2);
        assert_eq!(first[0].body, "m0");
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_message_is_hidden_then_redelivered() {
        let q = queue(Duration::from_secs(30), RedrivePolicy::unlimited());
        let id = q.send("order".into()).await.unwrap();

        let first = q.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(first.len(), 1);

        // Hidden while the visibility timeout runs.
        assert!(q.receive(1, Duration::from_secs(10)).await.unwrap().is_empty());

        // Waiting past the deadline redelivers it with a new receipt.
        let again = q.receive(1, Duration::from_secs(60)).await.unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].message_id, id);
        assert_eq!(again[0].receive_count, 2);
        assert_ne!(again[0].receipt, first[0].receipt);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_receipt_cannot_ack() {
        let q = queue(Duration::from_secs(1), RedrivePolicy::unlimited());
        q.send("x".into()).await.unwrap();

        let first = q.receive(1, Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let second = q.receive(1, Duration::ZERO).await.unwrap();

        let err = q.ack(first[0].receipt).await.unwrap_err();
        assert!(matches!(err, QueueError::StaleReceipt { .. }));
        q.ack(second[0].receipt).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn redrive_moves_message_to_dead_state() {
        let q = queue(Duration::from_secs(1), RedrivePolicy::max_receives(2));
        q.send("poison".into()).await.unwrap();

        for expected in 1..=2 {
            let batch = q.receive(1, Duration::from_secs(5)).await.unwrap();
            assert_eq!(batch[0].receive_count, expected);
        }

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(q.receive(1, Duration::ZERO).await.unwrap().is_empty());

        let counts = q.counts().await.unwrap();
        assert_eq!(counts.dead, 1);
        assert_eq!(counts.outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn receive_waits_for_send() {
        let q = queue(Duration::from_secs(30), RedrivePolicy::unlimited());
        let waiter = tokio::spawn({
            let q = q.clone();
            async move { q.receive(1, Duration::from_secs(5)).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        q.send("late".into()).await.unwrap();

        let batch = waiter.await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].body, "late");
    }

    #[tokio::test]
    async fn closed_queue_rejects_sends() {
        let q = queue(Duration::from_secs(30), RedrivePolicy::unlimited());
        q.close();
        assert!(matches!(q.send("x".into()).await, Err(QueueError::Closed(_))));
        q.reopen();
        assert!(q.send("x".into()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn acked_messages_leave_no_bookkeeping_behind() {
        let q = queue(Duration::from_secs(1), RedrivePolicy::unlimited());
        for i in 0..50 {
            q.send(format!("m{i}")).await.unwrap();
            let batch = q.receive(1, Duration::ZERO).await.unwrap();
            q.ack(batch[0].receipt).await.unwrap();
        }

        // One message redelivered before its ack carries two receipts.
        q.send("slow".into()).await.unwrap();
        let first = q.receive(1, Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let second = q.receive(1, Duration::ZERO).await.unwrap();
        q.ack(second[0].receipt).await.unwrap();

        {
            let state = q.state.lock().await;
            assert_eq!(state.records.len(), 0);
            assert_eq!(state.receipts.len(), 0);
            assert_eq!(state.in_flight.len(), 0);
        }
        assert_eq!(q.counts().await.unwrap().acked, 51);
        assert!(matches!(
            q.ack(first[0].receipt).await,
            Err(QueueError::UnknownMessage(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn dead_message_forgets_its_receipts() {
        let q = queue(Duration::from_secs(1), RedrivePolicy::max_receives(1));
        q.send("poison".into()).await.unwrap();
        let batch = q.receive(1, Duration::ZERO).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(q.receive(1, Duration::ZERO).await.unwrap().is_empty());

        assert_eq!(q.state.lock().await.receipts.len(), 0);
        assert_eq!(q.counts().await.unwrap().dead, 1);
        assert!(q.ack(batch[0].receipt).await.is_err());
    }
}
