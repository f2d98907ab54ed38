//! ConsumerGroup - drives one batch handler from one queue.
//!
//! Each worker loops receive → handle → ack. Messages the handler reports
//! failed are left unacknowledged and come back after the visibility
//! timeout. Several workers may hold batches of the same queue at once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::consumers::BatchHandler;
use crate::ports::{MessageQueue, QueueError, ReceivedMessage};

#[derive(Debug, Clone, Copy)]
pub struct ConsumerOptions {
    /// Messages per receive.
    pub batch_size: usize,
    /// Concurrent workers on the queue.
    pub workers: usize,
    /// Long-poll wait of each receive.
    pub poll_wait: Duration,
}

impl ConsumerOptions {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            workers: 1,
            poll_wait: Duration::from_secs(1),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_poll_wait(mut self, poll_wait: Duration) -> Self {
        self.poll_wait = poll_wait;
        self
    }
}

/// Outcome of handling one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub acked: usize,
    pub failed: usize,
}

/// Handles a received batch and acknowledges what the handler did not
/// report failed.
pub async fn process_batch(
    queue: &dyn MessageQueue,
    handler: &dyn BatchHandler,
    batch: &[ReceivedMessage],
) -> BatchSummary {
    let response = handler.handle_batch(batch).await;
    let mut summary = BatchSummary {
        received: batch.len(),
        ..BatchSummary::default()
    };

    for message in batch {
        if response.is_failed(message.message_id) {
            summary.failed += 1;
            continue;
        }
        match queue.ack(message.receipt).await {
            Ok(()) => summary.acked += 1,
            // Visibility lapsed mid-batch; the newer delivery owns the message.
            Err(err) => warn!(
                queue = queue.name(),
                leg = %handler.leg(),
                message_id = %message.message_id,
                error = %err,
                "ack rejected"
            ),
        }
    }

    debug!(
        queue = queue.name(),
        leg = %handler.leg(),
        received = summary.received,
        acked = summary.acked,
        failed = summary.failed,
        "batch done"
    );
    summary
}

/// One receive plus [`process_batch`]. An empty receive yields a zero summary.
pub async fn poll_once(
    queue: &dyn MessageQueue,
    handler: &dyn BatchHandler,
    batch_size: usize,
    wait: Duration,
) -> Result<BatchSummary, QueueError> {
    let batch = queue.receive(batch_size, wait).await?;
    if batch.is_empty() {
        return Ok(BatchSummary::default());
    }
    Ok(process_batch(queue, handler, &batch).await)
}

/// Consumer group handle.
/// - `request_shutdown` stops the workers from taking new batches
/// - `shutdown_and_join` also waits for the batches in progress
pub struct ConsumerGroup {
    queue_name: String,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl ConsumerGroup {
    pub fn spawn(
        queue: Arc<dyn MessageQueue>,
        handler: Arc<dyn BatchHandler>,
        options: ConsumerOptions,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let queue_name = queue.name().to_string();

        let mut joins = Vec::with_capacity(options.workers);
        for worker_id in 0..options.workers {
            let queue = Arc::clone(&queue);
            let handler = Arc::clone(&handler);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                consumer_loop(worker_id, queue, handler, options, &mut rx).await;
            }));
        }

        info!(
            queue = %queue_name,
            workers = options.workers,
            batch_size = options.batch_size,
            "consumer group started"
        );
        Self {
            queue_name,
            shutdown_tx,
            joins,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                warn!(queue = %self.queue_name, error = %err, "consumer task ended abnormally");
            }
        }
        info!(queue = %self.queue_name, "consumer group stopped");
    }
}

async fn consumer_loop(
    worker_id: usize,
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn BatchHandler>,
    options: ConsumerOptions,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // Only the receive races shutdown; a received batch is always finished.
        let received = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = queue.receive(options.batch_size, options.poll_wait) => received,
        };

        match received {
            Ok(batch) if batch.is_empty() => {}
            Ok(batch) => {
                process_batch(queue.as_ref(), handler.as_ref(), &batch).await;
            }
            Err(err) => {
                warn!(
                    worker_id,
                    queue = queue.name(),
                    error = %err,
                    "receive failed, backing off"
                );
                tokio::time::sleep(options.poll_wait).await;
            }
        }
    }
    debug!(worker_id, queue = queue.name(), "consumer worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumers::BatchResponse;
    use crate::domain::state::Leg;
    use crate::ports::{IdGenerator, SystemClock, UlidGenerator};
    use crate::queue::{InMemoryQueue, RedrivePolicy};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every message whose body is "fail".
    #[derive(Default)]
    struct Picky {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl BatchHandler for Picky {
        fn leg(&self) -> Leg {
            Leg::Order
        }

        async fn handle_batch(&self, messages: &[ReceivedMessage]) -> BatchResponse {
            self.seen.fetch_add(messages.len(), Ordering::SeqCst);
            let mut response = BatchResponse::default();
            for m in messages.iter().filter(|m| m.body == "fail") {
                response.fail(m.message_id);
            }
            response
        }
    }

    fn queue() -> InMemoryQueue {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
        InMemoryQueue::new("q", Duration::from_secs(30), RedrivePolicy::unlimited(), ids)
    }

    #[tokio::test]
    async fn acks_all_but_failed_messages() {
        let q = queue();
        for body in ["ok", "fail", "ok"] {
            q.send(body.into()).await.unwrap();
        }

        let summary = poll_once(&q, &Picky::default(), 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                received: 3,
                acked: 2,
                failed: 1
            }
        );

        let counts = q.counts().await.unwrap();
        assert_eq!(counts.acked, 2);
        assert_eq!(counts.in_flight, 1);
    }

    #[tokio::test]
    async fn empty_queue_yields_empty_summary() {
        let summary = poll_once(&queue(), &Picky::default(), 10, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(summary, BatchSummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn group_consumes_until_shutdown() {
        let q = queue();
        let handler = Arc::new(Picky::default());
        let group = ConsumerGroup::spawn(
            Arc::new(q.clone()),
            handler.clone(),
            ConsumerOptions::new(2)
                .with_workers(3)
                .with_poll_wait(Duration::from_millis(50)),
        );

        for i in 0..5 {
            q.send(format!("m{i}")).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        group.shutdown_and_join().await;

        assert_eq!(handler.seen.load(Ordering::SeqCst), 5);
        assert_eq!(q.counts().await.unwrap().acked, 5);
    }
}
