//! Status - per-queue message counts of a running pipeline.

use std::fmt;

use serde::Serialize;

use crate::domain::state::Leg;
use crate::ports::QueueCounts;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queue: String,
    pub leg: Leg,
    pub counts: QueueCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub queues: Vec<QueueStatus>,
}

impl PipelineStatus {
    pub fn leg(&self, leg: Leg) -> Option<&QueueStatus> {
        self.queues.iter().find(|q| q.leg == leg)
    }

    /// Messages still visible or in flight, over all queues.
    pub fn outstanding(&self) -> usize {
        self.queues.iter().map(|q| q.counts.outstanding()).sum()
    }

    pub fn dead(&self) -> usize {
        self.queues.iter().map(|q| q.counts.dead).sum()
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:>8} {:>10} {:>7} {:>6}",
            "queue", "visible", "in_flight", "acked", "dead"
        )?;
        for q in &self.queues {
            writeln!(
                f,
                "{:<16} {:>8} {:>10} {:>7} {:>6}",
                q.queue, q.counts.visible, q.counts.in_flight, q.counts.acked, q.counts.dead
            )?;
        }
        Ok(())
    }
}
