//! Partition worker
//!
//! Each worker owns one [`JoinCoordinator`] outright. Records for a given join
//! key always arrive at the same worker, in source order, so join state needs
//! no locking.

use crate::cdcflow::cdc::{OutputRow, Row};
use crate::cdcflow::join::{JoinCoordinator, JoinCoordinatorStats, JoinSide};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Final state of a worker after its input closed
#[derive(Debug, Clone)]
pub struct PartitionOutcome {
    pub partition_id: usize,
    pub stats: JoinCoordinatorStats,
    /// Buffered records dropped when the worker stopped
    pub discarded: usize,
}

pub struct PartitionWorker {
    partition_id: usize,
    coordinator: JoinCoordinator,
    receiver: mpsc::Receiver<(JoinSide, Row)>,
    output: mpsc::Sender<OutputRow>,
    cleanup_interval: Duration,
}

impl PartitionWorker {
    pub fn new(
        partition_id: usize,
        coordinator: JoinCoordinator,
        receiver: mpsc::Receiver<(JoinSide, Row)>,
        output: mpsc::Sender<OutputRow>,
        cleanup_interval: Duration,
    ) -> Self {
        debug!("PartitionWorker {}: created", partition_id);
        Self {
            partition_id,
            coordinator,
            receiver,
            output,
            cleanup_interval,
        }
    }

    /// Process records until the input closes or the sink goes away
    pub async fn run(mut self) -> PartitionOutcome {
        let mut cleanup = tokio::time::interval(self.cleanup_interval);
        cleanup.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        cleanup.tick().await;

        loop {
            tokio::select! {
                biased;

                input = self.receiver.recv() => {
                    let Some((side, row)) = input else {
                        break;
                    };
                    if !self.emit(side, row).await {
                        warn!(
                            "PartitionWorker {}: output closed, stopping",
                            self.partition_id
                        );
                        break;
                    }
                }
                _ = cleanup.tick() => {
                    let (left, right) = self.coordinator.expire();
                    if left + right > 0 {
                        debug!(
                            "PartitionWorker {}: expired {} left / {} right records",
                            self.partition_id, left, right
                        );
                    }
                }
            }
        }

        let discarded = self.coordinator.clear();
        info!(
            "PartitionWorker {}: stopped, {} matches emitted, {} buffered records discarded",
            self.partition_id,
            self.coordinator.stats().matches_emitted,
            discarded
        );

        PartitionOutcome {
            partition_id: self.partition_id,
            stats: self.coordinator.stats().clone(),
            discarded,
        }
    }

    /// Join one record; false when the output channel is closed
    async fn emit(&mut self, side: JoinSide, row: Row) -> bool {
        for joined in self.coordinator.process(side, row) {
            if self.output.send(joined).await.is_err() {
                return false;
            }
        }
        true
    }
}
