//! Batch Executor
//!
//! Executes a reassignment plan against the cluster:
//! - Fixed-size batches, strictly one at a time
//! - Submit, then poll verification until the batch completes or fails
//! - Progress reporting over an optional channel

use partmover_core::{PartitionMove, RebalanceError, ReassignmentRequest, Result};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};

use crate::admin::{AdminClient, VerifyStatus};

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Partition moves per submitted batch
    pub moves_per_batch: usize,
    /// Delay between verification polls
    pub poll_interval: Duration,
    /// Give up on a batch after this many polls (`None` polls forever)
    pub max_polls: Option<u32>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            moves_per_batch: 10,
            poll_interval: Duration::from_secs(10),
            max_polls: None,
        }
    }
}

/// Progress update for a batch
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// 1-based batch number
    pub batch: usize,
    pub total_batches: usize,
    pub moves: usize,
    pub status: BatchStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    Submitted,
    Polling { attempt: u32 },
    Completed,
    Failed(String),
}

/// Overall execution result
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Batches that completed
    pub batches: usize,
    /// Moves applied across all batches
    pub moves: usize,
    /// Verification polls across all batches
    pub polls: u32,
    /// Total execution time
    pub duration: Duration,
}

impl ExecutionResult {
    /// Summary string
    pub fn summary(&self) -> String {
        format!(
            "{} moves in {} batches, {} polls in {:?}",
            self.moves, self.batches, self.polls, self.duration
        )
    }
}

/// Reassignment batch executor
pub struct BatchExecutor {
    config: ExecutorConfig,
    /// Progress channel
    progress_tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl BatchExecutor {
    /// Create a new executor
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            progress_tx: None,
        }
    }

    /// Create executor with progress channel
    pub fn with_progress(config: ExecutorConfig) -> (Self, mpsc::Receiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::channel(100);
        let mut executor = Self::new(config);
        executor.progress_tx = Some(tx);
        (executor, rx)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Split moves into the requests that will be submitted, in order
    pub fn batches(&self, moves: &[PartitionMove]) -> Vec<ReassignmentRequest> {
        moves
            .chunks(self.config.moves_per_batch.max(1))
            .map(|chunk| ReassignmentRequest::new(chunk.to_vec()))
            .collect()
    }

    /// Execute all moves, one batch at a time
    ///
    /// A failed batch aborts the run; earlier batches stay applied.
    #[instrument(skip(self, admin, moves), fields(moves = moves.len()))]
    pub async fn execute(
        &self,
        admin: &dyn AdminClient,
        moves: &[PartitionMove],
    ) -> Result<ExecutionResult> {
        let start = Instant::now();
        let mut result = ExecutionResult::default();

        let batches = self.batches(moves);
        if batches.is_empty() {
            info!("No moves to execute");
            return Ok(result);
        }

        let total = batches.len();
        info!(batches = total, moves = moves.len(), "Executing reassignment plan");

        for (index, request) in batches.iter().enumerate() {
            let batch = index + 1;
            let polls = self.execute_batch(admin, batch, total, request).await?;
            result.batches += 1;
            result.moves += request.partitions.len();
            result.polls += polls;
        }

        result.duration = start.elapsed();
        info!(summary = %result.summary(), "Reassignment plan complete");
        Ok(result)
    }

    /// Submit one batch and poll it to completion, returning the polls used
    async fn execute_batch(
        &self,
        admin: &dyn AdminClient,
        batch: usize,
        total: usize,
        request: &ReassignmentRequest,
    ) -> Result<u32> {
        let moves = request.partitions.len();
        info!(batch, total, partitions = %request.describe(), "Submitting batch");
        admin.submit_reassignment(request).await?;
        self.report_progress(batch, total, moves, BatchStatus::Submitted)
            .await;

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.report_progress(batch, total, moves, BatchStatus::Polling { attempt })
                .await;

            match admin.verify_reassignment(request).await? {
                VerifyStatus::Completed => {
                    info!(batch, total, polls = attempt, "Batch complete");
                    self.report_progress(batch, total, moves, BatchStatus::Completed)
                        .await;
                    return Ok(attempt);
                }
                VerifyStatus::Failed(status) => {
                    error!(batch, status = %status, "Batch failed");
                    self.report_progress(batch, total, moves, BatchStatus::Failed(status.clone()))
                        .await;
                    return Err(RebalanceError::ExecutionFailed {
                        batch,
                        partitions: request.describe(),
                        status,
                    });
                }
                VerifyStatus::InProgress => {
                    if self.config.max_polls.is_some_and(|max| attempt >= max) {
                        error!(batch, attempts = attempt, "Batch did not finish in time");
                        return Err(RebalanceError::PollTimeout {
                            batch,
                            attempts: attempt,
                        });
                    }
                    debug!(batch, attempt, "Batch still in progress");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// Report progress update
    async fn report_progress(&self, batch: usize, total_batches: usize, moves: usize, status: BatchStatus) {
        if let Some(tx) = &self.progress_tx {
            let _ = tx
                .send(ProgressUpdate {
                    batch,
                    total_batches,
                    moves,
                    status,
                })
                .await;
        }
    }
}
