//! Pipeline runner
//!
//! Wires the stages as tokio tasks joined by bounded channels:
//!
//! ```text
//! source ─► decode ─► split ─► HashRouter ─┬─► partition 0 ─┐
//!                                          ├─► partition 1 ─┼─► sink
//!                                          └─► partition N ─┘
//! ```
//!
//! The run ends when the source is exhausted or a shutdown is triggered. In
//! both cases the source stops, partition inputs drain, and the sink is
//! flushed before [`Pipeline::run`] returns its [`PipelineReport`]. A failing
//! stage triggers the same shutdown and its error is returned.

use crate::cdcflow::cdc::{ChangeEvent, OutputRow, Row};
use crate::cdcflow::datasource::traits::{RecordSink, TextSource};
use crate::cdcflow::error::{PipelineError, PipelineResult};
use crate::cdcflow::join::{Clock, JoinConfig, JoinCoordinator, JoinSide, ResultProjection, SystemClock};
use crate::cdcflow::query::SplitStage;
use crate::cdcflow::server::hash_router::HashRouter;
use crate::cdcflow::server::partition_worker::{PartitionOutcome, PartitionWorker};
use crate::cdcflow::server::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::cdcflow::server::stats::{PipelineReport, SourceStageStats};
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runtime knobs of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub name: String,
    /// Number of join partitions
    pub parallelism: usize,
    /// Capacity of each inter-stage channel
    pub channel_capacity: usize,
    /// Period of the join-state sweep
    pub cleanup_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            name: "pipeline".to_string(),
            parallelism: 4,
            channel_capacity: 1024,
            cleanup_interval: Duration::from_secs(1),
        }
    }
}

pub struct Pipeline {
    source: Box<dyn TextSource>,
    sink: Box<dyn RecordSink>,
    split: SplitStage,
    join_config: JoinConfig,
    projection: ResultProjection,
    options: PipelineOptions,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    /// Validate the join definition and assemble a pipeline
    pub fn new(
        source: Box<dyn TextSource>,
        sink: Box<dyn RecordSink>,
        split: SplitStage,
        join_config: JoinConfig,
        projection: ResultProjection,
        options: PipelineOptions,
    ) -> PipelineResult<Self> {
        join_config.validate()?;
        projection.validate()?;
        if options.parallelism == 0 {
            return Err(PipelineError::config("parallelism must be at least 1"));
        }
        if options.channel_capacity == 0 {
            return Err(PipelineError::config("channel capacity must be at least 1"));
        }
        if options.cleanup_interval.is_zero() {
            return Err(PipelineError::config("cleanup interval must be greater than zero"));
        }
        Ok(Self {
            source,
            sink,
            split,
            join_config,
            projection,
            options,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the processing-time clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run until the source ends or `shutdown` fires
    pub async fn run(self, shutdown: ShutdownCoordinator) -> PipelineResult<PipelineReport> {
        let started = Instant::now();
        let Pipeline {
            source,
            sink,
            split,
            join_config,
            projection,
            options,
            clock,
        } = self;

        info!(
            "Pipeline '{}': starting with {} partition(s), source '{}', sink '{}', retention {:?}",
            options.name,
            options.parallelism,
            source.name(),
            sink.name(),
            join_config.retention
        );

        let router = HashRouter::new(options.parallelism)?;
        let (output_tx, output_rx) = mpsc::channel::<OutputRow>(options.channel_capacity);

        let mut partition_senders = Vec::with_capacity(options.parallelism);
        let mut worker_handles: Vec<JoinHandle<PartitionOutcome>> = Vec::with_capacity(options.parallelism);
        for partition_id in 0..options.parallelism {
            let (tx, rx) = mpsc::channel::<(JoinSide, Row)>(options.channel_capacity);
            let coordinator =
                JoinCoordinator::with_clock(join_config.clone(), projection.clone(), Arc::clone(&clock));
            let worker = PartitionWorker::new(
                partition_id,
                coordinator,
                rx,
                output_tx.clone(),
                options.cleanup_interval,
            );
            partition_senders.push(tx);
            worker_handles.push(tokio::spawn(worker.run()));
        }
        drop(output_tx);

        let sink_handle = tokio::spawn(run_sink(sink, output_rx, shutdown.clone()));

        let source_stage = SourceStage {
            source,
            split,
            join_config,
            router,
            senders: partition_senders,
        };
        let source_handle = tokio::spawn(source_stage.run(shutdown.clone()));

        let source_result = join_stage("source", source_handle).await;
        if let Err(e) = &source_result {
            error!("Pipeline '{}': source stage failed: {}", options.name, e);
        }

        let mut partitions = Vec::with_capacity(options.parallelism);
        let mut discarded_state = 0u64;
        let mut worker_error = None;
        for outcome in join_all(worker_handles).await {
            match outcome {
                Ok(outcome) => {
                    discarded_state += outcome.discarded as u64;
                    partitions.push(outcome.stats);
                }
                Err(e) => {
                    worker_error.get_or_insert_with(|| PipelineError::stage("partition", e.to_string()));
                }
            }
        }

        let sink_result = join_stage("sink", sink_handle).await;

        // The sink error is the root cause when both ends fail
        let rows_written = sink_result?;
        let source = source_result?;
        if let Some(e) = worker_error {
            return Err(e);
        }

        let report = PipelineReport {
            source,
            partitions,
            discarded_state,
            rows_written,
            elapsed: started.elapsed(),
        };
        info!("Pipeline '{}': finished, {}", options.name, report);
        Ok(report)
    }
}

async fn join_stage<T>(stage: &str, handle: JoinHandle<PipelineResult<T>>) -> PipelineResult<T> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(PipelineError::stage(stage, e.to_string())),
    }
}

/// Reads, decodes, splits and routes source messages
struct SourceStage {
    source: Box<dyn TextSource>,
    split: SplitStage,
    join_config: JoinConfig,
    router: HashRouter,
    senders: Vec<mpsc::Sender<(JoinSide, Row)>>,
}

impl SourceStage {
    async fn run(mut self, shutdown: ShutdownCoordinator) -> PipelineResult<SourceStageStats> {
        let mut stats = SourceStageStats::default();
        let mut shutdown_rx = shutdown.subscribe();

        if shutdown.is_triggered() {
            info!("Source '{}': shutdown requested before start", self.source.name());
            return Ok(stats);
        }

        loop {
            let message = tokio::select! {
                signal = shutdown_rx.recv() => {
                    info!(
                        "Source '{}': stopping on {}",
                        self.source.name(),
                        signal.unwrap_or(ShutdownSignal::Requested)
                    );
                    break;
                }
                message = self.source.next_message() => message,
            };

            let message = match message {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!("Source '{}': no more data", self.source.name());
                    break;
                }
                Err(e) if e.is_recoverable() => {
                    stats.messages_read += 1;
                    stats.decode_failures += 1;
                    warn!("Source '{}': dropping record: {}", self.source.name(), e);
                    continue;
                }
                Err(e) => {
                    shutdown.trigger(ShutdownSignal::Requested);
                    return Err(e);
                }
            };
            stats.messages_read += 1;

            let Some(payload) = message.payload else {
                stats.null_payloads += 1;
                debug!(
                    "Source '{}': null payload at {}/{}@{}",
                    self.source.name(),
                    message.topic,
                    message.partition,
                    message.offset
                );
                continue;
            };

            let event = match ChangeEvent::from_json(&payload).map_err(PipelineError::from) {
                Ok(event) => event,
                Err(e) if e.is_recoverable() => {
                    stats.decode_failures += 1;
                    warn!(
                        "Source '{}': dropping record at offset {}: {}",
                        self.source.name(),
                        message.offset,
                        e
                    );
                    continue;
                }
                Err(e) => {
                    shutdown.trigger(ShutdownSignal::Requested);
                    return Err(e);
                }
            };

            let rows = self.split.split(&event);
            if rows.is_empty() {
                stats.filtered_out += 1;
                continue;
            }

            for (side, row) in rows {
                match side {
                    JoinSide::Left => stats.left_rows += 1,
                    JoinSide::Right => stats.right_rows += 1,
                }
                let key = self.join_config.extract_key(side, &row);
                let partition = self.router.route(key.as_deref());
                if self.senders[partition].send((side, row)).await.is_err() {
                    warn!(
                        "Source '{}': partition {} is gone, stopping",
                        self.source.name(),
                        partition
                    );
                    return Ok(stats);
                }
            }
        }

        Ok(stats)
    }
}

/// Writes joined rows until every partition has finished, then flushes
async fn run_sink(
    mut sink: Box<dyn RecordSink>,
    mut rows: mpsc::Receiver<OutputRow>,
    shutdown: ShutdownCoordinator,
) -> PipelineResult<u64> {
    let mut written = 0u64;

    while let Some(row) = rows.recv().await {
        if let Err(e) = sink.write(&row).await {
            error!("Sink '{}': write failed after {} rows: {}", sink.name(), written, e);
            shutdown.trigger(ShutdownSignal::Requested);
            return Err(e);
        }
        written += 1;
    }

    if let Err(e) = sink.flush().await {
        error!("Sink '{}': flush failed: {}", sink.name(), e);
        return Err(e);
    }
    info!("Sink '{}': flushed after {} rows", sink.name(), written);
    Ok(written)
}
