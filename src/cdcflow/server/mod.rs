//! Job runtime: partitioned execution, shutdown handling and run statistics

pub mod hash_router;
pub mod partition_worker;
pub mod pipeline;
pub mod shutdown;
pub mod stats;

pub use hash_router::HashRouter;
pub use partition_worker::{PartitionOutcome, PartitionWorker};
pub use pipeline::{Pipeline, PipelineOptions};
pub use shutdown::{ShutdownConfig, ShutdownCoordinator, ShutdownSignal, shutdown_signal};
pub use stats::{PipelineReport, SourceStageStats};
