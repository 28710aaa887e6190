use cdcflow::cdcflow::config::{ConfigOverrides, PipelineConfig, SinkKind};
use cdcflow::cdcflow::error::PipelineResult;
use cdcflow::cdcflow::job::dwd_trade_order_detail;
use cdcflow::cdcflow::server::{ShutdownConfig, ShutdownCoordinator};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "dwd-trade-order-detail")]
#[command(about = "Join order detail and order detail coupon change events from Kafka")]
#[command(version)]
struct Cli {
    /// YAML job configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kafka broker addresses
    #[arg(long)]
    brokers: Option<String>,

    /// Consumer group of the source
    #[arg(long)]
    group_id: Option<String>,

    /// Source topic carrying change events
    #[arg(long)]
    topic: Option<String>,

    /// Number of join partitions
    #[arg(long)]
    parallelism: Option<usize>,

    /// Join state retention in milliseconds
    #[arg(long)]
    retention_ms: Option<u64>,

    /// Sink kind: kafka or stdout
    #[arg(long)]
    sink: Option<SinkKind>,

    /// Destination topic for the kafka sink
    #[arg(long)]
    sink_topic: Option<String>,

    /// Source database whose tables are joined
    #[arg(long)]
    database: Option<String>,

    /// Numeric job identifier
    #[arg(long)]
    job_id: Option<u64>,

    /// Seconds allowed for draining after a shutdown signal
    #[arg(long, default_value = "30")]
    shutdown_timeout_secs: u64,
}

impl Cli {
    fn load_config(&self) -> PipelineResult<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_overrides(ConfigOverrides {
            job_id: self.job_id,
            brokers: self.brokers.clone(),
            group_id: self.group_id.clone(),
            source_topic: self.topic.clone(),
            parallelism: self.parallelism,
            retention_ms: self.retention_ms,
            sink_kind: self.sink,
            sink_topic: self.sink_topic.clone(),
            source_database: self.database.clone(),
        });
        config.validate()?;
        Ok(config)
    }
}

async fn run(cli: Cli) -> PipelineResult<()> {
    let config = cli.load_config()?;
    let shutdown_config = ShutdownConfig::with_timeout(Duration::from_secs(cli.shutdown_timeout_secs));
    let pipeline = dwd_trade_order_detail::build_from_config(&config)?;

    let shutdown = ShutdownCoordinator::new();
    let mut signal_rx = shutdown.subscribe();
    let waiter = shutdown.clone();
    tokio::spawn(async move { waiter.wait_for_signal().await });

    let mut job = tokio::spawn(pipeline.run(shutdown));

    let joined = tokio::select! {
        joined = &mut job => joined,
        _ = signal_rx.recv() => {
            info!("Draining job (up to {:?})", shutdown_config.timeout);
            match tokio::time::timeout(shutdown_config.timeout, &mut job).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Job did not stop within {:?}, aborting", shutdown_config.timeout);
                    job.abort();
                    return Err(cdcflow::PipelineError::stage(
                        "job",
                        format!("did not stop within {:?}", shutdown_config.timeout),
                    ));
                }
            }
        }
    };

    match joined {
        Ok(result) => {
            let report = result?;
            info!("Job {} finished: {}", config.job_id, report);
            Ok(())
        }
        Err(e) => Err(cdcflow::PipelineError::stage("job", e.to_string())),
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Job failed: {}", e);
        std::process::exit(1);
    }
}
