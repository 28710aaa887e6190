//! # cdcflow
//!
//! A streaming ETL job over change-data-capture records in Kafka. It reads
//! JSON change events from a topic, splits them into two filtered and
//! projected streams, inner-joins those streams on a key with bounded
//! idle-state retention, and writes the joined rows to a sink.
//!
//! ## Building blocks
//!
//! - [`cdcflow::kafka`]: Kafka source and JSON sink on `rdkafka`
//! - [`cdcflow::query`]: `(database, table, type)` filters and column projections
//! - [`cdcflow::join`]: retention-bounded equi-join state and coordinator
//! - [`cdcflow::server`]: partitioned runtime, shutdown handling
//! - [`cdcflow::job`]: the trade order detail job
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cdcflow::{MemorySink, MemorySource, PipelineConfig, ShutdownCoordinator};
//! use cdcflow::cdcflow::job::dwd_trade_order_detail;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = PipelineConfig::default();
//!     config.source_database = Some("gmall".to_string());
//!     config.sink.topic = Some("dwd_trade_order_detail".to_string());
//!
//!     let source = MemorySource::from_texts("topic_db", vec![
//!         r#"{"database":"gmall","table":"order_detail","type":"insert","ts":1700000000,"data":{"id":1,"order_id":100}}"#,
//!         r#"{"database":"gmall","table":"order_detail_coupon","type":"insert","ts":1700000001,"data":{"order_detail_id":100}}"#,
//!     ]);
//!     let sink = MemorySink::new("out");
//!
//!     let pipeline = dwd_trade_order_detail::build_pipeline(&config, Box::new(source), Box::new(sink.clone()))?;
//!     let report = pipeline.run(ShutdownCoordinator::new()).await?;
//!     println!("{} rows written", report.rows_written);
//!     Ok(())
//! }
//! ```

#![allow(clippy::collapsible_if)]

pub mod cdcflow;

pub use cdcflow::cdc::{ChangeEvent, FieldValue, OperationType, OutputRow, Row, TimestampUnit};
pub use cdcflow::config::{ConfigOverrides, PipelineConfig, SinkKind};
pub use cdcflow::datasource::{ChannelSource, MemorySink, MemorySource, RecordSink, StdoutSink, TextSource};
pub use cdcflow::error::{PipelineError, PipelineResult};
pub use cdcflow::join::{JoinConfig, JoinCoordinator, JoinSide, ResultProjection, TimeCharacteristic, TtlUpdate};
pub use cdcflow::kafka::{KafkaJsonSink, KafkaSourceConfig, KafkaTextSource};
pub use cdcflow::query::{EventPredicate, FilterProjectPlan, Projection, SplitStage};
pub use cdcflow::server::{Pipeline, PipelineOptions, PipelineReport, ShutdownCoordinator, ShutdownSignal};
