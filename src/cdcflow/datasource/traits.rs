//! Source and sink abstraction traits
//!
//! The pipeline reads decoded text messages from a [`TextSource`] and writes
//! joined rows to a [`RecordSink`]. Kafka implementations live in
//! `cdcflow::kafka`; in-process ones in [`super::memory`] and
//! [`super::stdout`].

use crate::cdcflow::cdc::OutputRow;
use crate::cdcflow::error::PipelineResult;
use async_trait::async_trait;

/// One decoded message together with its broker coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMessage {
    /// Decoded value; `None` for a null payload
    pub payload: Option<String>,
    /// Topic the message was read from
    pub topic: String,
    /// Partition number this message came from
    pub partition: i32,
    /// Offset of this message within its partition
    pub offset: i64,
    /// Broker timestamp (milliseconds since epoch), when available
    pub timestamp: Option<i64>,
}

impl SourceMessage {
    /// Message with no broker coordinates, for in-process sources
    pub fn detached(payload: Option<String>, topic: &str, offset: i64) -> Self {
        Self {
            payload,
            topic: topic.to_string(),
            partition: 0,
            offset,
            timestamp: None,
        }
    }
}

/// Unbounded (or bounded, for in-process sources) sequence of text messages
#[async_trait]
pub trait TextSource: Send + 'static {
    /// Wait for the next message
    ///
    /// Returns `Ok(None)` only when a bounded source is exhausted; broker
    /// sources never report an end of stream.
    async fn next_message(&mut self) -> PipelineResult<Option<SourceMessage>>;

    /// Human readable source name for logs
    fn name(&self) -> &str;
}

/// Destination for joined rows
#[async_trait]
pub trait RecordSink: Send + 'static {
    /// Write a single row
    async fn write(&mut self, row: &OutputRow) -> PipelineResult<()>;

    /// Flush any buffered writes
    async fn flush(&mut self) -> PipelineResult<()>;

    /// Sink identifier for logs and errors
    fn name(&self) -> &str;
}
