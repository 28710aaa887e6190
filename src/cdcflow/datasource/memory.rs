//! In-process sources and sinks
//!
//! Used by tests and by dry runs of the job without a broker.

use crate::cdcflow::cdc::OutputRow;
use crate::cdcflow::datasource::traits::{RecordSink, SourceMessage, TextSource};
use crate::cdcflow::error::PipelineResult;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Bounded source replaying a fixed list of payloads
pub struct MemorySource {
    name: String,
    messages: VecDeque<Option<String>>,
    next_offset: i64,
    delay: Option<Duration>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, payloads: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            messages: payloads.into(),
            next_offset: 0,
            delay: None,
        }
    }

    /// Build from non-null payloads
    pub fn from_texts<I, S>(name: impl Into<String>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, texts.into_iter().map(|t| Some(t.into())).collect())
    }

    /// Sleep before each message, to emulate arrival timing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TextSource for MemorySource {
    async fn next_message(&mut self) -> PipelineResult<Option<SourceMessage>> {
        let Some(payload) = self.messages.pop_front() else {
            return Ok(None);
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let offset = self.next_offset;
        self.next_offset += 1;
        Ok(Some(SourceMessage::detached(payload, &self.name, offset)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Source fed through a channel; ends when every sender is dropped
pub struct ChannelSource {
    name: String,
    receiver: mpsc::Receiver<Option<String>>,
    next_offset: i64,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    pub fn new(name: impl Into<String>, capacity: usize) -> (mpsc::Sender<Option<String>>, Self) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            sender,
            Self {
                name: name.into(),
                receiver,
                next_offset: 0,
            },
        )
    }
}

#[async_trait]
impl TextSource for ChannelSource {
    async fn next_message(&mut self) -> PipelineResult<Option<SourceMessage>> {
        match self.receiver.recv().await {
            Some(payload) => {
                let offset = self.next_offset;
                self.next_offset += 1;
                Ok(Some(SourceMessage::detached(payload, &self.name, offset)))
            }
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Sink collecting rows in memory; clones share the same buffer
#[derive(Clone, Default)]
pub struct MemorySink {
    name: String,
    rows: Arc<Mutex<Vec<OutputRow>>>,
    flushes: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Snapshot of the rows written so far
    pub fn rows(&self) -> Vec<OutputRow> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of completed flushes
    pub fn flush_count(&self) -> usize {
        match self.flushes.lock() {
            Ok(count) => *count,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write(&mut self, row: &OutputRow) -> PipelineResult<()> {
        match self.rows.lock() {
            Ok(mut rows) => rows.push(row.clone()),
            Err(poisoned) => poisoned.into_inner().push(row.clone()),
        }
        Ok(())
    }

    async fn flush(&mut self) -> PipelineResult<()> {
        match self.flushes.lock() {
            Ok(mut count) => *count += 1,
            Err(poisoned) => *poisoned.into_inner() += 1,
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdcflow::cdc::FieldValue;

    #[tokio::test]
    async fn test_memory_source_is_bounded() {
        let mut source = MemorySource::new("mem", vec![Some("a".into()), None]);
        let first = source.next_message().await.unwrap().unwrap();
        assert_eq!(first.payload.as_deref(), Some("a"));
        assert_eq!(first.offset, 0);
        let second = source.next_message().await.unwrap().unwrap();
        assert!(second.payload.is_none());
        assert_eq!(second.offset, 1);
        assert!(source.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_sender_drops() {
        let (sender, mut source) = ChannelSource::new("chan", 4);
        sender.send(Some("x".into())).await.unwrap();
        drop(sender);
        assert!(source.next_message().await.unwrap().is_some());
        assert!(source.next_message().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_sink_shares_buffer_between_clones() {
        let sink = MemorySink::new("mem");
        let mut writer = sink.clone();
        let row = OutputRow::new(vec![("id".into(), FieldValue::Integer(1))]);
        writer.write(&row).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(sink.rows(), vec![row]);
        assert_eq!(sink.flush_count(), 1);
    }
}
