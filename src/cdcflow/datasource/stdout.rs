use crate::cdcflow::cdc::OutputRow;
use crate::cdcflow::datasource::traits::RecordSink;
use crate::cdcflow::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};

/// Writes each row as one JSON line on stdout
pub struct StdoutSink {
    name: String,
    out: Stdout,
}

impl StdoutSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            out: tokio::io::stdout(),
        }
    }
}

#[async_trait]
impl RecordSink for StdoutSink {
    async fn write(&mut self, row: &OutputRow) -> PipelineResult<()> {
        let mut line = serde_json::to_vec(row)?;
        line.push(b'\n');
        self.out
            .write_all(&line)
            .await
            .map_err(|e| PipelineError::io(e, "write row to stdout"))
    }

    async fn flush(&mut self) -> PipelineResult<()> {
        self.out
            .flush()
            .await
            .map_err(|e| PipelineError::io(e, "flush stdout"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
