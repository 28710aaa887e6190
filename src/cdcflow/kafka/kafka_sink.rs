//! Kafka sink writing joined rows as JSON

use crate::cdcflow::cdc::OutputRow;
use crate::cdcflow::datasource::traits::RecordSink;
use crate::cdcflow::error::{PipelineError, PipelineResult};
use crate::cdcflow::kafka::deserializer::to_json;
use async_trait::async_trait;
use log::{debug, error, info};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;

/// Configuration for the Kafka sink
#[derive(Debug, Clone)]
pub struct KafkaSinkConfig {
    /// Kafka broker list
    pub brokers: String,
    /// Destination topic
    pub topic: String,
    /// Output column used as the message key (none = unkeyed)
    pub key_column: Option<String>,
    /// Producer acknowledgement level
    pub acks: String,
    /// How long a single send may wait in the local queue
    pub send_timeout: Duration,
}

impl KafkaSinkConfig {
    pub fn new(brokers: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            topic: topic.into(),
            key_column: None,
            acks: "all".to_string(),
            send_timeout: Duration::from_secs(5),
        }
    }

    /// Key messages by an output column
    pub fn key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = Some(column.into());
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.brokers.trim().is_empty() {
            return Err(PipelineError::config("sink brokers must not be empty"));
        }
        if self.topic.trim().is_empty() {
            return Err(PipelineError::config("sink topic must not be empty"));
        }
        Ok(())
    }

    /// Build the librdkafka producer configuration
    pub fn to_client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("acks", &self.acks)
            .set(
                "message.timeout.ms",
                self.send_timeout.as_millis().max(1).to_string(),
            );
        client_config
    }
}

/// Writes each row as a JSON value to a Kafka topic
pub struct KafkaJsonSink {
    producer: FutureProducer,
    config: KafkaSinkConfig,
}

impl KafkaJsonSink {
    pub fn new(config: KafkaSinkConfig) -> PipelineResult<Self> {
        config.validate()?;
        let producer: FutureProducer = config
            .to_client_config()
            .create()
            .map_err(|e| PipelineError::sink(&config.topic, format!("failed to create producer: {}", e)))?;
        info!(
            "KafkaJsonSink: writing to '{}' (key column: {:?})",
            config.topic, config.key_column
        );
        Ok(Self { producer, config })
    }

    fn extract_key(&self, row: &OutputRow) -> Option<String> {
        self.config
            .key_column
            .as_deref()
            .and_then(|column| row.get(column).to_key_string())
    }
}

#[async_trait]
impl RecordSink for KafkaJsonSink {
    async fn write(&mut self, row: &OutputRow) -> PipelineResult<()> {
        let payload = to_json(row).map_err(|e| PipelineError::sink(&self.config.topic, e.to_string()))?;
        let key = self.extract_key(row);

        let mut record = FutureRecord::to(&self.config.topic).payload(&payload);
        if let Some(key) = &key {
            record = record.key(key);
        }

        match self.producer.send(record, self.config.send_timeout).await {
            Ok(_) => {
                debug!(
                    "KafkaJsonSink: sent record to '{}' with key {:?}",
                    self.config.topic, key
                );
                Ok(())
            }
            Err((kafka_error, _)) => {
                error!(
                    "KafkaJsonSink: failed to send record to '{}': {}",
                    self.config.topic, kafka_error
                );
                Err(PipelineError::sink(&self.config.topic, kafka_error.to_string()))
            }
        }
    }

    async fn flush(&mut self) -> PipelineResult<()> {
        self.producer
            .flush(self.config.send_timeout)
            .map_err(|e| PipelineError::sink(&self.config.topic, format!("flush failed: {}", e)))
    }

    fn name(&self) -> &str {
        &self.config.topic
    }
}
