use crate::cdcflow::error::{PipelineError, PipelineResult};
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaResult;
use rdkafka::{Offset, TopicPartitionList};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Where a consumer group with no committed offset starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// Reset to earliest available offset
    Earliest,
    /// Reset to latest offset (skip the backlog)
    Latest,
    /// Throw error if no initial offset
    None,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
            OffsetReset::None => "none",
        }
    }
}

/// Configuration for the Kafka text source with sensible defaults
#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    /// Kafka broker list (e.g., "localhost:9092" or "broker1:9092,broker2:9092")
    pub brokers: String,
    /// Consumer group ID
    pub group_id: String,
    /// Topic to subscribe to
    pub topic: String,
    /// Client ID for this consumer instance
    pub client_id: Option<String>,
    /// Position every partition at the log end on startup, ignoring the
    /// group's committed offsets
    pub start_from_latest: bool,
    /// Where to start when the group has no committed offset; only consulted
    /// when `start_from_latest` is off
    pub auto_offset_reset: OffsetReset,
    /// Enable auto commit
    pub enable_auto_commit: bool,
    /// Auto commit interval
    pub auto_commit_interval: Duration,
    /// Session timeout
    pub session_timeout: Duration,
    /// How long to wait for topic metadata when assigning partitions
    pub metadata_timeout: Duration,
    /// Initial delay before retrying a transient broker failure
    pub retry_backoff: Duration,
    /// Upper bound for the exponential retry delay
    pub max_backoff: Duration,
    /// Consecutive transient failures tolerated before giving up (0 = forever)
    pub max_retries: u32,
    /// Additional custom configuration properties
    pub custom_config: HashMap<String, String>,
}

impl KafkaSourceConfig {
    /// Create a new config; starts from the latest offset
    pub fn new(
        brokers: impl Into<String>,
        group_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            topic: topic.into(),
            client_id: None,
            start_from_latest: true,
            auto_offset_reset: OffsetReset::Latest,
            enable_auto_commit: true,
            auto_commit_interval: Duration::from_secs(5),
            session_timeout: Duration::from_secs(30),
            metadata_timeout: Duration::from_secs(10),
            retry_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
            max_retries: 0,
            custom_config: HashMap::new(),
        }
    }

    /// Set client ID
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Choose between a fresh start at the log end and resuming the group
    pub fn start_from_latest(mut self, enabled: bool) -> Self {
        self.start_from_latest = enabled;
        self
    }

    /// Set auto offset reset behavior
    pub fn auto_offset_reset(mut self, reset: OffsetReset) -> Self {
        self.auto_offset_reset = reset;
        self
    }

    /// Set retry backoff bounds
    pub fn retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.retry_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Set the retry budget for transient failures
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Add custom configuration property
    pub fn custom_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_config.insert(key.into(), value.into());
        self
    }

    /// Reject configurations that can never subscribe
    pub fn validate(&self) -> PipelineResult<()> {
        if self.brokers.trim().is_empty() {
            return Err(PipelineError::config("kafka brokers must not be empty"));
        }
        if self.group_id.trim().is_empty() {
            return Err(PipelineError::config("consumer group id must not be empty"));
        }
        if self.topic.trim().is_empty() {
            return Err(PipelineError::config("source topic must not be empty"));
        }
        if self.max_backoff < self.retry_backoff {
            return Err(PipelineError::config(
                "max backoff must not be smaller than the initial retry backoff",
            ));
        }
        Ok(())
    }

    /// Build the librdkafka client configuration
    pub fn to_client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", self.auto_offset_reset.as_str())
            .set("enable.auto.commit", self.enable_auto_commit.to_string())
            .set(
                "auto.commit.interval.ms",
                self.auto_commit_interval.as_millis().to_string(),
            )
            .set(
                "session.timeout.ms",
                self.session_timeout.as_millis().to_string(),
            )
            .set(
                "retry.backoff.ms",
                self.retry_backoff.as_millis().to_string(),
            )
            .set("enable.partition.eof", "false");

        if let Some(client_id) = &self.client_id {
            client_config.set("client.id", client_id);
        }

        // Custom properties go last so they can override the defaults above
        for (key, value) in &self.custom_config {
            client_config.set(key, value);
        }

        client_config
    }

    /// Explicit assignment placing each of `partitions` at the log end
    ///
    /// Assigned offsets take precedence over anything committed by the group,
    /// so records produced while the job was down are never replayed.
    pub fn latest_assignment(&self, partitions: &[i32]) -> KafkaResult<TopicPartitionList> {
        let mut assignment = TopicPartitionList::with_capacity(partitions.len());
        for &partition in partitions {
            assignment.add_partition_offset(&self.topic, partition, Offset::End)?;
        }
        Ok(assignment)
    }
}
