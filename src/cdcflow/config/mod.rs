//! Job configuration
//!
//! Loaded from YAML, then patched with command-line overrides:
//!
//! ```yaml
//! job_id: 10014
//! parallelism: 4
//! source_database: gmall
//! kafka:
//!   brokers: "broker1:9092,broker2:9092"
//!   group_id: dwd_trade_order_detail
//!   source_topic: topic_db
//! sink:
//!   kind: kafka
//!   topic: dwd_trade_order_detail
//! join:
//!   retention_ms: 5000
//!   ttl_update: on_read_and_write
//! ```

use crate::cdcflow::cdc::TimestampUnit;
use crate::cdcflow::error::{PipelineError, PipelineResult};
use crate::cdcflow::join::{JoinStateStoreConfig, TimeCharacteristic, TtlUpdate};
use crate::cdcflow::kafka::{KafkaSinkConfig, KafkaSourceConfig, OffsetReset};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

fn default_job_id() -> u64 {
    10014
}

fn default_parallelism() -> usize {
    4
}

fn default_order_detail_table() -> String {
    "order_detail".to_string()
}

fn default_order_detail_coupon_table() -> String {
    "order_detail_coupon".to_string()
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_cleanup_interval_ms() -> u64 {
    1000
}

fn default_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_group_id() -> String {
    "dwd_trade_order_detail".to_string()
}

fn default_source_topic() -> String {
    "topic_db".to_string()
}

fn default_start_from_latest() -> bool {
    true
}

fn default_offset_reset() -> OffsetReset {
    OffsetReset::Latest
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_key_column() -> Option<String> {
    Some("id".to_string())
}

fn default_retention_ms() -> u64 {
    5000
}

fn default_max_records() -> usize {
    JoinStateStoreConfig::default().max_records
}

fn default_max_records_per_key() -> usize {
    JoinStateStoreConfig::default().max_records_per_key
}

/// Broker connection and source subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KafkaSettings {
    #[serde(default = "default_brokers")]
    pub brokers: String,

    #[serde(default = "default_group_id")]
    pub group_id: String,

    #[serde(default = "default_source_topic")]
    pub source_topic: String,

    /// Start every run at the log end instead of the group's committed offsets
    #[serde(default = "default_start_from_latest")]
    pub start_from_latest: bool,

    #[serde(default = "default_offset_reset")]
    pub auto_offset_reset: OffsetReset,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Consecutive transient failures tolerated (0 = retry forever)
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            group_id: default_group_id(),
            source_topic: default_source_topic(),
            start_from_latest: default_start_from_latest(),
            auto_offset_reset: default_offset_reset(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_retries: 0,
        }
    }
}

/// Where joined rows go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Kafka,
    Stdout,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkKind::Kafka => write!(f, "kafka"),
            SinkKind::Stdout => write!(f, "stdout"),
        }
    }
}

impl FromStr for SinkKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kafka" => Ok(SinkKind::Kafka),
            "stdout" => Ok(SinkKind::Stdout),
            other => Err(PipelineError::config(format!(
                "unknown sink kind '{}' (expected kafka or stdout)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkSettings {
    #[serde(default)]
    pub kind: SinkKind,

    /// Destination topic; required for the kafka sink
    #[serde(default)]
    pub topic: Option<String>,

    /// Sink brokers when different from the source brokers
    #[serde(default)]
    pub brokers: Option<String>,

    /// Output column used as the message key
    #[serde(default = "default_key_column")]
    pub key_column: Option<String>,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            topic: None,
            brokers: None,
            key_column: default_key_column(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSettings {
    /// Idle-state retention in milliseconds
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    #[serde(default)]
    pub ttl_update: TtlUpdate,

    #[serde(default)]
    pub time_characteristic: TimeCharacteristic,

    #[serde(default = "default_max_records")]
    pub max_records: usize,

    #[serde(default = "default_max_records_per_key")]
    pub max_records_per_key: usize,
}

impl Default for JoinSettings {
    fn default() -> Self {
        Self {
            retention_ms: default_retention_ms(),
            ttl_update: TtlUpdate::default(),
            time_characteristic: TimeCharacteristic::default(),
            max_records: default_max_records(),
            max_records_per_key: default_max_records_per_key(),
        }
    }
}

/// Complete configuration of the order-detail job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_job_id")]
    pub job_id: u64,

    /// Number of join partitions
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    #[serde(default)]
    pub kafka: KafkaSettings,

    /// Database whose change events are consumed; no default
    #[serde(default)]
    pub source_database: Option<String>,

    #[serde(default = "default_order_detail_table")]
    pub order_detail_table: String,

    #[serde(default = "default_order_detail_coupon_table")]
    pub order_detail_coupon_table: String,

    #[serde(default)]
    pub sink: SinkSettings,

    #[serde(default)]
    pub join: JoinSettings,

    /// Unit of the `ts` field in change events
    #[serde(default)]
    pub ts_unit: TimestampUnit,

    /// Capacity of every inter-stage channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Period of the join-state sweep
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            job_id: default_job_id(),
            parallelism: default_parallelism(),
            kafka: KafkaSettings::default(),
            source_database: None,
            order_detail_table: default_order_detail_table(),
            order_detail_coupon_table: default_order_detail_coupon_table(),
            sink: SinkSettings::default(),
            join: JoinSettings::default(),
            ts_unit: TimestampUnit::default(),
            channel_capacity: default_channel_capacity(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub job_id: Option<u64>,
    pub brokers: Option<String>,
    pub group_id: Option<String>,
    pub source_topic: Option<String>,
    pub parallelism: Option<usize>,
    pub retention_ms: Option<u64>,
    pub sink_kind: Option<SinkKind>,
    pub sink_topic: Option<String>,
    pub source_database: Option<String>,
}

impl PipelineConfig {
    pub fn from_yaml_str(yaml: &str) -> PipelineResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::io(e, format!("read config file {}", path.display())))?;
        let config = Self::from_yaml_str(&content)?;
        info!("Loaded job configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_yaml(&self) -> PipelineResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(job_id) = overrides.job_id {
            self.job_id = job_id;
        }
        if let Some(brokers) = overrides.brokers {
            self.kafka.brokers = brokers;
        }
        if let Some(group_id) = overrides.group_id {
            self.kafka.group_id = group_id;
        }
        if let Some(topic) = overrides.source_topic {
            self.kafka.source_topic = topic;
        }
        if let Some(parallelism) = overrides.parallelism {
            self.parallelism = parallelism;
        }
        if let Some(retention_ms) = overrides.retention_ms {
            self.join.retention_ms = retention_ms;
        }
        if let Some(kind) = overrides.sink_kind {
            self.sink.kind = kind;
        }
        if let Some(topic) = overrides.sink_topic {
            self.sink.topic = Some(topic);
        }
        if let Some(database) = overrides.source_database {
            self.source_database = Some(database);
        }
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.parallelism == 0 {
            return Err(PipelineError::config("parallelism must be at least 1"));
        }
        if self.channel_capacity == 0 {
            return Err(PipelineError::config("channel_capacity must be at least 1"));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(PipelineError::config("cleanup_interval_ms must be greater than zero"));
        }
        if self.join.retention_ms == 0 {
            return Err(PipelineError::config("join.retention_ms must be greater than zero"));
        }
        if self.database()?.trim().is_empty() {
            return Err(PipelineError::config("source_database must not be empty"));
        }
        if self.order_detail_table.trim().is_empty() || self.order_detail_coupon_table.trim().is_empty() {
            return Err(PipelineError::config("table names must not be empty"));
        }
        self.source_config().validate()?;
        if self.sink.kind == SinkKind::Kafka {
            self.sink_config()?.validate()?;
        }
        Ok(())
    }

    /// The configured source database
    pub fn database(&self) -> PipelineResult<&str> {
        self.source_database
            .as_deref()
            .ok_or_else(|| PipelineError::config("source_database is required"))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.join.retention_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    pub fn state_limits(&self) -> JoinStateStoreConfig {
        JoinStateStoreConfig::with_limits(self.join.max_records, self.join.max_records_per_key)
    }

    pub fn source_config(&self) -> KafkaSourceConfig {
        KafkaSourceConfig::new(
            &self.kafka.brokers,
            &self.kafka.group_id,
            &self.kafka.source_topic,
        )
        .client_id(format!("cdcflow-{}", self.job_id))
        .start_from_latest(self.kafka.start_from_latest)
        .auto_offset_reset(self.kafka.auto_offset_reset)
        .retry_backoff(
            Duration::from_millis(self.kafka.retry_backoff_ms),
            Duration::from_millis(self.kafka.max_backoff_ms),
        )
        .max_retries(self.kafka.max_retries)
    }

    pub fn sink_config(&self) -> PipelineResult<KafkaSinkConfig> {
        let topic = self
            .sink
            .topic
            .as_deref()
            .ok_or_else(|| PipelineError::config("sink.topic is required for the kafka sink"))?;
        let brokers = self.sink.brokers.as_deref().unwrap_or(&self.kafka.brokers);
        let mut config = KafkaSinkConfig::new(brokers, topic);
        config.key_column = self.sink.key_column.clone();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal() -> PipelineConfig {
        PipelineConfig {
            source_database: Some("gmall".to_string()),
            sink: SinkSettings {
                topic: Some("dwd_trade_order_detail".to_string()),
                ..SinkSettings::default()
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_yaml_str("source_database: gmall\n").unwrap();
        assert_eq!(config.job_id, 10014);
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.kafka.group_id, "dwd_trade_order_detail");
        assert_eq!(config.kafka.source_topic, "topic_db");
        assert_eq!(config.kafka.auto_offset_reset, OffsetReset::Latest);
        assert_eq!(config.join.retention_ms, 5000);
        assert_eq!(config.join.ttl_update, TtlUpdate::OnReadAndWrite);
        assert_eq!(config.order_detail_coupon_table, "order_detail_coupon");
        assert_eq!(config.ts_unit, TimestampUnit::Seconds);
        assert_eq!(config.sink.key_column.as_deref(), Some("id"));
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = minimal();
        config.join.time_characteristic = TimeCharacteristic::EventTime;
        config.sink.kind = SinkKind::Stdout;
        let yaml = config.to_yaml().unwrap();
        assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_validation_requires_database_and_sink_topic() {
        assert!(minimal().validate().is_ok());

        let mut no_db = minimal();
        no_db.source_database = None;
        assert!(matches!(no_db.validate(), Err(PipelineError::Config { .. })));

        let mut no_topic = minimal();
        no_topic.sink.topic = None;
        assert!(no_topic.validate().is_err());

        no_topic.sink.kind = SinkKind::Stdout;
        assert!(no_topic.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_source_settings() {
        let mut config = minimal();
        config.kafka.group_id = String::new();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.kafka.source_topic = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.parallelism = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = minimal();
        config.apply_overrides(ConfigOverrides {
            brokers: Some("kafka:29092".to_string()),
            parallelism: Some(1),
            retention_ms: Some(10_000),
            sink_kind: Some(SinkKind::Stdout),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.kafka.brokers, "kafka:29092");
        assert_eq!(config.parallelism, 1);
        assert_eq!(config.retention(), Duration::from_secs(10));
        assert_eq!(config.sink.kind, SinkKind::Stdout);
        assert_eq!(config.source_database.as_deref(), Some("gmall"));
    }

    #[test]
    fn test_builds_client_configs() {
        let config = minimal();
        let source = config.source_config();
        assert_eq!(source.topic, "topic_db");
        assert_eq!(source.client_id.as_deref(), Some("cdcflow-10014"));
        assert!(source.start_from_latest);
        let sink = config.sink_config().unwrap();
        assert_eq!(sink.topic, "dwd_trade_order_detail");
        assert_eq!(sink.brokers, "localhost:9092");
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "source_database: gmall\nparallelism: 2\nsink:\n  kind: stdout\njoin:\n  retention_ms: 7000\n  ttl_update: on_create_and_write"
        )
        .unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.parallelism, 2);
        assert_eq!(config.sink.kind, SinkKind::Stdout);
        assert_eq!(config.join.ttl_update, TtlUpdate::OnCreateAndWrite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = PipelineConfig::from_file("/nonexistent/cdcflow.yaml").unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }

    #[test]
    fn test_sink_kind_from_str() {
        assert_eq!("STDOUT".parse::<SinkKind>().unwrap(), SinkKind::Stdout);
        assert!("file".parse::<SinkKind>().is_err());
    }
}
