use crate::cdcflow::cdc::EventDecodeError;
use crate::cdcflow::datasource::traits::{SourceMessage, TextSource};
use crate::cdcflow::error::{PipelineError, PipelineResult};
use crate::cdcflow::kafka::consumer_config::KafkaSourceConfig;
use crate::cdcflow::kafka::deserializer::{Utf8StringDeserializer, ValueDeserializer};
use crate::cdcflow::kafka::kafka_error::KafkaClientError;
use async_trait::async_trait;
use log::{debug, info, warn};
use rdkafka::TopicPartitionList;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as KafkaMessage;
use std::time::Duration;

/// A Kafka consumer yielding value-only decoded text messages
///
/// The consumer reads a single topic under a consumer group. With the default
/// configuration every partition of the topic is assigned explicitly at its
/// log end, so each run starts from the latest offset regardless of what the
/// group committed before. With `start_from_latest` off the consumer
/// subscribes and resumes from the committed offsets instead.
///
/// Transient broker failures are retried with exponential backoff; fatal ones
/// (bad config, authorization) are returned to the caller. A payload the
/// deserializer rejects surfaces as a recoverable [`PipelineError::Decode`].
///
/// # Examples
///
/// ```rust,no_run
/// use cdcflow::cdcflow::datasource::TextSource;
/// use cdcflow::cdcflow::kafka::{KafkaSourceConfig, KafkaTextSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = KafkaSourceConfig::new("localhost:9092", "dwd_trade_order_detail", "topic_db");
///     let mut source = KafkaTextSource::new(config)?;
///
///     while let Some(message) = source.next_message().await? {
///         match message.payload {
///             Some(text) => println!("{}", text),
///             None => println!("null payload at offset {}", message.offset),
///         }
///     }
///     Ok(())
/// }
/// ```
pub struct KafkaTextSource<D = Utf8StringDeserializer>
where
    D: ValueDeserializer<String>,
{
    consumer: StreamConsumer,
    deserializer: D,
    config: KafkaSourceConfig,
}

impl KafkaTextSource<Utf8StringDeserializer> {
    /// Creates a source decoding payloads as UTF-8 text
    pub fn new(config: KafkaSourceConfig) -> PipelineResult<Self> {
        Self::with_deserializer(config, Utf8StringDeserializer)
    }
}

impl<D> KafkaTextSource<D>
where
    D: ValueDeserializer<String> + 'static,
{
    /// Creates a source with a custom value deserializer and attaches it to
    /// the topic
    pub fn with_deserializer(config: KafkaSourceConfig, deserializer: D) -> PipelineResult<Self> {
        config.validate()?;

        let consumer: StreamConsumer = config.to_client_config().create().map_err(|e| {
            PipelineError::source_failure(e.into(), &config.topic, "failed to create consumer")
        })?;

        if config.start_from_latest {
            let assignment = latest_assignment(&consumer, &config)?;
            consumer.assign(&assignment).map_err(|e| {
                PipelineError::source_failure(e.into(), &config.topic, "failed to assign partitions")
            })?;
            info!(
                "KafkaTextSource: assigned {} partition(s) of '{}' at the log end as group '{}' (value type: {})",
                assignment.count(),
                config.topic,
                config.group_id,
                deserializer.produced_type()
            );
        } else {
            consumer.subscribe(&[config.topic.as_str()]).map_err(|e| {
                PipelineError::source_failure(e.into(), &config.topic, "failed to subscribe")
            })?;
            info!(
                "KafkaTextSource: subscribed to '{}' as group '{}' (offset reset: {}, value type: {})",
                config.topic,
                config.group_id,
                config.auto_offset_reset.as_str(),
                deserializer.produced_type()
            );
        }

        Ok(Self {
            consumer,
            deserializer,
            config,
        })
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.config.max_backoff)
    }
}

#[async_trait]
impl<D> TextSource for KafkaTextSource<D>
where
    D: ValueDeserializer<String> + 'static,
{
    async fn next_message(&mut self) -> PipelineResult<Option<SourceMessage>> {
        let mut attempt: u32 = 0;
        let mut backoff = self.config.retry_backoff;

        loop {
            let received = self.consumer.recv().await;
            let error = match received {
                Ok(msg) => {
                    let payload = match self.deserializer.decode(msg.payload()) {
                        Ok(payload) => payload,
                        Err(e) => {
                            debug!(
                                "KafkaTextSource: undecodable message {}/{}@{}",
                                msg.topic(),
                                msg.partition(),
                                msg.offset()
                            );
                            return Err(PipelineError::Decode(EventDecodeError::from(e)));
                        }
                    };

                    if let Some(text) = &payload {
                        if self.deserializer.is_end_of_stream(text) {
                            info!("KafkaTextSource: end-of-stream marker on '{}'", msg.topic());
                            return Ok(None);
                        }
                    }

                    return Ok(Some(SourceMessage {
                        payload,
                        topic: msg.topic().to_string(),
                        partition: msg.partition(),
                        offset: msg.offset(),
                        timestamp: msg.timestamp().to_millis(),
                    }));
                }
                Err(e) => KafkaClientError::from(e),
            };

            if !error.is_retryable() {
                return Err(PipelineError::source_failure(
                    error,
                    &self.config.topic,
                    "fatal consumer error",
                ));
            }

            attempt += 1;
            if self.config.max_retries > 0 && attempt > self.config.max_retries {
                return Err(PipelineError::source_failure(
                    error,
                    &self.config.topic,
                    format!("giving up after {} retries", self.config.max_retries),
                ));
            }

            warn!(
                "KafkaTextSource: transient error on '{}' (attempt {}), retrying in {:?}: {}",
                self.config.topic, attempt, backoff, error
            );
            tokio::time::sleep(backoff).await;
            backoff = self.next_backoff(backoff);
            debug!("KafkaTextSource: retrying receive on '{}'", self.config.topic);
        }
    }

    fn name(&self) -> &str {
        &self.config.topic
    }
}

/// Every partition of the configured topic, positioned at its log end
fn latest_assignment(
    consumer: &StreamConsumer,
    config: &KafkaSourceConfig,
) -> PipelineResult<TopicPartitionList> {
    let metadata = consumer
        .fetch_metadata(Some(&config.topic), config.metadata_timeout)
        .map_err(|e| {
            PipelineError::source_failure(e.into(), &config.topic, "failed to fetch topic metadata")
        })?;

    let partitions: Vec<i32> = metadata
        .topics()
        .iter()
        .filter(|topic| topic.name() == config.topic)
        .flat_map(|topic| topic.partitions().iter().map(|p| p.id()))
        .collect();
    if partitions.is_empty() {
        return Err(PipelineError::source_failure(
            KafkaClientError::NoPartitions(config.topic.clone()),
            &config.topic,
            "nothing to assign",
        ));
    }

    config.latest_assignment(&partitions).map_err(|e| {
        PipelineError::source_failure(e.into(), &config.topic, "failed to build assignment")
    })
}
