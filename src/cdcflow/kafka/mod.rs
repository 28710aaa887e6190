//! Kafka adapters: the text source the pipeline reads from and the JSON sink
//! it writes to.

pub mod consumer_config;
pub mod deserializer;
pub mod kafka_error;
pub mod kafka_sink;
pub mod kafka_source;

pub use consumer_config::{KafkaSourceConfig, OffsetReset};
pub use deserializer::{SerializationError, Utf8StringDeserializer, ValueDeserializer};
pub use kafka_error::KafkaClientError;
pub use kafka_sink::{KafkaJsonSink, KafkaSinkConfig};
pub use kafka_source::KafkaTextSource;
