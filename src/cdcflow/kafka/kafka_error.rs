use rdkafka::error::{KafkaError, RDKafkaErrorCode};

/// Unified error type for Kafka source and sink operations
///
/// Broker and transport failures are transient and retried by the source;
/// client creation, configuration and authorization failures are fatal.
#[derive(Debug)]
pub enum KafkaClientError {
    /// Underlying Kafka library error
    KafkaError(KafkaError),
    /// The subscribed topic has no partitions visible to this client
    NoPartitions(String),
}

impl KafkaClientError {
    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            KafkaClientError::KafkaError(e) => !is_fatal_kafka_error(e),
            KafkaClientError::NoPartitions(_) => true,
        }
    }
}

fn is_fatal_kafka_error(err: &KafkaError) -> bool {
    match err {
        KafkaError::ClientConfig(..)
        | KafkaError::ClientCreation(_)
        | KafkaError::Subscription(_)
        | KafkaError::MessageConsumptionFatal(_) => true,
        other => matches!(
            other.rdkafka_error_code(),
            Some(
                RDKafkaErrorCode::TopicAuthorizationFailed
                    | RDKafkaErrorCode::GroupAuthorizationFailed
                    | RDKafkaErrorCode::SaslAuthenticationFailed
                    | RDKafkaErrorCode::InvalidConfig
            )
        ),
    }
}

impl std::fmt::Display for KafkaClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KafkaClientError::KafkaError(e) => write!(f, "Kafka error: {}", e),
            KafkaClientError::NoPartitions(topic) => {
                write!(f, "Topic '{}' has no partitions", topic)
            }
        }
    }
}

impl std::error::Error for KafkaClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KafkaClientError::KafkaError(e) => Some(e),
            KafkaClientError::NoPartitions(_) => None,
        }
    }
}

impl From<KafkaError> for KafkaClientError {
    fn from(err: KafkaError) -> Self {
        KafkaClientError::KafkaError(err)
    }
}
