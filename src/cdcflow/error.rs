/*!
# Error Types for cdcflow

Centralized error handling for the pipeline. Per-record failures are
recoverable (the record is dropped and counted); everything else stops the
job and is surfaced to the caller of `Pipeline::run`.
*/

use crate::cdcflow::cdc::EventDecodeError;
use crate::cdcflow::kafka::kafka_error::KafkaClientError;
use thiserror::Error;

/// Main pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Filter/projection or join plan failed validation
    #[error("Invalid plan '{plan}': {message}")]
    Plan { plan: String, message: String },

    /// Source adapter failure with context
    #[error("Source '{source_name}' failed: {message}")]
    Source {
        #[source]
        source: KafkaClientError,
        source_name: String,
        message: String,
    },

    /// A single record could not be decoded
    #[error("Failed to decode record: {0}")]
    Decode(#[from] EventDecodeError),

    /// Sink write or flush failure
    #[error("Sink '{sink}' failed: {message}")]
    Sink { sink: String, message: String },

    /// I/O errors with additional context
    #[error("I/O operation failed: {operation}")]
    Io {
        #[source]
        source: std::io::Error,
        operation: String,
    },

    /// YAML configuration parsing errors
    #[error("YAML parsing failed")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON encoding errors
    #[error("JSON encoding failed")]
    Json(#[from] serde_json::Error),

    /// A pipeline stage stopped unexpectedly
    #[error("Pipeline stage '{stage}' stopped: {message}")]
    Stage { stage: String, message: String },
}

impl PipelineError {
    /// Helper to create configuration errors
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Helper to create plan validation errors
    pub fn plan(plan: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plan {
            plan: plan.into(),
            message: message.into(),
        }
    }

    /// Helper to create source errors with context
    pub fn source_failure(
        source: KafkaClientError,
        source_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Source {
            source,
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Helper to create sink errors
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Helper to create I/O errors with context
    pub fn io(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            operation: operation.into(),
        }
    }

    /// Helper to create stage failures
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// True when the failure is scoped to one record and the job can go on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::Decode(_))
    }

    /// True when restarting the job later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Source { source, .. } => source.is_retryable(),
            PipelineError::Sink { .. } | PipelineError::Io { .. } => true,
            _ => false,
        }
    }
}

/// Type alias for Results using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_recoverable() {
        let decode = PipelineError::from(
            crate::cdcflow::cdc::ChangeEvent::from_json("{").unwrap_err(),
        );
        assert!(decode.is_recoverable());
        assert!(!decode.is_retryable());
    }

    #[test]
    fn test_job_level_errors() {
        let sink = PipelineError::sink("dwd_trade_order_detail", "broker down");
        assert!(!sink.is_recoverable());
        assert!(sink.is_retryable());
        assert_eq!(
            sink.to_string(),
            "Sink 'dwd_trade_order_detail' failed: broker down"
        );

        let config = PipelineError::config("source topic must not be empty");
        assert!(!config.is_recoverable());
        assert!(!config.is_retryable());
    }

    #[test]
    fn test_source_error_classification_follows_cause() {
        use rdkafka::error::{KafkaError, RDKafkaErrorCode};

        let transient = PipelineError::source_failure(
            KafkaError::MessageConsumption(RDKafkaErrorCode::BrokerTransportFailure).into(),
            "topic_db",
            "poll",
        );
        assert!(transient.is_retryable());
        assert!(!transient.is_recoverable());

        let fatal = PipelineError::source_failure(
            KafkaError::ClientCreation("bad config".into()).into(),
            "topic_db",
            "create",
        );
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_payload_errors_are_recoverable() {
        use crate::cdcflow::cdc::EventDecodeError;
        use crate::cdcflow::kafka::SerializationError;

        let payload = PipelineError::from(EventDecodeError::from(
            SerializationError::DeserializationFailed("truncated frame".into()),
        ));
        assert!(payload.is_recoverable());
    }
}
