use cdcflow::cdcflow::config::ConfigOverrides;
use cdcflow::{PipelineConfig, PipelineError, SinkKind, TimeCharacteristic, TimestampUnit, TtlUpdate};
use std::io::Write;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
job_id: 10014
parallelism: 8
source_database: gmall
order_detail_table: order_detail
order_detail_coupon_table: order_detail_coupon
ts_unit: millis
channel_capacity: 256
cleanup_interval_ms: 500
kafka:
  brokers: "broker1:9092,broker2:9092"
  group_id: dwd_trade_order_detail
  source_topic: topic_db
  auto_offset_reset: latest
  max_backoff_ms: 10000
sink:
  kind: kafka
  topic: dwd_trade_order_detail
  key_column: id
join:
  retention_ms: 5000
  ttl_update: on_create_and_write
  time_characteristic: event_time
  max_records: 5000
  max_records_per_key: 50
"#;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_file() {
    let file = write_config(FULL_CONFIG);
    let config = PipelineConfig::from_file(file.path()).unwrap();

    assert_eq!(config.parallelism, 8);
    assert_eq!(config.ts_unit, TimestampUnit::Millis);
    assert_eq!(config.kafka.brokers, "broker1:9092,broker2:9092");
    assert_eq!(config.join.ttl_update, TtlUpdate::OnCreateAndWrite);
    assert_eq!(config.join.time_characteristic, TimeCharacteristic::EventTime);
    assert_eq!(config.state_limits().max_records_per_key, 50);
    assert!(config.validate().is_ok());

    let source = config.source_config().to_client_config();
    assert_eq!(source.get("bootstrap.servers"), Some("broker1:9092,broker2:9092"));
    assert_eq!(source.get("group.id"), Some("dwd_trade_order_detail"));
    assert_eq!(source.get("auto.offset.reset"), Some("latest"));
    assert!(config.source_config().start_from_latest);

    let sink = config.sink_config().unwrap();
    assert_eq!(sink.topic, "dwd_trade_order_detail");
    assert_eq!(sink.key_column.as_deref(), Some("id"));
}

#[test]
fn test_resuming_from_committed_offsets_is_opt_in() {
    let yaml = r#"
source_database: gmall
sink:
  kind: stdout
kafka:
  start_from_latest: false
  auto_offset_reset: earliest
"#;
    let config = PipelineConfig::from_yaml_str(yaml).unwrap();
    let source = config.source_config();
    assert!(!source.start_from_latest);
    assert_eq!(source.to_client_config().get("auto.offset.reset"), Some("earliest"));
}

#[test]
fn test_round_trip_through_yaml() {
    let config = PipelineConfig::from_yaml_str(FULL_CONFIG).unwrap();
    let reparsed = PipelineConfig::from_yaml_str(&config.to_yaml().unwrap()).unwrap();
    assert_eq!(config, reparsed);
}

#[test]
fn test_command_line_overrides_win() {
    let file = write_config(FULL_CONFIG);
    let mut config = PipelineConfig::from_file(file.path()).unwrap();
    config.apply_overrides(ConfigOverrides {
        group_id: Some("replay".to_string()),
        source_topic: Some("topic_db_replay".to_string()),
        sink_topic: Some("dwd_trade_order_detail_replay".to_string()),
        source_database: Some("gmall_realtime".to_string()),
        job_id: Some(1),
        ..ConfigOverrides::default()
    });

    assert_eq!(config.kafka.group_id, "replay");
    assert_eq!(config.kafka.source_topic, "topic_db_replay");
    assert_eq!(config.sink.topic.as_deref(), Some("dwd_trade_order_detail_replay"));
    assert_eq!(config.database().unwrap(), "gmall_realtime");
    assert_eq!(config.job_id, 1);
    assert_eq!(config.parallelism, 8);
}

#[test]
fn test_database_and_sink_topic_are_never_guessed() {
    let config = PipelineConfig::from_yaml_str("parallelism: 1\n").unwrap();
    assert!(config.source_database.is_none());
    assert!(config.sink.topic.is_none());
    assert_eq!(config.sink.kind, SinkKind::Kafka);

    match config.validate() {
        Err(PipelineError::Config { message }) => assert!(message.contains("source_database")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_malformed_yaml_is_reported() {
    let file = write_config("parallelism: [not a number\n");
    assert!(matches!(
        PipelineConfig::from_file(file.path()),
        Err(PipelineError::Yaml(_))
    ));
}

#[test]
fn test_unknown_enum_value_is_rejected() {
    assert!(PipelineConfig::from_yaml_str("join:\n  ttl_update: forever\n").is_err());
}
