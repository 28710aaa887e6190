//! Trade order detail job
//!
//! Joins order-detail inserts with order-detail-coupon inserts on
//! `order_detail.order_id = order_detail_coupon.order_detail_id` and emits
//! `{id, order_id, ts}` for every pair seen within the retention window.

use crate::cdcflow::cdc::OperationType;
use crate::cdcflow::config::{PipelineConfig, SinkKind};
use crate::cdcflow::datasource::traits::{RecordSink, TextSource};
use crate::cdcflow::datasource::StdoutSink;
use crate::cdcflow::error::PipelineResult;
use crate::cdcflow::join::{JoinConfig, JoinSide, ResultProjection};
use crate::cdcflow::kafka::{KafkaJsonSink, KafkaTextSource};
use crate::cdcflow::query::{ColumnRef, EventPredicate, FilterProjectPlan, Projection, SplitStage};
use crate::cdcflow::server::{Pipeline, PipelineOptions};
use log::info;

pub const JOB_NAME: &str = "dwd_trade_order_detail";

/// Alias of the order-detail side
pub const ORDER_DETAIL: &str = "od";
/// Alias of the order-detail-coupon side
pub const ORDER_DETAIL_COUPON: &str = "odc";

/// Left input: `{id, order_id, ts}` from order-detail inserts
pub fn order_detail_plan(database: &str, table: &str) -> PipelineResult<FilterProjectPlan> {
    FilterProjectPlan::build(
        ORDER_DETAIL,
        EventPredicate::new(database, table, OperationType::Insert),
        Projection::new()
            .data_column("id")
            .data_column("order_id")
            .column(ColumnRef::Ts, "ts"),
    )
}

/// Right input: `{order_detail_id}` from order-detail-coupon inserts
pub fn order_detail_coupon_plan(database: &str, table: &str) -> PipelineResult<FilterProjectPlan> {
    FilterProjectPlan::build(
        ORDER_DETAIL_COUPON,
        EventPredicate::new(database, table, OperationType::Insert),
        Projection::new().data_column("order_detail_id"),
    )
}

pub fn split_stage(config: &PipelineConfig) -> PipelineResult<SplitStage> {
    let database = config.database()?;
    Ok(SplitStage::new(
        order_detail_plan(database, &config.order_detail_table)?,
        order_detail_coupon_plan(database, &config.order_detail_coupon_table)?,
        config.ts_unit,
    ))
}

pub fn join_config(config: &PipelineConfig) -> JoinConfig {
    JoinConfig::equi_join(
        ORDER_DETAIL,
        ORDER_DETAIL_COUPON,
        vec![("order_id".to_string(), "order_detail_id".to_string())],
        config.retention(),
    )
    .with_ttl_update(config.join.ttl_update)
    .with_time_characteristic(config.join.time_characteristic)
    .with_state_limits(config.state_limits())
}

/// `od.id, od.order_id, od.ts`
pub fn result_projection() -> ResultProjection {
    ResultProjection::new()
        .column(JoinSide::Left, "id", "id")
        .column(JoinSide::Left, "order_id", "order_id")
        .column(JoinSide::Left, "ts", "ts")
}

pub fn pipeline_options(config: &PipelineConfig) -> PipelineOptions {
    PipelineOptions {
        name: format!("{}#{}", JOB_NAME, config.job_id),
        parallelism: config.parallelism,
        channel_capacity: config.channel_capacity,
        cleanup_interval: config.cleanup_interval(),
    }
}

/// Assemble the job over arbitrary source and sink adapters
pub fn build_pipeline(
    config: &PipelineConfig,
    source: Box<dyn TextSource>,
    sink: Box<dyn RecordSink>,
) -> PipelineResult<Pipeline> {
    config.validate()?;
    Pipeline::new(
        source,
        sink,
        split_stage(config)?,
        join_config(config),
        result_projection(),
        pipeline_options(config),
    )
}

/// Assemble the job with the Kafka source and the configured sink
pub fn build_from_config(config: &PipelineConfig) -> PipelineResult<Pipeline> {
    config.validate()?;

    let source = KafkaTextSource::new(config.source_config())?;
    let sink: Box<dyn RecordSink> = match config.sink.kind {
        SinkKind::Kafka => Box::new(KafkaJsonSink::new(config.sink_config()?)?),
        SinkKind::Stdout => Box::new(StdoutSink::new("stdout")),
    };

    info!(
        "Job {} ({}): {}.{} JOIN {}.{} -> {} sink",
        config.job_id,
        JOB_NAME,
        config.database()?,
        config.order_detail_table,
        config.database()?,
        config.order_detail_coupon_table,
        config.sink.kind
    );

    build_pipeline(config, Box::new(source), sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdcflow::cdc::{ChangeEvent, FieldValue};

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.source_database = Some("gmall".to_string());
        config.sink.kind = SinkKind::Stdout;
        config
    }

    #[test]
    fn test_split_stage_uses_configured_tables() {
        let mut config = config();
        config.order_detail_coupon_table = "order_detail_activity".to_string();
        let split = split_stage(&config).unwrap();

        assert_eq!(split.left().predicate().table, "order_detail");
        assert_eq!(split.right().predicate().table, "order_detail_activity");
        assert_eq!(split.right().predicate().database, "gmall");
    }

    #[test]
    fn test_split_stage_requires_database() {
        let mut config = config();
        config.source_database = None;
        assert!(split_stage(&config).is_err());
    }

    #[test]
    fn test_left_projection_columns() {
        let split = split_stage(&config()).unwrap();
        let event = ChangeEvent::from_json(
            r#"{"database":"gmall","table":"order_detail","type":"insert","ts":1700000000,
                "data":{"id":"1","order_id":"100","sku_id":"7"}}"#,
        )
        .unwrap();
        let rows = split.split(&event);
        assert_eq!(rows.len(), 1);
        let row = &rows[0].1;
        assert_eq!(row.fields.len(), 3);
        assert_eq!(row.get("ts"), &FieldValue::Integer(1_700_000_000));
    }

    #[test]
    fn test_join_config_follows_settings() {
        let mut config = config();
        config.join.retention_ms = 7000;
        let join = join_config(&config);
        assert_eq!(join.retention.as_millis(), 7000);
        assert_eq!(join.join_keys[0].0, "order_id");
        assert_eq!(join.join_keys[0].1, "order_detail_id");
        assert!(join.validate().is_ok());
    }

    #[test]
    fn test_result_columns() {
        let names: Vec<_> = result_projection()
            .columns()
            .iter()
            .map(|c| c.alias.clone())
            .collect();
        assert_eq!(names, vec!["id", "order_id", "ts"]);
    }

    #[test]
    fn test_pipeline_options() {
        let options = pipeline_options(&config());
        assert_eq!(options.name, "dwd_trade_order_detail#10014");
        assert_eq!(options.parallelism, 4);
        assert_eq!(options.channel_capacity, 1024);
    }
}
