//! Join Coordinator
//!
//! Runs an inner equi-join between two keyed streams. Each side has its own
//! retention-bounded [`JoinStateStore`]; a record is buffered on its side and
//! matched against whatever is still live on the other side.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cdcflow::cdc::{FieldValue, OutputRow, Row};
use crate::cdcflow::error::{PipelineError, PipelineResult};
use crate::cdcflow::join::clock::{Clock, SystemClock, TimeCharacteristic};
use crate::cdcflow::join::state_store::{JoinStateStore, JoinStateStoreConfig, TtlUpdate};

/// Separator between key parts of a composite join key
const KEY_SEPARATOR: char = '\u{1f}';

/// Which side of the join a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinSide {
    Left,
    Right,
}

impl JoinSide {
    pub fn opposite(&self) -> Self {
        match self {
            JoinSide::Left => JoinSide::Right,
            JoinSide::Right => JoinSide::Left,
        }
    }
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::Left => write!(f, "left"),
            JoinSide::Right => write!(f, "right"),
        }
    }
}

/// Configuration for a retention-bounded equi-join
#[derive(Debug, Clone)]
pub struct JoinConfig {
    /// Left source name (for logging)
    pub left_source: String,
    /// Right source name (for logging)
    pub right_source: String,
    /// Join key columns: (left_column, right_column) pairs
    pub join_keys: Vec<(String, String)>,
    /// Idle time after which buffered state is dropped
    pub retention: Duration,
    pub ttl_update: TtlUpdate,
    pub time_characteristic: TimeCharacteristic,
    /// Memory limits applied to each side's store
    pub state_limits: JoinStateStoreConfig,
}

impl JoinConfig {
    /// Create an inner equi-join configuration
    pub fn equi_join(
        left_source: &str,
        right_source: &str,
        join_keys: Vec<(String, String)>,
        retention: Duration,
    ) -> Self {
        Self {
            left_source: left_source.to_string(),
            right_source: right_source.to_string(),
            join_keys,
            retention,
            ttl_update: TtlUpdate::default(),
            time_characteristic: TimeCharacteristic::default(),
            state_limits: JoinStateStoreConfig::default(),
        }
    }

    pub fn with_ttl_update(mut self, ttl_update: TtlUpdate) -> Self {
        self.ttl_update = ttl_update;
        self
    }

    pub fn with_time_characteristic(mut self, time_characteristic: TimeCharacteristic) -> Self {
        self.time_characteristic = time_characteristic;
        self
    }

    pub fn with_state_limits(mut self, state_limits: JoinStateStoreConfig) -> Self {
        self.state_limits = state_limits;
        self
    }

    pub fn validate(&self) -> PipelineResult<()> {
        let plan = format!("{} JOIN {}", self.left_source, self.right_source);
        if self.join_keys.is_empty() {
            return Err(PipelineError::plan(plan, "at least one join key is required"));
        }
        if self
            .join_keys
            .iter()
            .any(|(left, right)| left.trim().is_empty() || right.trim().is_empty())
        {
            return Err(PipelineError::plan(plan, "join key columns must not be empty"));
        }
        if self.retention.is_zero() {
            return Err(PipelineError::plan(plan, "retention must be greater than zero"));
        }
        Ok(())
    }

    /// Join key of a record on the given side, `None` if any key column is NULL
    pub fn extract_key(&self, side: JoinSide, row: &Row) -> Option<String> {
        let mut key = String::new();
        for (i, (left, right)) in self.join_keys.iter().enumerate() {
            let column = match side {
                JoinSide::Left => left,
                JoinSide::Right => right,
            };
            if i > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(&row.get(column).to_key_string()?);
        }
        Some(key)
    }
}

/// One output column of a join: a column from one side under an alias
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub side: JoinSide,
    pub column: String,
    pub alias: String,
}

/// Shapes matched pairs into output rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultProjection {
    columns: Vec<ResultColumn>,
}

impl ResultProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, side: JoinSide, column: impl Into<String>, alias: impl Into<String>) -> Self {
        self.columns.push(ResultColumn {
            side,
            column: column.into(),
            alias: alias.into(),
        });
        self
    }

    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.columns.is_empty() {
            return Err(PipelineError::plan("join result", "at least one column is required"));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.alias == column.alias) {
                return Err(PipelineError::plan(
                    "join result",
                    format!("duplicate output column '{}'", column.alias),
                ));
            }
        }
        Ok(())
    }

    pub fn project(&self, left: &Row, right: &Row) -> OutputRow {
        OutputRow::new(
            self.columns
                .iter()
                .map(|c| {
                    let source = match c.side {
                        JoinSide::Left => left,
                        JoinSide::Right => right,
                    };
                    let value: FieldValue = source.get(&c.column).clone();
                    (c.alias.clone(), value)
                })
                .collect(),
        )
    }
}

/// Statistics for monitoring join coordinator performance
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JoinCoordinatorStats {
    /// Records processed from left side
    pub left_records_processed: u64,
    /// Records processed from right side
    pub right_records_processed: u64,
    /// Total join matches emitted
    pub matches_emitted: u64,
    /// Records with a NULL or missing join key
    pub missing_key_count: u64,
    /// Records dropped from the left store by retention
    pub left_expired: u64,
    /// Records dropped from the right store by retention
    pub right_expired: u64,
    pub left_store_size: usize,
    pub right_store_size: usize,
}

/// Coordinates inner equi-join processing
///
/// For every incoming record the coordinator:
/// 1. extracts the join key, skipping records whose key is NULL
/// 2. buffers the record in its own side's store
/// 3. looks up live records with the same key on the opposite side
/// 4. emits one projected row per match
#[derive(Debug)]
pub struct JoinCoordinator {
    config: JoinConfig,
    projection: ResultProjection,
    left_store: JoinStateStore,
    right_store: JoinStateStore,
    clock: Arc<dyn Clock>,
    /// Highest event time seen, used under event-time retention
    max_event_time: i64,
    stats: JoinCoordinatorStats,
}

impl JoinCoordinator {
    /// Create a coordinator driven by the system clock
    pub fn new(config: JoinConfig, projection: ResultProjection) -> Self {
        Self::with_clock(config, projection, Arc::new(SystemClock))
    }

    pub fn with_clock(config: JoinConfig, projection: ResultProjection, clock: Arc<dyn Clock>) -> Self {
        let left_store =
            JoinStateStore::with_config(config.retention, config.ttl_update, config.state_limits.clone());
        let right_store =
            JoinStateStore::with_config(config.retention, config.ttl_update, config.state_limits.clone());

        Self {
            config,
            projection,
            left_store,
            right_store,
            clock,
            max_event_time: i64::MIN,
            stats: JoinCoordinatorStats::default(),
        }
    }

    /// Process a record from the specified side
    pub fn process(&mut self, side: JoinSide, row: Row) -> Vec<OutputRow> {
        match side {
            JoinSide::Left => self.process_left(row),
            JoinSide::Right => self.process_right(row),
        }
    }

    pub fn process_left(&mut self, row: Row) -> Vec<OutputRow> {
        let now = self.observe(&row);
        self.process_at(JoinSide::Left, row, now)
    }

    pub fn process_right(&mut self, row: Row) -> Vec<OutputRow> {
        let now = self.observe(&row);
        self.process_at(JoinSide::Right, row, now)
    }

    /// Process a record as if the current time were `now`
    pub fn process_at(&mut self, side: JoinSide, row: Row, now: i64) -> Vec<OutputRow> {
        match side {
            JoinSide::Left => self.stats.left_records_processed += 1,
            JoinSide::Right => self.stats.right_records_processed += 1,
        }

        let key = match self.config.extract_key(side, &row) {
            Some(k) => k,
            None => {
                self.stats.missing_key_count += 1;
                return vec![];
            }
        };

        let (own, other) = match side {
            JoinSide::Left => (&mut self.left_store, &mut self.right_store),
            JoinSide::Right => (&mut self.right_store, &mut self.left_store),
        };

        let other_expired_before = other.stats().records_expired;
        let matches = other.lookup(&key, now);
        let lazily_expired = other.stats().records_expired - other_expired_before;

        let joined: Vec<OutputRow> = matches
            .iter()
            .map(|m| match side {
                JoinSide::Left => self.projection.project(&row, m),
                JoinSide::Right => self.projection.project(m, &row),
            })
            .collect();

        own.store(&key, row, now);

        match side.opposite() {
            JoinSide::Left => self.stats.left_expired += lazily_expired,
            JoinSide::Right => self.stats.right_expired += lazily_expired,
        }
        self.stats.matches_emitted += joined.len() as u64;
        self.refresh_sizes();
        joined
    }

    /// Advance the time base past a record and return "now"
    fn observe(&mut self, row: &Row) -> i64 {
        match self.config.time_characteristic {
            TimeCharacteristic::ProcessingTime => self.clock.now_millis(),
            TimeCharacteristic::EventTime => {
                self.max_event_time = self.max_event_time.max(row.event_time);
                self.max_event_time
            }
        }
    }

    /// Current time under the configured time characteristic
    pub fn current_time(&self) -> i64 {
        match self.config.time_characteristic {
            TimeCharacteristic::ProcessingTime => self.clock.now_millis(),
            TimeCharacteristic::EventTime => self.max_event_time,
        }
    }

    /// Sweep both stores at the current time
    pub fn expire(&mut self) -> (usize, usize) {
        let now = self.current_time();
        self.expire_at(now)
    }

    /// Sweep both stores, returning the records expired from each
    pub fn expire_at(&mut self, now: i64) -> (usize, usize) {
        let left = self.left_store.expire(now);
        let right = self.right_store.expire(now);
        self.stats.left_expired += left as u64;
        self.stats.right_expired += right as u64;
        self.refresh_sizes();
        (left, right)
    }

    /// Drop all buffered state, returning how many records were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.left_store.clear() + self.right_store.clear();
        self.refresh_sizes();
        dropped
    }

    fn refresh_sizes(&mut self) {
        self.stats.left_store_size = self.left_store.record_count();
        self.stats.right_store_size = self.right_store.record_count();
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    pub fn stats(&self) -> &JoinCoordinatorStats {
        &self.stats
    }

    pub fn left_store(&self) -> &JoinStateStore {
        &self.left_store
    }

    pub fn right_store(&self) -> &JoinStateStore {
        &self.right_store
    }

    pub fn is_empty(&self) -> bool {
        self.left_store.is_empty() && self.right_store.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.left_store.record_count() + self.right_store.record_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdcflow::join::clock::ManualClock;
    use std::collections::HashMap;

    const T: i64 = 1_700_000_000_000;

    fn make_row(fields: Vec<(&str, FieldValue)>, event_time: i64) -> Row {
        let field_map: HashMap<String, FieldValue> = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Row::new(field_map, event_time)
    }

    fn detail(id: i64, order_id: i64, ts: i64) -> Row {
        make_row(
            vec![
                ("id", FieldValue::Integer(id)),
                ("order_id", FieldValue::Integer(order_id)),
                ("ts", FieldValue::Integer(ts / 1000)),
            ],
            ts,
        )
    }

    fn coupon(order_detail_id: FieldValue, ts: i64) -> Row {
        make_row(vec![("order_detail_id", order_detail_id)], ts)
    }

    fn config() -> JoinConfig {
        JoinConfig::equi_join(
            "od",
            "odc",
            vec![("order_id".to_string(), "order_detail_id".to_string())],
            Duration::from_secs(5),
        )
    }

    fn projection() -> ResultProjection {
        ResultProjection::new()
            .column(JoinSide::Left, "id", "id")
            .column(JoinSide::Left, "order_id", "order_id")
            .column(JoinSide::Left, "ts", "ts")
    }

    fn coordinator(config: JoinConfig) -> (JoinCoordinator, ManualClock) {
        let clock = ManualClock::new(T);
        let coordinator = JoinCoordinator::with_clock(config, projection(), Arc::new(clock.clone()));
        (coordinator, clock)
    }

    #[test]
    fn test_match_within_retention() {
        let (mut coordinator, clock) = coordinator(config());

        assert!(coordinator.process_left(detail(1, 100, T)).is_empty());
        clock.advance(1_000);
        let results = coordinator.process_right(coupon(FieldValue::Integer(100), T + 1_000));

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get("id"), &FieldValue::Integer(1));
        assert_eq!(results[0].get("order_id"), &FieldValue::Integer(100));
        assert_eq!(results[0].get("ts"), &FieldValue::Integer(T / 1000));
        assert_eq!(coordinator.stats().matches_emitted, 1);
    }

    #[test]
    fn test_no_match_after_retention() {
        let (mut coordinator, clock) = coordinator(config());

        coordinator.process_left(detail(1, 100, T));
        clock.advance(6_000);
        let results = coordinator.process_right(coupon(FieldValue::Integer(100), T + 6_000));

        assert!(results.is_empty());
        assert_eq!(coordinator.stats().left_expired, 1);
    }

    #[test]
    fn test_right_first_then_left() {
        let (mut coordinator, clock) = coordinator(config());

        assert!(coordinator.process_right(coupon(FieldValue::Integer(100), T)).is_empty());
        clock.advance(2_000);
        let results = coordinator.process_left(detail(1, 100, T + 2_000));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_key_types_are_compared_by_text() {
        let (mut coordinator, _clock) = coordinator(config());

        coordinator.process_left(detail(1, 100, T));
        let results = coordinator.process_right(coupon(FieldValue::String("100".into()), T));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_null_key_is_skipped() {
        let (mut coordinator, _clock) = coordinator(config());

        assert!(coordinator.process_right(coupon(FieldValue::Null, T)).is_empty());
        assert!(
            coordinator
                .process_left(make_row(vec![("id", FieldValue::Integer(1))], T))
                .is_empty()
        );
        assert_eq!(coordinator.stats().missing_key_count, 2);
        assert!(coordinator.is_empty());
    }

    #[test]
    fn test_one_output_per_buffered_match() {
        let (mut coordinator, _clock) = coordinator(config());

        coordinator.process_left(detail(1, 100, T));
        coordinator.process_left(detail(2, 100, T));
        coordinator.process_left(detail(3, 200, T));

        let results = coordinator.process_right(coupon(FieldValue::Integer(100), T));
        let mut ids: Vec<_> = results.iter().filter_map(|r| r.get("id").as_i64()).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_on_read_and_write_keeps_matched_entry_alive() {
        let (mut coordinator, clock) = coordinator(config());

        coordinator.process_left(detail(1, 100, T));
        for _ in 0..3 {
            clock.advance(4_000);
            let results = coordinator.process_right(coupon(FieldValue::Integer(100), 0));
            assert_eq!(results.len(), 1);
        }
        assert_eq!(coordinator.left_store().record_count(), 1);
    }

    #[test]
    fn test_on_create_and_write_expires_despite_reads() {
        let (mut coordinator, clock) =
            coordinator(config().with_ttl_update(TtlUpdate::OnCreateAndWrite));

        coordinator.process_left(detail(1, 100, T));
        clock.advance(4_000);
        assert_eq!(coordinator.process_right(coupon(FieldValue::Integer(100), 0)).len(), 1);
        clock.advance(4_000);
        assert!(coordinator.process_right(coupon(FieldValue::Integer(100), 0)).is_empty());
    }

    #[test]
    fn test_event_time_retention() {
        let (mut coordinator, _clock) =
            coordinator(config().with_time_characteristic(TimeCharacteristic::EventTime));

        coordinator.process_left(detail(1, 100, T));
        assert_eq!(
            coordinator
                .process_right(coupon(FieldValue::Integer(100), T + 1_000))
                .len(),
            1
        );

        coordinator.process_left(detail(2, 200, T + 1_000));
        assert!(
            coordinator
                .process_right(coupon(FieldValue::Integer(200), T + 6_000))
                .is_empty()
        );
    }

    #[test]
    fn test_expire_sweeps_both_sides() {
        let (mut coordinator, clock) = coordinator(config());

        coordinator.process_left(detail(1, 100, T));
        coordinator.process_right(coupon(FieldValue::Integer(999), T));
        clock.advance(5_000);

        assert_eq!(coordinator.expire(), (1, 1));
        assert!(coordinator.is_empty());
        assert_eq!(coordinator.stats().left_store_size, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let no_keys = JoinConfig::equi_join("a", "b", vec![], Duration::from_secs(5));
        assert!(no_keys.validate().is_err());

        let zero = JoinConfig::equi_join(
            "a",
            "b",
            vec![("x".to_string(), "y".to_string())],
            Duration::ZERO,
        );
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_result_projection_validation() {
        assert!(projection().validate().is_ok());
        assert!(ResultProjection::new().validate().is_err());
        let dup = ResultProjection::new()
            .column(JoinSide::Left, "id", "id")
            .column(JoinSide::Right, "id", "id");
        assert!(dup.validate().is_err());
    }
}
