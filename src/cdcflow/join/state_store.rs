//! Join State Store
//!
//! Buffers the records of one join side by join key. Every buffered record
//! carries the time it was last written (or read, depending on [`TtlUpdate`])
//! and is dropped once it has been idle for the retention period:
//!
//! - lazily, when a lookup finds it expired
//! - eagerly, when the owner calls [`JoinStateStore::expire`]
//!
//! Records for a key are kept in arrival order. When a limit is hit the
//! oldest record across all keys is evicted first.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::cdcflow::cdc::Row;

/// Which accesses restart a record's retention period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlUpdate {
    /// Storing a record and every lookup that returns it
    #[default]
    OnReadAndWrite,
    /// Storing a record only
    OnCreateAndWrite,
}

/// Entry in the join buffer containing a record and its timing metadata
#[derive(Debug, Clone)]
pub struct JoinBufferEntry {
    /// The buffered record
    pub row: Row,
    /// When the record was stored (milliseconds)
    pub stored_at: i64,
    /// Store-wide arrival number, orders records stored at the same time
    pub sequence: u64,
    /// Last access that counts for retention (milliseconds)
    pub last_access: i64,
}

impl JoinBufferEntry {
    pub fn new(row: Row, now: i64, sequence: u64) -> Self {
        Self {
            row,
            stored_at: now,
            sequence,
            last_access: now,
        }
    }

    /// Eviction order: earliest stored first
    fn age_rank(&self) -> (i64, u64) {
        (self.stored_at, self.sequence)
    }

    /// Time at which the entry stops being visible
    pub fn expire_at(&self, retention_ms: i64) -> i64 {
        self.last_access.saturating_add(retention_ms)
    }

    /// An entry is expired once it has been idle for the full retention period
    pub fn is_expired(&self, now: i64, retention_ms: i64) -> bool {
        now >= self.expire_at(retention_ms)
    }
}

/// Statistics for monitoring join state store performance
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JoinStateStats {
    /// Total records stored (lifetime)
    pub records_stored: u64,
    /// Total records expired (lifetime)
    pub records_expired: u64,
    /// Total records evicted due to memory limits (lifetime)
    pub records_evicted: u64,
    /// Total lookup operations
    pub lookups: u64,
    /// Total matches found across all lookups
    pub matches_found: u64,
    /// Current number of records in the store
    pub current_size: usize,
    /// Peak number of records observed
    pub peak_size: usize,
    /// Current number of unique keys
    pub current_keys: usize,
    /// Number of times max_records limit was hit
    pub limit_hits: u64,
}

impl JoinStateStats {
    fn record_store(&mut self, new_size: usize, new_keys: usize) {
        self.records_stored += 1;
        self.current_size = new_size;
        self.current_keys = new_keys;
        if new_size > self.peak_size {
            self.peak_size = new_size;
        }
    }

    fn record_expiration(&mut self, count: usize, new_size: usize, new_keys: usize) {
        self.records_expired += count as u64;
        self.current_size = new_size;
        self.current_keys = new_keys;
    }

    fn record_lookup(&mut self, matches: usize) {
        self.lookups += 1;
        self.matches_found += matches as u64;
    }
}

/// Configuration for state store memory limits
#[derive(Debug, Clone, PartialEq)]
pub struct JoinStateStoreConfig {
    /// Maximum number of records to store (0 = unlimited)
    pub max_records: usize,
    /// Maximum records per key (0 = unlimited)
    pub max_records_per_key: usize,
    /// Warning threshold as percentage of max_records (0-100)
    pub warning_threshold_pct: u8,
}

impl Default for JoinStateStoreConfig {
    fn default() -> Self {
        Self {
            max_records: 1_000_000,
            max_records_per_key: 10_000,
            warning_threshold_pct: 80,
        }
    }
}

impl JoinStateStoreConfig {
    pub fn with_limits(max_records: usize, max_per_key: usize) -> Self {
        Self {
            max_records,
            max_records_per_key: max_per_key,
            warning_threshold_pct: 80,
        }
    }
}

/// Retention-bounded state store for one side of an equi-join
#[derive(Debug)]
pub struct JoinStateStore {
    /// Records indexed by join key, oldest first
    records: HashMap<String, VecDeque<JoinBufferEntry>>,

    retention_ms: i64,

    ttl_update: TtlUpdate,

    stats: JoinStateStats,

    /// Running count of total records
    record_count: usize,

    next_sequence: u64,

    config: JoinStateStoreConfig,

    capacity_warning_logged: bool,
}

impl JoinStateStore {
    /// Create a store with default memory limits
    ///
    /// # Example
    /// ```
    /// use cdcflow::cdcflow::join::{JoinStateStore, TtlUpdate};
    /// use std::time::Duration;
    ///
    /// let store = JoinStateStore::new(Duration::from_secs(5), TtlUpdate::OnReadAndWrite);
    /// assert_eq!(store.retention_ms(), 5_000);
    /// ```
    pub fn new(retention: Duration, ttl_update: TtlUpdate) -> Self {
        Self::with_config(retention, ttl_update, JoinStateStoreConfig::default())
    }

    pub fn with_config(retention: Duration, ttl_update: TtlUpdate, config: JoinStateStoreConfig) -> Self {
        let retention_ms = i64::try_from(retention.as_millis()).unwrap_or(i64::MAX);
        Self {
            records: HashMap::new(),
            retention_ms,
            ttl_update,
            stats: JoinStateStats::default(),
            record_count: 0,
            next_sequence: 0,
            config,
            capacity_warning_logged: false,
        }
    }

    /// Store a record at time `now`, returning its expiration time
    ///
    /// If limits are configured, the oldest records may be evicted to make room.
    pub fn store(&mut self, key: &str, row: Row, now: i64) -> i64 {
        if self.config.max_records > 0 && self.record_count >= self.config.max_records {
            self.evict_oldest_records(1);
            self.stats.limit_hits += 1;
        }

        if self.config.max_records > 0 && !self.capacity_warning_logged {
            let threshold =
                (self.config.max_records * self.config.warning_threshold_pct as usize) / 100;
            if self.record_count >= threshold {
                warn!(
                    "JoinStateStore: Approaching capacity limit ({}/{} records, {}%)",
                    self.record_count,
                    self.config.max_records,
                    (self.record_count * 100) / self.config.max_records
                );
                self.capacity_warning_logged = true;
            }
        }

        let entry = JoinBufferEntry::new(row, now, self.next_sequence);
        self.next_sequence += 1;
        let expire_at = entry.expire_at(self.retention_ms);

        let entries = self.records.entry(key.to_string()).or_default();

        if self.config.max_records_per_key > 0
            && entries.len() >= self.config.max_records_per_key
            && entries.pop_front().is_some()
        {
            self.record_count = self.record_count.saturating_sub(1);
            self.stats.records_evicted += 1;
        }

        entries.push_back(entry);

        self.record_count += 1;
        self.stats.record_store(self.record_count, self.records.len());

        expire_at
    }

    /// Key whose front record was stored earliest
    ///
    /// Each key's queue is in arrival order, so its front is its oldest record.
    fn find_oldest_key(&self) -> Option<&str> {
        self.records
            .iter()
            .filter_map(|(key, entries)| entries.front().map(|e| (e.age_rank(), key)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, key)| key.as_str())
    }

    /// Evict the `count` oldest records across all keys
    fn evict_oldest_records(&mut self, count: usize) {
        let mut evicted = 0;

        while evicted < count {
            let target_key = match self.find_oldest_key() {
                Some(key) => key.to_string(),
                None => break,
            };

            if let Some(entries) = self.records.get_mut(&target_key) {
                if let Some(entry) = entries.pop_front() {
                    evicted += 1;
                    self.record_count = self.record_count.saturating_sub(1);
                    self.stats.records_evicted += 1;
                    debug!(
                        "JoinStateStore: evicted record for key '{}' stored at {}",
                        target_key, entry.stored_at
                    );
                }
                if entries.is_empty() {
                    self.records.remove(&target_key);
                }
            }
        }
    }

    /// Live records for a key at time `now`
    ///
    /// Expired records are removed on the way. Under
    /// [`TtlUpdate::OnReadAndWrite`] the returned records have their idle
    /// timer restarted.
    pub fn lookup(&mut self, key: &str, now: i64) -> Vec<Row> {
        let retention_ms = self.retention_ms;
        let refresh = self.ttl_update == TtlUpdate::OnReadAndWrite;

        let mut expired = 0;
        let mut matches = Vec::new();
        let mut now_empty = false;

        if let Some(entries) = self.records.get_mut(key) {
            let before = entries.len();
            entries.retain(|e| !e.is_expired(now, retention_ms));
            expired = before - entries.len();

            for entry in entries.iter_mut() {
                if refresh {
                    entry.last_access = now;
                }
                matches.push(entry.row.clone());
            }
            now_empty = entries.is_empty();
        }

        if now_empty {
            self.records.remove(key);
        }
        if expired > 0 {
            self.record_count = self.record_count.saturating_sub(expired);
            self.stats
                .record_expiration(expired, self.record_count, self.records.len());
            debug!("JoinStateStore: lazily expired {} record(s) for key '{}'", expired, key);
        }

        self.stats.record_lookup(matches.len());
        matches
    }

    /// Drop every record idle for at least the retention period
    ///
    /// Returns the number of records expired.
    pub fn expire(&mut self, now: i64) -> usize {
        let retention_ms = self.retention_ms;
        let mut expired_count = 0;

        self.records.retain(|_key, entries| {
            let before = entries.len();
            entries.retain(|e| !e.is_expired(now, retention_ms));
            expired_count += before - entries.len();
            !entries.is_empty()
        });

        self.record_count = self.record_count.saturating_sub(expired_count);
        self.stats
            .record_expiration(expired_count, self.record_count, self.records.len());

        expired_count
    }

    pub fn retention_ms(&self) -> i64 {
        self.retention_ms
    }

    pub fn ttl_update(&self) -> TtlUpdate {
        self.ttl_update
    }

    pub fn stats(&self) -> &JoinStateStats {
        &self.stats
    }

    /// Number of unique keys currently stored
    pub fn key_count(&self) -> usize {
        self.records.len()
    }

    /// Total number of records currently stored
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Discard all buffered state
    pub fn clear(&mut self) -> usize {
        let dropped = self.record_count;
        self.records.clear();
        self.record_count = 0;
        self.stats.current_size = 0;
        self.stats.current_keys = 0;
        self.capacity_warning_logged = false;
        dropped
    }

    pub fn config(&self) -> &JoinStateStoreConfig {
        &self.config
    }

    #[must_use]
    pub fn is_near_capacity(&self) -> bool {
        if self.config.max_records == 0 {
            return false;
        }
        let threshold =
            (self.config.max_records * self.config.warning_threshold_pct as usize) / 100;
        self.record_count >= threshold
    }
}
