use crate::cdcflow::join::JoinCoordinatorStats;
use std::fmt;
use std::time::Duration;

/// Counters kept by the source-side stage (decode, filter, route)
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceStageStats {
    pub messages_read: u64,
    /// Messages whose payload was absent
    pub null_payloads: u64,
    /// Messages whose payload was not a valid change event
    pub decode_failures: u64,
    /// Decoded events matching neither filter
    pub filtered_out: u64,
    pub left_rows: u64,
    pub right_rows: u64,
}

/// Final statistics of a pipeline run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PipelineReport {
    pub source: SourceStageStats,
    /// Join statistics, one entry per partition
    pub partitions: Vec<JoinCoordinatorStats>,
    /// Join state still buffered when the run ended
    pub discarded_state: u64,
    pub rows_written: u64,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn matches_emitted(&self) -> u64 {
        self.partitions.iter().map(|p| p.matches_emitted).sum()
    }

    pub fn missing_keys(&self) -> u64 {
        self.partitions.iter().map(|p| p.missing_key_count).sum()
    }

    pub fn expired_state(&self) -> u64 {
        self.partitions
            .iter()
            .map(|p| p.left_expired + p.right_expired)
            .sum()
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read {} messages ({} null, {} undecodable, {} filtered out), \
             {} left / {} right rows, {} missing keys, {} matches, {} rows written, \
             {} expired / {} discarded state records in {:?}",
            self.source.messages_read,
            self.source.null_payloads,
            self.source.decode_failures,
            self.source.filtered_out,
            self.source.left_rows,
            self.source.right_rows,
            self.missing_keys(),
            self.matches_emitted(),
            self.rows_written,
            self.expired_state(),
            self.discarded_state,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_sums_partitions() {
        let report = PipelineReport {
            partitions: vec![
                JoinCoordinatorStats {
                    matches_emitted: 2,
                    missing_key_count: 1,
                    left_expired: 3,
                    ..Default::default()
                },
                JoinCoordinatorStats {
                    matches_emitted: 5,
                    right_expired: 1,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(report.matches_emitted(), 7);
        assert_eq!(report.missing_keys(), 1);
        assert_eq!(report.expired_state(), 4);
        assert!(report.to_string().contains("7 matches"));
    }
}
