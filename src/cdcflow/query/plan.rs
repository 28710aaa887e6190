//! Validated filter/projection plans and the stage that splits the change
//! stream into the two join inputs.

use crate::cdcflow::cdc::{ChangeEvent, Row, TimestampUnit};
use crate::cdcflow::error::{PipelineError, PipelineResult};
use crate::cdcflow::join::JoinSide;
use crate::cdcflow::query::filter::EventPredicate;
use crate::cdcflow::query::projection::Projection;
use log::debug;

/// A named predicate plus projection, checked once at construction
#[derive(Debug, Clone)]
pub struct FilterProjectPlan {
    name: String,
    predicate: EventPredicate,
    projection: Projection,
}

impl FilterProjectPlan {
    pub fn build(
        name: impl Into<String>,
        predicate: EventPredicate,
        projection: Projection,
    ) -> PipelineResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PipelineError::plan("<unnamed>", "plan name must not be empty"));
        }
        if predicate.database.trim().is_empty() {
            return Err(PipelineError::plan(&name, "database must not be empty"));
        }
        if predicate.table.trim().is_empty() {
            return Err(PipelineError::plan(&name, "table must not be empty"));
        }
        if projection.is_empty() {
            return Err(PipelineError::plan(&name, "at least one column is required"));
        }
        if let Some(alias) = projection.duplicate_alias() {
            return Err(PipelineError::plan(
                &name,
                format!("duplicate output column '{}'", alias),
            ));
        }
        Ok(Self {
            name,
            predicate,
            projection,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn predicate(&self) -> &EventPredicate {
        &self.predicate
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Project the event when it passes the predicate
    pub fn apply(&self, event: &ChangeEvent, ts_unit: TimestampUnit) -> Option<Row> {
        if !self.predicate.matches(event) {
            return None;
        }
        Some(Row::new(
            self.projection.apply(event),
            event.event_time_ms(ts_unit),
        ))
    }
}

/// Evaluates both join-input plans against every change event
///
/// One event may feed both sides; the plans never see each other's output.
#[derive(Debug, Clone)]
pub struct SplitStage {
    left: FilterProjectPlan,
    right: FilterProjectPlan,
    ts_unit: TimestampUnit,
}

impl SplitStage {
    pub fn new(left: FilterProjectPlan, right: FilterProjectPlan, ts_unit: TimestampUnit) -> Self {
        Self {
            left,
            right,
            ts_unit,
        }
    }

    pub fn left(&self) -> &FilterProjectPlan {
        &self.left
    }

    pub fn right(&self) -> &FilterProjectPlan {
        &self.right
    }

    pub fn split(&self, event: &ChangeEvent) -> Vec<(JoinSide, Row)> {
        let mut out = Vec::with_capacity(2);
        if let Some(row) = self.left.apply(event, self.ts_unit) {
            out.push((JoinSide::Left, row));
        }
        if let Some(row) = self.right.apply(event, self.ts_unit) {
            out.push((JoinSide::Right, row));
        }
        if out.is_empty() {
            debug!(
                "SplitStage: {}.{} ({}) matched neither '{}' nor '{}'",
                event.database,
                event.table,
                event.op,
                self.left.name,
                self.right.name
            );
        }
        out
    }
}
