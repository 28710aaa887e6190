//! Filter and projection over decoded change events

pub mod filter;
pub mod plan;
pub mod projection;

pub use filter::EventPredicate;
pub use plan::{FilterProjectPlan, SplitStage};
pub use projection::{ColumnRef, ProjectedColumn, Projection};
