//! Change events and the record types derived from them

pub mod event;
pub mod types;

pub use event::{ChangeEvent, EventDecodeError, OperationType, TimestampUnit};
pub use types::{FieldValue, OutputRow, Row};
