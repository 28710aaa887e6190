//! Retention-bounded stream-stream equi-join

pub mod clock;
pub mod coordinator;
pub mod state_store;

pub use clock::{Clock, ManualClock, SystemClock, TimeCharacteristic};
pub use coordinator::{
    JoinConfig, JoinCoordinator, JoinCoordinatorStats, JoinSide, ResultColumn, ResultProjection,
};
pub use state_store::{JoinBufferEntry, JoinStateStats, JoinStateStore, JoinStateStoreConfig, TtlUpdate};
