//! Source and sink adapters that do not need a broker, plus the traits every
//! adapter implements.

pub mod memory;
pub mod stdout;
pub mod traits;

pub use memory::{ChannelSource, MemorySink, MemorySource};
pub use stdout::StdoutSink;
pub use traits::{RecordSink, SourceMessage, TextSource};
