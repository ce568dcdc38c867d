//! 去重存储层：记录哪些报关单已经取到条码

pub mod backend;
pub mod tracking_store;

pub use backend::{JsonFileBackend, MemoryBackend, RecordBackend};
pub use tracking_store::{TrackedRecord, TrackingStore};
