pub mod dbbatch;
pub mod memstore;
pub mod store;

pub use dbbatch::PgBatchStore;
pub use memstore::MemoryBatchStore;
pub use store::{BatchStore, SnapshotSource, StoreError};
