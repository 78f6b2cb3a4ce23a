// Local key-value persistence
// Saved lists live here between runs; the core only sees the KvStore trait

pub mod error;
pub mod kv;
pub mod memory;

pub use error::{Result, StoreError};
pub use kv::{KvStore, SqliteKvStore};
pub use memory::MemoryKvStore;
