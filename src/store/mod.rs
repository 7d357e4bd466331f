pub mod disk;
pub mod memory;

pub use disk::{DiskStore, open_keyspace};
pub use memory::{MemoryCache, MemoryStore};
