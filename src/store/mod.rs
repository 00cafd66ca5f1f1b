//! Storage backends for staged tables and correlation artifacts.

pub mod disk;
pub mod export;
pub mod lock;
pub mod memory;

pub use disk::DiskStore;
pub use lock::RunLock;
pub use memory::MemoryStore;
