//! In-memory storage
//!
//! The mempool of pending transactions and the operator event log. Nothing
//! is persisted: a node's state lives for the lifetime of the process.

pub mod event_log;
pub mod memory_pool;

pub use event_log::EventLog;
pub use memory_pool::MemoryPool;
