//! Actor-style coordination primitives: a mailbox runtime for single-owner
//! stateful services and the durable storage they persist into.

pub mod runtime;
pub mod storage;

pub use runtime::{Coordinator, CoordinatorHandle, spawn};
pub use storage::{DurableStore, MemoryDurableStore, SqliteDurableStore};
