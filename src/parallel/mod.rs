//! Parallel Module
//!
//! Concurrency building blocks used by the engine:
//! - [`HyperLock`]: one lock per region key, created on demand
//! - [`NoopLock`]: the same interface for single-threaded callers
//! - [`MultiBurst`]: a worker pool for "run all of these, then wait" batches

mod burst;
mod lock;

pub use burst::{BurstExecutor, MultiBurst};
pub use lock::{GridLock, GridLockExt, HyperLock, KeyGuard, NoopLock};
