//! Concurrency core for the quire converter.
//!
//! ## Components
//!
//! - [`RendererPool`]: a bounded, lazily filled pool of renderer instances
//!   with exclusive checkout and one-shot teardown.
//! - [`BatchExecutor`]: fans a batch of jobs out over the pool and collects
//!   exactly one result per job, in job order.
//! - [`CancelToken`]: a cooperative stop signal checked between jobs.
//!
//! ## Usage
//!
//! ```ignore
//! use quire_executor::{BatchExecutor, CancelToken, RendererPool};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(RendererPool::new(factory, 4));
//! let results = BatchExecutor::run(&pool, Arc::new(task), &CancelToken::new()).await;
//! pool.close().await?;
//! ```

mod batch;
mod cancel;
mod pool;

#[cfg(test)]
mod testing;

pub use batch::{BatchExecutor, BatchTask, Unattempted};
pub use cancel::CancelToken;
pub use pool::{PoolError, PooledRenderer, RendererPool};
