//! Execution context and the batch execution driver
//!
//! The `ExecContext` carries cross-call state (executor handle, memory
//! pool, chunking configuration); a `KernelContext` pairs it with the
//! per-call options of the function being executed. The driver in
//! [`driver`] splits large inputs into chunks, runs them on the
//! executor, and reassembles outputs in caller order.

pub mod driver;
pub mod memory;

pub use memory::{MemoryPool, MemoryReservation, SharedMemoryPool};

use std::sync::Arc;

use crate::executor::{cpu_pool, Executor};
use crate::kernels::between::BetweenOptions;
use crate::kernels::cast::CastOptions;
use crate::kernels::min_max::ElementWiseAggregateOptions;

/// Default number of rows per execution chunk. Large arrays are split at
/// this granularity before being handed to the executor.
pub const DEFAULT_EXEC_CHUNKSIZE: usize = 64 * 1024;

/// Cross-call execution state shared by every kernel invocation.
#[derive(Clone)]
pub struct ExecContext {
    executor: Arc<dyn Executor>,
    memory_pool: SharedMemoryPool,
    use_threads: bool,
    exec_chunksize: usize,
}

impl ExecContext {
    pub fn new() -> Self {
        let executor: Arc<dyn Executor> = cpu_pool().clone();
        Self {
            executor,
            memory_pool: Arc::new(MemoryPool::unbounded()),
            use_threads: true,
            exec_chunksize: DEFAULT_EXEC_CHUNKSIZE,
        }
    }

    /// Single-threaded context: chunks run inline on the calling thread
    /// in order. Useful for deterministic tests.
    pub fn serial() -> Self {
        Self::new().with_use_threads(false)
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_memory_pool(mut self, pool: SharedMemoryPool) -> Self {
        self.memory_pool = pool;
        self
    }

    pub fn with_use_threads(mut self, use_threads: bool) -> Self {
        self.use_threads = use_threads;
        self
    }

    pub fn with_exec_chunksize(mut self, chunksize: usize) -> Self {
        self.exec_chunksize = chunksize.max(1);
        self
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn memory_pool(&self) -> &SharedMemoryPool {
        &self.memory_pool
    }

    pub fn use_threads(&self) -> bool {
        self.use_threads
    }

    pub fn exec_chunksize(&self) -> usize {
        self.exec_chunksize
    }
}

impl Default for ExecContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-call options, tagged by the function family that consumes them.
#[derive(Clone, Default)]
pub enum CallOptions {
    #[default]
    None,
    Cast {
        to_type: arrow::datatypes::DataType,
        options: CastOptions,
    },
    Between(BetweenOptions),
    ElementWise(ElementWiseAggregateOptions),
}

/// The state handed to a kernel executor: cross-call context plus this
/// call's options. Cheap to clone so chunk tasks can own one.
#[derive(Clone)]
pub struct KernelContext {
    pub ctx: ExecContext,
    pub options: CallOptions,
}

impl KernelContext {
    pub fn new(ctx: &ExecContext) -> Self {
        Self {
            ctx: ctx.clone(),
            options: CallOptions::None,
        }
    }

    pub fn with_options(ctx: &ExecContext, options: CallOptions) -> Self {
        Self {
            ctx: ctx.clone(),
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_defaults() {
        let ctx = ExecContext::new();
        assert!(ctx.use_threads());
        assert_eq!(ctx.exec_chunksize(), DEFAULT_EXEC_CHUNKSIZE);
        assert!(ctx.executor().capacity() >= 1);
    }

    #[test]
    fn test_serial_context() {
        let ctx = ExecContext::serial();
        assert!(!ctx.use_threads());
    }

    #[test]
    fn test_chunksize_floor() {
        let ctx = ExecContext::new().with_exec_chunksize(0);
        assert_eq!(ctx.exec_chunksize(), 1);
    }
}
