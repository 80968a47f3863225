//! Batch execution driver
//!
//! Invokes a kernel over one or more same-length chunks of its array
//! operands. Small inputs run inline; inputs larger than the context's
//! chunk size are split, one task per chunk, and submitted to the
//! executor. Chunks share no mutable state; outputs are reassembled in
//! caller-index order regardless of completion order. The first observed
//! error cancels scheduling of sibling chunks and the call returns with
//! no partial output.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::compute::concat;

use crate::datum::{broadcast_len, Datum};
use crate::error::{ComputeError, Result};
use crate::execution::KernelContext;
use crate::executor::{Executor, ExecutorExt, StopSource};

/// The executable part of a kernel: element-wise over already-promoted
/// operands, returning a freshly allocated output array.
pub type KernelExecFn = Arc<dyn Fn(&KernelContext, &[Datum]) -> Result<ArrayRef> + Send + Sync>;

/// Run a kernel over the given operands, chunking across the executor
/// when the input is large enough to be worth splitting.
pub fn execute_elementwise(
    kctx: &KernelContext,
    exec: &KernelExecFn,
    args: &[Datum],
) -> Result<ArrayRef> {
    let arg_refs: Vec<&Datum> = args.iter().collect();
    let (len, all_scalar) = broadcast_len(&arg_refs)?;

    // Rough output-size charge against the shared pool for the duration
    // of the call.
    let pool = kctx.ctx.memory_pool();
    let _reservation = pool.try_reserve(len).ok_or_else(|| {
        ComputeError::Execution(format!(
            "Memory limit exceeded reserving {len} bytes (limit {}, used {})",
            pool.limit(),
            pool.used()
        ))
    })?;

    let chunksize = kctx.ctx.exec_chunksize();
    if all_scalar || len <= chunksize {
        return exec(kctx, args);
    }

    let ranges: Vec<(usize, usize)> = (0..len)
        .step_by(chunksize)
        .map(|offset| (offset, chunksize.min(len - offset)))
        .collect();
    tracing::debug!(len, chunks = ranges.len(), "chunked kernel execution");

    if !kctx.ctx.use_threads() {
        let mut outputs = Vec::with_capacity(ranges.len());
        for (offset, chunk_len) in ranges {
            let chunk_args = slice_args(args, offset, chunk_len);
            outputs.push(exec(kctx, &chunk_args)?);
        }
        return reassemble(&outputs);
    }

    let stop_source = StopSource::new();
    let executor = kctx.ctx.executor();
    let mut futures = Vec::with_capacity(ranges.len());
    for (offset, chunk_len) in ranges {
        let chunk_args = slice_args(args, offset, chunk_len);
        let task_kctx = kctx.clone();
        let task_exec = Arc::clone(exec);
        let submitted = executor.submit(stop_source.token(), move || {
            task_exec(&task_kctx, &chunk_args)
        });
        match submitted {
            Ok(future) => futures.push(future),
            Err(err) => {
                stop_source.request_stop();
                return Err(err);
            }
        }
    }
    // Serial executors drain their queue here; pools ignore this.
    executor.flush();

    let mut outputs = Vec::with_capacity(futures.len());
    let mut first_error = None;
    for future in futures {
        if first_error.is_some() {
            // Sibling results after a failure are discarded.
            let _ = future.wait();
            continue;
        }
        match future.wait() {
            Ok(array) => outputs.push(array),
            Err(err) => {
                stop_source.request_stop();
                first_error = Some(err);
            }
        }
    }
    if let Some(err) = first_error {
        return Err(err);
    }
    reassemble(&outputs)
}

fn slice_args(args: &[Datum], offset: usize, len: usize) -> Vec<Datum> {
    args.iter()
        .map(|arg| match arg {
            Datum::Scalar(a) => Datum::Scalar(Arc::clone(a)),
            Datum::Array(a) => Datum::Array(a.slice(offset, len)),
        })
        .collect()
}

fn reassemble(outputs: &[ArrayRef]) -> Result<ArrayRef> {
    let parts: Vec<&dyn Array> = outputs.iter().map(|a| a.as_ref()).collect();
    Ok(concat(&parts)?)
}
