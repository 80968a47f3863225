//! Single-assignment completion cells
//!
//! A `KernelFuture` is completed exactly once by its `FuturePromise`.
//! Observers register callbacks that run with a borrow of the result at
//! completion time; at most one consumer (a `wait` or a transfer
//! continuation) takes ownership of the result. This mirrors the
//! completion-cell futures the executor hands back from `submit`, without
//! requiring results to be cloneable.
//!
//! Callbacks run under the cell's internal lock and must not call back
//! into the same future.

use std::sync::{Arc, Condvar, Mutex};

use crate::error::{ComputeError, Result};

type Observer<T> = Box<dyn FnOnce(&Result<T>) + Send>;
type Consumer<T> = Box<dyn FnOnce(Result<T>) + Send>;

struct FutureState<T> {
    result: Option<Result<T>>,
    consumed: bool,
    observers: Vec<Observer<T>>,
    consumer: Option<Consumer<T>>,
}

struct FutureInner<T> {
    state: Mutex<FutureState<T>>,
    cond: Condvar,
}

/// Consumer half of a completion cell.
pub struct KernelFuture<T> {
    inner: Arc<FutureInner<T>>,
}

/// Producer half of a completion cell.
///
/// Dropping an unfired promise completes the future with a cancellation
/// error, so a task skipped by its executor never strands its waiters.
pub struct FuturePromise<T: Send + 'static> {
    inner: Option<Arc<FutureInner<T>>>,
}

/// Create a connected promise/future pair.
pub fn make_future<T: Send + 'static>() -> (FuturePromise<T>, KernelFuture<T>) {
    let inner = Arc::new(FutureInner {
        state: Mutex::new(FutureState {
            result: None,
            consumed: false,
            observers: Vec::new(),
            consumer: None,
        }),
        cond: Condvar::new(),
    });
    (
        FuturePromise {
            inner: Some(Arc::clone(&inner)),
        },
        KernelFuture { inner },
    )
}

impl<T: Send + 'static> FuturePromise<T> {
    /// Complete the cell. Observers run on the completing thread, then
    /// the consumer (if any) receives ownership of the result.
    pub fn mark_finished(mut self, result: Result<T>) {
        let inner = self.inner.take().expect("promise already completed");
        Self::complete(&inner, result);
    }

    fn complete(inner: &Arc<FutureInner<T>>, result: Result<T>) {
        let mut state = inner.state.lock().unwrap();
        debug_assert!(
            state.result.is_none() && !state.consumed,
            "future completed twice"
        );
        let observers = std::mem::take(&mut state.observers);
        for observer in observers {
            observer(&result);
        }
        if let Some(consumer) = state.consumer.take() {
            state.consumed = true;
            drop(state);
            consumer(result);
        } else {
            state.result = Some(result);
            inner.cond.notify_all();
        }
    }
}

impl<T: Send + 'static> Drop for FuturePromise<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            Self::complete(
                &inner,
                Err(ComputeError::Cancelled(
                    "Task dropped before completion".into(),
                )),
            );
        }
    }
}

impl<T: Send + 'static> KernelFuture<T> {
    /// True once the cell has been completed.
    pub fn is_finished(&self) -> bool {
        let state = self.inner.state.lock().unwrap();
        state.result.is_some() || state.consumed
    }

    /// Block until completion and take the result.
    pub fn wait(self) -> Result<T> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if state.result.is_some() {
                state.consumed = true;
                return state.result.take().unwrap();
            }
            if state.consumed {
                return Err(ComputeError::Invalid(
                    "Future result was already consumed".into(),
                ));
            }
            state = self.inner.cond.wait(state).unwrap();
        }
    }

    /// Register an observer callback. Runs immediately on this thread if
    /// the cell is already complete (and the result not yet consumed).
    pub fn add_callback(&self, callback: impl FnOnce(&Result<T>) + Send + 'static) {
        let mut state = self.inner.state.lock().unwrap();
        match &state.result {
            Some(result) => callback(result),
            None if !state.consumed => state.observers.push(Box::new(callback)),
            None => {}
        }
    }

    /// Register a callback only if the cell is still incomplete. Returns
    /// false (without calling the factory) when already complete.
    pub fn try_add_callback<F>(&self, factory: impl FnOnce() -> F) -> bool
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        if state.result.is_some() || state.consumed {
            return false;
        }
        state.observers.push(Box::new(factory()));
        true
    }

    /// Hand the result to `consumer` at completion time, consuming this
    /// future. If already complete, the consumer runs immediately.
    pub fn on_complete(self, consumer: impl FnOnce(Result<T>) + Send + 'static) {
        let mut state = self.inner.state.lock().unwrap();
        if state.result.is_some() {
            state.consumed = true;
            let result = state.result.take().unwrap();
            drop(state);
            consumer(result);
        } else {
            debug_assert!(state.consumer.is_none(), "future already has a consumer");
            state.consumer = Some(Box::new(consumer));
        }
    }
}
