//! Task executors for parallel kernel execution
//!
//! Two executor implementations share one capability surface: a
//! fixed-size `ThreadPool` spawning tasks in FIFO order on worker
//! threads, and a `SerialExecutor` that queues tasks and drains them on
//! the calling thread for deterministic single-threaded execution.
//! `submit` returns a completion-cell future; `transfer` reschedules a
//! future's continuations onto another executor so that completions from
//! one pool don't run heavy continuation work in place.

pub mod future;
pub mod stop;

pub use future::{make_future, FuturePromise, KernelFuture};
pub use stop::{StopSource, StopToken};

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::JoinHandle;

use crate::error::{ComputeError, Result};

/// A unit of work.
pub type Task = Box<dyn FnOnce() + Send>;

/// Capability interface to an executor: submit closures, get futures,
/// cancel via token.
pub trait Executor: Send + Sync {
    /// Enqueue a fire-and-forget task. A task whose stop token is
    /// triggered before it runs is dropped without running.
    fn spawn_task(&self, task: Task, stop: StopToken) -> Result<()>;

    /// The level of parallelism (number of tasks that may execute
    /// concurrently).
    fn capacity(&self) -> usize;

    /// Run any queued tasks on the calling thread. Worker-backed pools
    /// do nothing here; the serial executor drains its queue.
    fn flush(&self) {}
}

/// Generic conveniences over any executor.
pub trait ExecutorExt: Executor {
    /// Spawn with an unstoppable token.
    fn spawn(&self, task: impl FnOnce() + Send + 'static) -> Result<()> {
        self.spawn_task(Box::new(task), StopToken::unstoppable())
    }

    /// Submit a closure and get a future for its result. Cancellation
    /// before the task runs completes the future with `Cancelled`.
    fn submit<T, F>(&self, stop: StopToken, func: F) -> Result<KernelFuture<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let (promise, fut) = make_future::<T>();
        let task_stop = stop.clone();
        self.spawn_task(
            Box::new(move || {
                if task_stop.is_stop_requested() {
                    promise.mark_finished(Err(ComputeError::Cancelled(
                        "Task cancelled before execution".into(),
                    )));
                } else {
                    promise.mark_finished(func());
                }
            }),
            stop,
        )?;
        Ok(fut)
    }

}

impl<E: Executor + ?Sized> ExecutorExt for E {}

/// Reschedule a future's continuations onto `executor`, unless the
/// future is already complete (in which case it is returned unchanged
/// and continuations run wherever they are added).
pub fn transfer<T, E>(executor: &Arc<E>, future: KernelFuture<T>) -> KernelFuture<T>
where
    T: Send + 'static,
    E: Executor + ?Sized + 'static,
{
    if future.is_finished() {
        return future;
    }
    transfer_always(executor, future)
}

/// Like `transfer`, but reschedules even if the future is already
/// complete. Useful to force continuations off the completing thread.
pub fn transfer_always<T, E>(executor: &Arc<E>, future: KernelFuture<T>) -> KernelFuture<T>
where
    T: Send + 'static,
    E: Executor + ?Sized + 'static,
{
    let (promise, transferred) = make_future::<T>();
    let executor = Arc::clone(executor);
    future.on_complete(move |result| {
        // If the target executor rejects the continuation (shut down),
        // complete the transferred future on this thread instead of
        // leaving its waiters hanging.
        let slot = Arc::new(Mutex::new(Some((promise, result))));
        let task_slot = Arc::clone(&slot);
        let spawned = executor.spawn(move || {
            if let Some((promise, result)) = task_slot.lock().unwrap().take() {
                promise.mark_finished(result);
            }
        });
        if let Err(err) = spawned {
            tracing::debug!("transfer target rejected continuation: {err}");
            if let Some((promise, result)) = slot.lock().unwrap().take() {
                promise.mark_finished(result);
            }
        }
    });
    transferred
}

// ---------------------------------------------------------------------
// Thread pool

struct PoolShared {
    inner: Mutex<PoolInner>,
    work_available: Condvar,
    idle: Condvar,
}

struct PoolInner {
    queue: VecDeque<(Task, StopToken)>,
    /// Desired number of workers; actual workers converge toward this.
    desired_capacity: usize,
    running_workers: usize,
    /// Tasks queued or currently executing.
    outstanding: usize,
    shutdown: bool,
    /// On quick shutdown pending tasks are dropped.
    quick_shutdown: bool,
}

/// A fixed-size pool of worker threads executing tasks in FIFO order.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Construct a pool with the given number of worker threads.
    pub fn make(threads: usize) -> Result<Arc<Self>> {
        if threads == 0 {
            return Err(ComputeError::Invalid(
                "Thread pool requires at least one thread".into(),
            ));
        }
        let pool = Arc::new(Self {
            shared: Arc::new(PoolShared {
                inner: Mutex::new(PoolInner {
                    queue: VecDeque::new(),
                    desired_capacity: threads,
                    running_workers: 0,
                    outstanding: 0,
                    shutdown: false,
                    quick_shutdown: false,
                }),
                work_available: Condvar::new(),
                idle: Condvar::new(),
            }),
            workers: Mutex::new(Vec::new()),
        });
        pool.launch_workers(threads);
        Ok(pool)
    }

    /// Heuristic default capacity for CPU-bound work.
    pub fn default_capacity() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    fn launch_workers(&self, count: usize) {
        let mut handles = self.workers.lock().unwrap();
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.running_workers += count;
        }
        for _ in 0..count {
            let shared = Arc::clone(&self.shared);
            handles.push(std::thread::spawn(move || worker_loop(shared)));
        }
    }

    /// Number of tasks either running or in the queue.
    pub fn num_tasks(&self) -> usize {
        self.shared.inner.lock().unwrap().outstanding
    }

    /// Dynamically change the number of worker threads. Excess workers
    /// are reaped as they come off their current task; missing workers
    /// are spawned immediately.
    pub fn set_capacity(&self, threads: usize) -> Result<()> {
        if threads == 0 {
            return Err(ComputeError::Invalid(
                "Thread pool requires at least one thread".into(),
            ));
        }
        let to_launch = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.shutdown {
                return Err(ComputeError::Invalid(
                    "Cannot resize a shut-down thread pool".into(),
                ));
            }
            inner.desired_capacity = threads;
            self.shared.work_available.notify_all();
            threads.saturating_sub(inner.running_workers)
        };
        if to_launch > 0 {
            self.launch_workers(to_launch);
        }
        Ok(())
    }

    /// Shut down the pool. With `wait` true, pending tasks finish first;
    /// otherwise they are dropped once running tasks complete.
    pub fn shutdown(&self, wait: bool) -> Result<()> {
        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.shutdown = true;
            if !wait {
                inner.quick_shutdown = true;
                inner.outstanding -= inner.queue.len();
                inner.queue.clear();
            }
            self.shared.work_available.notify_all();
            self.shared.idle.notify_all();
        }
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Block until no task is queued or running. Useful for sequencing
    /// tests.
    pub fn wait_for_idle(&self) {
        let mut inner = self.shared.inner.lock().unwrap();
        while inner.outstanding > 0 {
            inner = self.shared.idle.wait(inner).unwrap();
        }
    }
}

impl Executor for ThreadPool {
    fn spawn_task(&self, task: Task, stop: StopToken) -> Result<()> {
        let mut inner = self.shared.inner.lock().unwrap();
        if inner.shutdown {
            return Err(ComputeError::Cancelled(
                "Thread pool is shut down".into(),
            ));
        }
        inner.queue.push_back((task, stop));
        inner.outstanding += 1;
        self.shared.work_available.notify_one();
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.shared.inner.lock().unwrap().desired_capacity
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let _ = self.shutdown(false);
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    let mut inner = shared.inner.lock().unwrap();
    loop {
        if inner.quick_shutdown {
            break;
        }
        if inner.running_workers > inner.desired_capacity {
            // Reap excess workers after a capacity decrease.
            break;
        }
        if let Some((task, stop)) = inner.queue.pop_front() {
            drop(inner);
            if !stop.is_stop_requested() {
                task();
            }
            inner = shared.inner.lock().unwrap();
            inner.outstanding -= 1;
            if inner.outstanding == 0 {
                shared.idle.notify_all();
            }
        } else if inner.shutdown {
            break;
        } else {
            inner = shared.work_available.wait(inner).unwrap();
        }
    }
    inner.running_workers -= 1;
}

// ---------------------------------------------------------------------
// Serial executor

/// An executor that queues tasks and runs them on the calling thread via
/// an explicit cooperative drain. Capacity is always 1; execution order
/// is FIFO and fully deterministic.
#[derive(Default)]
pub struct SerialExecutor {
    queue: Mutex<VecDeque<(Task, StopToken)>>,
}

impl SerialExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued tasks (and any they enqueue) to completion on the
    /// calling thread.
    pub fn run_loop(&self) {
        loop {
            let next = self.queue.lock().unwrap().pop_front();
            match next {
                Some((task, stop)) => {
                    if !stop.is_stop_requested() {
                        task();
                    }
                }
                None => break,
            }
        }
    }
}

impl Executor for SerialExecutor {
    fn spawn_task(&self, task: Task, stop: StopToken) -> Result<()> {
        self.queue.lock().unwrap().push_back((task, stop));
        Ok(())
    }

    fn capacity(&self) -> usize {
        1
    }

    fn flush(&self) {
        self.run_loop();
    }
}

// ---------------------------------------------------------------------
// Process-wide CPU pool

static CPU_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();

/// The process-global thread pool for CPU-bound kernel execution.
pub fn cpu_pool() -> &'static Arc<ThreadPool> {
    CPU_POOL.get_or_init(|| {
        let capacity = ThreadPool::default_capacity();
        tracing::debug!(capacity, "initializing global CPU thread pool");
        ThreadPool::make(capacity).expect("default capacity is nonzero")
    })
}

/// Get the capacity of the global CPU thread pool.
pub fn cpu_pool_capacity() -> usize {
    cpu_pool().capacity()
}

/// Set the capacity of the global CPU thread pool.
pub fn set_cpu_pool_capacity(threads: usize) -> Result<()> {
    cpu_pool().set_capacity(threads)
}
