//! Memory accounting for kernel execution
//!
//! Output buffers for chunked kernel runs are charged against a shared,
//! thread-safe pool carried by the execution context. Reservations are
//! RAII guards so a failed or cancelled chunk releases its accounting on
//! unwind.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Memory pool for tracking allocation against a limit
#[derive(Debug)]
pub struct MemoryPool {
    /// Maximum bytes allowed
    limit: usize,
    /// Current usage in bytes
    used: AtomicUsize,
}

impl MemoryPool {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Create a pool with no limit
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Try to reserve memory; `None` when the limit would be exceeded
    pub fn try_reserve(&self, bytes: usize) -> Option<MemoryReservation<'_>> {
        let mut current = self.used.load(Ordering::Relaxed);
        loop {
            let new_usage = current.checked_add(bytes)?;
            if new_usage > self.limit {
                return None;
            }

            match self.used.compare_exchange_weak(
                current,
                new_usage,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Some(MemoryReservation { pool: self, bytes }),
                Err(actual) => current = actual,
            }
        }
    }

    /// Reserve memory unconditionally (may exceed the limit)
    pub fn reserve(&self, bytes: usize) -> MemoryReservation<'_> {
        self.used.fetch_add(bytes, Ordering::SeqCst);
        MemoryReservation { pool: self, bytes }
    }

    /// Current usage in bytes
    pub fn used(&self) -> usize {
        self.used.load(Ordering::Relaxed)
    }

    /// Configured limit in bytes
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Remaining headroom in bytes
    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.used())
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::SeqCst);
    }
}

/// RAII guard for a memory reservation
pub struct MemoryReservation<'a> {
    pool: &'a MemoryPool,
    bytes: usize,
}

impl<'a> MemoryReservation<'a> {
    /// Size of this reservation in bytes
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Grow or shrink the reservation in place
    pub fn resize(&mut self, new_bytes: usize) {
        if new_bytes > self.bytes {
            self.pool
                .used
                .fetch_add(new_bytes - self.bytes, Ordering::SeqCst);
        } else {
            self.pool
                .used
                .fetch_sub(self.bytes - new_bytes, Ordering::SeqCst);
        }
        self.bytes = new_bytes;
    }
}

impl<'a> Drop for MemoryReservation<'a> {
    fn drop(&mut self) {
        self.pool.release(self.bytes);
    }
}

/// Shared memory pool handle carried by execution contexts
pub type SharedMemoryPool = Arc<MemoryPool>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pool() {
        let pool = MemoryPool::new(1000);

        assert_eq!(pool.used(), 0);
        assert_eq!(pool.available(), 1000);

        let r1 = pool.try_reserve(500).unwrap();
        assert_eq!(pool.used(), 500);
        assert_eq!(pool.available(), 500);

        let r2 = pool.try_reserve(400).unwrap();
        assert_eq!(pool.used(), 900);

        assert!(pool.try_reserve(200).is_none());

        drop(r1);
        assert_eq!(pool.used(), 400);

        drop(r2);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_resize_reservation() {
        let pool = MemoryPool::new(1000);

        let mut r = pool.reserve(100);
        assert_eq!(pool.used(), 100);

        r.resize(200);
        assert_eq!(pool.used(), 200);

        r.resize(50);
        assert_eq!(pool.used(), 50);

        drop(r);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_reservation_is_thread_safe() {
        let pool = Arc::new(MemoryPool::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let r = pool.try_reserve(10);
                        drop(r);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(pool.used(), 0);
    }
}
