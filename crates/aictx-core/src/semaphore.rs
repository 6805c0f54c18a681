//! Counting semaphore used as the worker pool's admission control.
//!
//! One permit is one admission slot. A permit returns to the pool only when
//! its [`Permit`] guard is dropped, so a slot stays occupied for the whole
//! lifetime of the execution unit holding it.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A counting semaphore built on `Mutex + Condvar`.
pub struct Semaphore {
    free: Mutex<usize>,
    released: Condvar,
    capacity: usize,
}

/// RAII guard for one admission slot; releases it on drop.
#[must_use = "dropping a permit releases the slot immediately"]
pub struct Permit<'a>(&'a Semaphore);

impl Semaphore {
    /// Create a semaphore with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            free: Mutex::new(capacity),
            released: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        *self.lock()
    }

    /// Block until a slot is free, then take it.
    pub fn acquire(&self) -> Permit<'_> {
        let mut free = self.lock();
        while *free == 0 {
            free = self
                .released
                .wait(free)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *free -= 1;
        Permit(self)
    }

    // The counter is a plain integer, so a panic while holding the lock
    // cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let mut free = self.0.lock();
        *free += 1;
        self.0.released.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn acquire_and_release() {
        let sem = Semaphore::new(2);
        let g1 = sem.acquire();
        let _g2 = sem.acquire();
        assert_eq!(sem.available(), 0);
        drop(g1);
        assert_eq!(sem.available(), 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let sem = Semaphore::new(0);
        assert_eq!(sem.capacity(), 1);
        let _g = sem.acquire();
        assert_eq!(sem.available(), 0);
    }

    #[test]
    fn blocking_acquire() {
        let sem = Arc::new(Semaphore::new(1));
        let guard = sem.acquire();

        let sem2 = sem.clone();
        let handle = std::thread::spawn(move || {
            let _g = sem2.acquire();
            42
        });

        // Give thread time to block
        std::thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        drop(guard);

        assert_eq!(handle.join().unwrap(), 42);
        assert_eq!(sem.available(), 1);
    }

    #[test]
    fn permit_released_when_holder_panics() {
        let sem = Arc::new(Semaphore::new(1));
        let sem2 = sem.clone();
        let result = std::thread::spawn(move || {
            let _g = sem2.acquire();
            panic!("boom");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(sem.available(), 1);
    }
}
