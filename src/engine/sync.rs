//! Opaque synchronization primitives backing the `mutex`, `rwlock`, `sem`,
//! `cond` and `barrier` kinds.
//!
//! The layer adds no locking of its own around these; their contract is the
//! contract of the wrapped primitive. Objects hand them out behind an `Arc` so
//! host code can share one primitive across threads.

use parking_lot::{Condvar as PlCondvar, Mutex as PlMutex, RwLock as PlRwLock};

/// Mutual exclusion lock.
pub type Mutex = PlMutex<()>;
/// Reader-writer lock.
pub type RwLock = PlRwLock<()>;
/// Condition variable, used together with a [`Mutex`].
pub type Condvar = PlCondvar;
/// Thread rendezvous point for a fixed number of participants.
pub type Barrier = std::sync::Barrier;

/// Counting semaphore with blocking acquisition.
#[derive(Debug)]
pub struct Semaphore {
    permits: PlMutex<u32>,
    available: PlCondvar,
}

impl Semaphore {
    /// Creates a semaphore holding `value` permits.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Self {
            permits: PlMutex::new(value),
            available: PlCondvar::new(),
        }
    }

    /// Current permit count.
    #[must_use]
    pub fn value(&self) -> u32 {
        *self.permits.lock()
    }

    /// Releases one permit and wakes one waiter.
    pub fn post(&self) {
        let mut permits = self.permits.lock();
        *permits = permits.saturating_add(1);
        drop(permits);
        self.available.notify_one();
    }

    /// Blocks until a permit is available, then takes it.
    pub fn wait(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.available.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Takes a permit if one is available without blocking.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            false
        } else {
            *permits -= 1;
            true
        }
    }
}
