//! # Rate Limiter
//!
//! A counting gate that bounds how many operations of one class run at the
//! same time. Callers that arrive while the gate is full wait for a slot and
//! are admitted strictly in arrival order: every caller draws a ticket, and
//! only the lowest unserved ticket may take a free slot.
//!
//! `schedule` is transparent. It returns exactly what the operation returns
//! and never retries.
//!
//! ```
//! use polyrepo::limiter::RateLimiter;
//!
//! let limiter = RateLimiter::new(2);
//! let value: Result<u32, String> = limiter.schedule(|| Ok(42));
//! assert_eq!(value, Ok(42));
//! ```

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct GateState {
    active: usize,
    next_ticket: u64,
    now_serving: u64,
}

/// FIFO counting gate.
#[derive(Debug)]
pub struct RateLimiter {
    max_concurrent: usize,
    state: Mutex<GateState>,
    available: Condvar,
}

/// A held slot; dropping it frees the slot.
#[derive(Debug)]
pub struct Permit<'a> {
    limiter: &'a RateLimiter,
}

impl RateLimiter {
    /// Create a gate admitting `max_concurrent` operations at once.
    /// A limit of zero is treated as one.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            state: Mutex::new(GateState::default()),
            available: Condvar::new(),
        }
    }

    // The state is three counters updated under the lock; a panic elsewhere
    // cannot leave them half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until a slot is free and it is this caller's turn.
    pub fn acquire(&self) -> Permit<'_> {
        let mut state = self.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        while ticket != state.now_serving || state.active >= self.max_concurrent {
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.now_serving += 1;
        state.active += 1;
        drop(state);
        // The next ticket may also fit under the limit.
        self.available.notify_all();

        Permit { limiter: self }
    }

    /// Run `operation` once a slot is available and return its result unchanged.
    pub fn schedule<T, E, F>(&self, operation: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let _permit = self.acquire();
        operation()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Operations currently holding a slot.
    pub fn active(&self) -> usize {
        self.lock().active
    }

    /// Callers waiting for a slot.
    pub fn queued(&self) -> usize {
        let state = self.lock();
        (state.next_ticket - state.now_serving) as usize
    }

    fn release(&self) {
        let mut state = self.lock();
        state.active -= 1;
        drop(state);
        self.available.notify_all();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}
