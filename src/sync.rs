//! Blocking primitives shared by producer and consumer contexts.
//!
//! Two things live here:
//!
//! - [`Timeout`]: how long a blocking call may suspend. Every blocking
//!   operation in the crate takes one; there is no separate cancellation.
//! - [`BinarySemaphore`]: a latched one-slot signal. `give` never blocks,
//!   so it is safe to post from a driver callback; `take` consumes the
//!   signal or waits for it until the timeout expires.
//!
//! ```text
//!  producer (driver callback)          consumer (get_line / send)
//!  ─────────────────────────           ──────────────────────────
//!  ring.append(bytes)
//!  data_ready.give()  ───────────▶     data_ready.take(timeout)
//! ```

use core::time::Duration;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// How long a blocking call may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately (polling).
    NoWait,
    /// Wait at most this long.
    After(Duration),
    /// Wait until the condition is met.
    Forever,
}

impl Timeout {
    pub const fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Self::NoWait
        } else {
            Self::After(Duration::from_millis(ms))
        }
    }

    /// Fix the timeout to an absolute point in time.
    pub(crate) fn deadline(self) -> Deadline {
        match self {
            Self::NoWait => Deadline::Now,
            // A duration too large to represent is as good as forever.
            Self::After(d) => Instant::now()
                .checked_add(d)
                .map_or(Deadline::Never, Deadline::At),
            Self::Forever => Deadline::Never,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        if d.is_zero() { Self::NoWait } else { Self::After(d) }
    }
}

/// Absolute form of a [`Timeout`], shared across repeated waits inside
/// one blocking call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Deadline {
    Now,
    At(Instant),
    Never,
}

/// Binary semaphore: at most one pending signal, repeated gives collapse.
#[derive(Debug)]
pub struct BinarySemaphore {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl BinarySemaphore {
    pub const fn new(signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(signaled),
            cond: Condvar::new(),
        }
    }

    /// Post the signal. Never blocks beyond the internal critical section.
    pub fn give(&self) {
        *self.lock() = true;
        self.cond.notify_one();
    }

    /// Consume the signal, waiting up to `timeout` for it.
    /// Returns `false` if the timeout expired first.
    pub fn take(&self, timeout: Timeout) -> bool {
        self.take_until(timeout.deadline())
    }

    pub(crate) fn take_until(&self, deadline: Deadline) -> bool {
        let mut signaled = self.lock();
        match deadline {
            Deadline::Now => {}
            Deadline::Never => {
                while !*signaled {
                    signaled = self
                        .cond
                        .wait(signaled)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            Deadline::At(at) => {
                while !*signaled {
                    let now = Instant::now();
                    if now >= at {
                        break;
                    }
                    signaled = self
                        .cond
                        .wait_timeout(signaled, at - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        }
        core::mem::replace(&mut *signaled, false)
    }

    /// Drop a pending signal without waiting.
    pub fn reset(&self) {
        *self.lock() = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.lock()
    }

    // The flag is a plain bool, so a panic while holding the lock cannot
    // leave it inconsistent.
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new(false)
    }
}
