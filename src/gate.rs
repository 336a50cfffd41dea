//! Exclusive access to a shared display
//!
//! [`Gate`] serializes every operation on one display. A holder runs its
//! whole operation, bus traffic included, before the next one gets in, so
//! bytes of two operations never interleave on the wire.
//!
//! Waiting can be aborted through an [`Interrupt`], in which case the
//! caller gets nothing and nothing has been changed.
//!
//! ## Example
//!
//! ```
//! use lcdi2c::gate::{Gate, Interrupt};
//!
//! let gate = Gate::new(0u32);
//! let interrupt = Interrupt::new();
//!
//! if let Ok(mut counter) = gate.lock_interruptible(&interrupt) {
//!     *counter += 1;
//! }
//! assert_eq!(*gate.lock(), 1);
//! ```

use core::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How often a waiter looks at its interrupt flag
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Waiting was aborted before the gate was acquired
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interrupted;

impl core::fmt::Display for Interrupted {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Interrupted while waiting for the gate")
    }
}

impl std::error::Error for Interrupted {}

/// Cancellation flag for gate waits
///
/// Clones share the flag. Raising it makes every waiter holding a clone
/// give up; it stays raised until [`clear`](Self::clear) is called.
#[derive(Clone, Debug, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    /// Create a lowered flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Lower the flag
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Whether the flag is raised
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Binary semaphore owning the value it protects
///
/// The value is moved out to the holder and moved back when the
/// [`GateGuard`] drops. A panicking holder does not poison the gate.
#[derive(Debug)]
pub struct Gate<T> {
    slot: Mutex<Option<T>>,
    released: Condvar,
}

impl<T> Gate<T> {
    /// Create an open gate around `value`
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(Some(value)),
            released: Condvar::new(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until the gate is free, without a way out
    ///
    /// Used for teardown paths that must run to completion.
    pub fn lock(&self) -> GateGuard<'_, T> {
        let mut slot = self.slot();
        loop {
            if let Some(value) = slot.take() {
                return GateGuard {
                    gate: self,
                    value: Some(value),
                };
            }
            slot = self
                .released
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait until the gate is free or `interrupt` is raised
    ///
    /// # Errors
    ///
    /// Returns [`Interrupted`] if the flag is raised before the gate is
    /// acquired. The flag is checked before every attempt, so a raised
    /// flag fails even when the gate is free.
    pub fn lock_interruptible(
        &self,
        interrupt: &Interrupt,
    ) -> Result<GateGuard<'_, T>, Interrupted> {
        let mut slot = self.slot();
        loop {
            if interrupt.is_raised() {
                return Err(Interrupted);
            }
            if let Some(value) = slot.take() {
                return Ok(GateGuard {
                    gate: self,
                    value: Some(value),
                });
            }
            slot = self
                .released
                .wait_timeout(slot, POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Take the value if the gate is free right now
    pub fn try_lock(&self) -> Option<GateGuard<'_, T>> {
        let value = self.slot().take()?;
        Some(GateGuard {
            gate: self,
            value: Some(value),
        })
    }

    /// Consume the gate and return the value
    ///
    /// Holding `self` by value means no guard is alive.
    pub fn into_inner(self) -> Option<T> {
        self.slot.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to the value inside a [`Gate`]
///
/// Dropping the guard puts the value back and wakes one waiter.
#[derive(Debug)]
pub struct GateGuard<'a, T> {
    gate: &'a Gate<T>,
    value: Option<T>,
}

impl<T> Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("gate guard is emptied only on drop"),
        }
    }
}

impl<T> DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("gate guard is emptied only on drop"),
        }
    }
}

impl<T> Drop for GateGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            *self.gate.slot() = Some(value);
            self.gate.released.notify_one();
        }
    }
}
