//! Channel events and the bounded observer registry.
//!
//! Events are produced by:
//! - the producer context, on every delivered burst (`NewData`)
//! - the line framer, when it recovers from an overrun (`BufferOverflow`)
//!
//! and fanned out synchronously to every registered observer, in slot
//! order, on the producing context.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────┐     ┌──────────────┐
//! │ RxHandle     │────▶│                  │────▶│ observer 0   │
//! │ (driver cb)  │     │ ObserverRegistry │────▶│ observer 1   │
//! │ LineFramer   │────▶│  (L slots)       │────▶│ ...          │
//! └──────────────┘     └──────────────────┘     └──────────────┘
//! ```
//!
//! Observers run on the producer's context and must not block or call
//! back into the channel that notified them.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::error::{Result, SerialError};

/// Something observable happened on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialEvent<'a> {
    /// A burst of bytes was appended to the receive ring.
    /// `data` is only valid for the duration of the callback.
    NewData { count: usize, data: &'a [u8] },
    /// The producer overran the consumer; the oldest `lost` bytes are gone.
    BufferOverflow { lost: usize },
}

/// Receives [`SerialEvent`]s.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &SerialEvent<'_>);
}

impl<F> EventObserver for F
where
    F: Fn(&SerialEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &SerialEvent<'_>) {
        self(event);
    }
}

/// Handle returned by [`ObserverRegistry::add`], used to remove the
/// observer again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId {
    slot: u8,
    generation: u32,
}

impl ObserverId {
    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

struct Slot {
    generation: u32,
    observer: Arc<dyn EventObserver>,
}

/// Fixed-size table of observers. First free slot wins on insert.
pub struct ObserverRegistry<const L: usize> {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[Option<Slot>; L]>>,
    next_generation: AtomicU32,
}

impl<const L: usize> ObserverRegistry<L> {
    pub const fn new() -> Self {
        const { assert!(L <= u8::MAX as usize, "too many observer slots") };
        Self {
            slots: Mutex::new(RefCell::new([const { None }; L])),
            next_generation: AtomicU32::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        L
    }

    /// Register an observer. Fails with `NoMemory` when every slot is taken.
    pub fn add(&self, observer: Arc<dyn EventObserver>) -> Result<ObserverId> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let (idx, free) = slots
                .iter_mut()
                .enumerate()
                .find(|(_, s)| s.is_none())
                .ok_or(SerialError::NoMemory)?;
            *free = Some(Slot { generation, observer });
            Ok(ObserverId { slot: idx as u8, generation })
        })
    }

    /// Unregister an observer. A stale or unknown handle is `NotFound`.
    pub fn remove(&self, id: ObserverId) -> Result<()> {
        self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let entry = slots.get_mut(id.slot()).ok_or(SerialError::NotFound)?;
            if entry.as_ref().is_some_and(|s| s.generation == id.generation) {
                *entry = None;
                Ok(())
            } else {
                Err(SerialError::NotFound)
            }
        })
    }

    pub fn len(&self) -> usize {
        self.slots
            .lock(|slots| slots.borrow().iter().filter(|s| s.is_some()).count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every registered observer in slot order.
    ///
    /// The slot table is snapshotted first so observers run outside the
    /// critical section and may add or remove observers themselves.
    pub fn notify(&self, event: &SerialEvent<'_>) {
        let snapshot: heapless::Vec<Arc<dyn EventObserver>, L> = self.slots.lock(|slots| {
            slots
                .borrow()
                .iter()
                .flatten()
                .map(|s| Arc::clone(&s.observer))
                .collect()
        });
        for observer in &snapshot {
            observer.on_event(event);
        }
    }
}

impl<const L: usize> Default for ObserverRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}
