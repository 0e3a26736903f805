//! Delimiter-driven line extraction over a [`RingBuffer`].
//!
//! Each call to [`LineFramer::extract`] starts from an empty accumulator
//! and rescans the unconsumed window of the ring, so a line may be
//! assembled from any number of producer deliveries. Bytes are only
//! consumed from the ring once a complete line has been found.

use core::ops::Deref;

use log::warn;

use crate::events::SerialEvent;
use crate::serial::ring::RingBuffer;
use crate::sync::{BinarySemaphore, Timeout};

// ---------------------------------------------------------------------------
// Line
// ---------------------------------------------------------------------------

/// A completed line, borrowed from the channel that produced it.
///
/// Any delimiter byte that ended the line is included. The bytes stay
/// valid until the next read on the same channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Line<'a> {
    data: &'a [u8],
}

impl<'a> Line<'a> {
    pub const EMPTY: Line<'static> = Line { data: &[] };

    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub const fn empty() -> Line<'static> {
        Line::EMPTY
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub const fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// The line as UTF-8, if it is.
    pub fn as_str(&self) -> Option<&'a str> {
        core::str::from_utf8(self.data).ok()
    }

    /// The line without trailing bytes from `delimiters`.
    pub fn trimmed(&self, delimiters: &[u8]) -> &'a [u8] {
        let end = self
            .data
            .iter()
            .rposition(|b| !delimiters.contains(b))
            .map_or(0, |i| i + 1);
        &self.data[..end]
    }
}

impl Deref for Line<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data
    }
}

impl AsRef<[u8]> for Line<'_> {
    fn as_ref(&self) -> &[u8] {
        self.data
    }
}

// ---------------------------------------------------------------------------
// Framer
// ---------------------------------------------------------------------------

/// Line accumulator for one channel. Not reentrant: one reader per channel.
#[derive(Debug, Default)]
pub struct LineFramer<const N: usize> {
    acc: heapless::Vec<u8, N>,
}

impl<const N: usize> LineFramer<N> {
    pub const fn new() -> Self {
        Self {
            acc: heapless::Vec::new(),
        }
    }

    /// The line produced by the last successful [`extract`](Self::extract).
    pub fn line(&self) -> Line<'_> {
        Line::new(&self.acc)
    }

    pub fn reset(&mut self) {
        self.acc.clear();
    }

    /// Pull the next complete line out of `ring`.
    ///
    /// Blocks on `ready` while the ring holds no unscanned bytes, for at
    /// most `timeout` in total. Returns the line length, or 0 on timeout.
    /// With no delimiters any non-empty accumulation is a line.
    ///
    /// Overflow recovery drops the oldest bytes, restarts accumulation and
    /// reports `BufferOverflow` through `on_event`.
    pub fn extract(
        &mut self,
        ring: &RingBuffer<N>,
        ready: &BinarySemaphore,
        delimiters: &[u8],
        timeout: Timeout,
        mut on_event: impl FnMut(&SerialEvent<'_>),
    ) -> usize {
        self.acc.clear();
        let deadline = timeout.deadline();

        loop {
            if ring.count() == self.acc.len() {
                if !ready.take_until(deadline) {
                    self.acc.clear();
                    return 0;
                }
                continue;
            }

            if let Some(lost) = ring.resolve_overflow() {
                warn!("rx overflow: dropped {} oldest bytes", lost);
                self.acc.clear();
                on_event(&SerialEvent::BufferOverflow { lost });
            }

            let available = ring.count();
            if available > N {
                // Overrun again since the check above.
                continue;
            }

            let mut found = false;
            while self.acc.len() < available {
                let byte = ring.peek(self.acc.len());
                if self.acc.push(byte).is_err() {
                    break;
                }
                if delimiters.contains(&byte) {
                    found = true;
                    break;
                }
            }

            // The producer may have lapped the bytes we just copied.
            if ring.is_overflowed() {
                warn!("rx overflow while framing, restarting line");
                self.acc.clear();
                continue;
            }

            if found || (delimiters.is_empty() && !self.acc.is_empty()) {
                ring.consume(self.acc.len());
                return self.acc.len();
            }
        }
    }
}
