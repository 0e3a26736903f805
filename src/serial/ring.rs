//! Per-channel receive store.
//!
//! Single producer (driver callback) appends, single consumer (the line
//! framer) reads and consumes. Both sides only touch atomics, so the
//! producer never blocks and never fails.
//!
//! ```text
//!   read                      written
//!    │◀──────── count ──────────▶│
//!  ──┴───────────────────────────┴──▶  byte counters, modulo WRAP
//!
//!  start = read % N     count = written - read (mod WRAP)
//! ```
//!
//! `WRAP` is the largest multiple of `N` that fits in a `usize`, so a slot
//! index stays continuous when the counters wrap, whatever `N` is.
//!
//! Appends never check for room. When the producer outruns the consumer
//! `count` grows past `N`; the consumer notices on its next pass and
//! drops the oldest `count - N` bytes via [`RingBuffer::resolve_overflow`].

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Fixed-capacity SPSC byte ring with lazy overflow detection.
///
/// `N` must be non-zero and even (dual-partition transports split the
/// buffer in halves).
pub struct RingBuffer<const N: usize> {
    buf: [AtomicU8; N],
    /// Bytes appended, modulo `WRAP`. Producer-owned.
    written: AtomicUsize,
    /// Bytes consumed, modulo `WRAP`. Consumer-owned.
    read: AtomicUsize,
}

impl<const N: usize> RingBuffer<N> {
    const WRAP: usize = N * (usize::MAX / N);

    /// `pos + n` modulo `WRAP`, for `pos < WRAP`.
    const fn advance(pos: usize, n: usize) -> usize {
        let n = n % Self::WRAP;
        let room = Self::WRAP - pos;
        if n >= room { n - room } else { pos + n }
    }

    pub const fn new() -> Self {
        const {
            assert!(N > 0, "ring capacity must be non-zero");
            assert!(N % 2 == 0, "ring capacity must be even");
        }
        Self {
            buf: [const { AtomicU8::new(0) }; N],
            written: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    // ── Producer side ─────────────────────────────────────────

    /// Append `data` at the logical end of the ring.
    ///
    /// Always succeeds. `count` grows by the full length even past the
    /// capacity; only the last `N` bytes of an oversized burst are
    /// actually stored since the rest would be overwritten anyway.
    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let written = self.written.load(Ordering::Relaxed);
        let skip = data.len().saturating_sub(N);

        let mut pos = Self::advance(written, skip) % N;
        for &byte in &data[skip..] {
            self.buf[pos].store(byte, Ordering::Relaxed);
            pos += 1;
            if pos == N {
                pos = 0;
            }
        }

        self.written
            .store(Self::advance(written, data.len()), Ordering::Release);
    }

    // ── Consumer side ─────────────────────────────────────────

    /// Bytes appended and not yet consumed. Exceeds `N` on overflow.
    pub fn count(&self) -> usize {
        let written = self.written.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Relaxed);
        if written >= read {
            written - read
        } else {
            Self::WRAP - read + written
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn is_overflowed(&self) -> bool {
        self.count() > N
    }

    /// Logical read offset into the storage.
    pub fn start(&self) -> usize {
        self.read.load(Ordering::Relaxed) % N
    }

    /// Byte at logical `offset` from the read position.
    ///
    /// Only meaningful for `offset < min(count, N)`.
    pub fn peek(&self, offset: usize) -> u8 {
        let idx = Self::advance(self.read.load(Ordering::Relaxed), offset) % N;
        self.buf[idx].load(Ordering::Relaxed)
    }

    /// Release `len` bytes back to the producer.
    pub fn consume(&self, len: usize) {
        let read = self.read.load(Ordering::Relaxed);
        self.read.store(Self::advance(read, len), Ordering::Release);
    }

    /// If the producer overran the consumer, drop the oldest bytes so at
    /// most `N` remain and return how many were lost.
    pub fn resolve_overflow(&self) -> Option<usize> {
        let count = self.count();
        if count <= N {
            return None;
        }
        let lost = count - N;
        self.consume(lost);
        Some(lost)
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for RingBuffer<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &N)
            .field("start", &self.start())
            .field("count", &self.count())
            .finish()
    }
}
