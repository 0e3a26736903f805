//! Fuzz target: `LineFramer::extract`
//!
//! Splits arbitrary input into deliveries (first byte picks the burst
//! size, second the delimiter count) and drains the ring after each one.
//! The framer must never panic, never return a line longer than the ring,
//! and every line must end in a delimiter when delimiters are set.
//!
//! cargo fuzz run fuzz_line_framer

#![no_main]

use libfuzzer_sys::fuzz_target;
use lineserial::serial::framer::LineFramer;
use lineserial::serial::ring::RingBuffer;
use lineserial::sync::{BinarySemaphore, Timeout};

const CAP: usize = 64;
const DELIMS: &[u8] = b"\n\r;\0";

fuzz_target!(|data: &[u8]| {
    let [burst, ndelim, rest @ ..] = data else {
        return;
    };
    let burst = usize::from(*burst).max(1);
    let delims = &DELIMS[..usize::from(*ndelim) % (DELIMS.len() + 1)];

    let ring = RingBuffer::<CAP>::new();
    let ready = BinarySemaphore::new(false);
    let mut framer = LineFramer::<CAP>::new();

    for chunk in rest.chunks(burst) {
        ring.append(chunk);
        ready.give();
        while framer.extract(&ring, &ready, delims, Timeout::NoWait, |_| {}) > 0 {
            let line = framer.line();
            assert!(line.len() <= CAP, "line exceeds ring capacity");
            if !delims.is_empty() {
                let last = line.last().copied().unwrap_or_default();
                assert!(delims.contains(&last), "line must end at a delimiter");
            }
        }
        assert!(ring.count() <= CAP, "overflow must be resolved after a drain");
    }
});
