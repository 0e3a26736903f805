//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock ports or loopback transports.  All tests run on the
//! host (x86_64) with no real hardware required.

mod channel_tests;
mod mock_ports;
mod mux_tests;
