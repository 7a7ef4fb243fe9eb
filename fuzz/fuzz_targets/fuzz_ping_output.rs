//! Fuzz target for ping output parsing.
//!
//! Arbitrary utility output must never panic the RTT parser.

#![no_main]

use dpi_verify::probe::parse_rtt_ms;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Some(ms) = parse_rtt_ms(&text) {
        assert!(ms >= 0.0);
    }
});
