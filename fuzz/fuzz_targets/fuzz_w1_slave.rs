//! Fuzz target: `parse_w1_slave`
//!
//! Arbitrary sysfs contents must yield either a finite temperature or a
//! typed error, never a panic.
//!
//! cargo fuzz run fuzz_w1_slave

#![no_main]

use fermenter::sensors::temperature::parse_w1_slave;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(celsius) = parse_w1_slave(&text) {
        assert!(celsius.is_finite());
    }
});
