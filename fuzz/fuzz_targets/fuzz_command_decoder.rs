//! Fuzz target: `AppCommand::from_json`
//!
//! Feeds arbitrary text into the command decoder and asserts that it never
//! panics, and that every failure maps onto a 400 reply.
//!
//! cargo fuzz run fuzz_command_decoder

#![no_main]

use fermenter::app::commands::{render_reply, AppCommand};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    match AppCommand::from_json(text) {
        Ok(cmd) => {
            // Anything accepted must survive a re-encode.
            let encoded = serde_json::to_string(&cmd).unwrap_or_default();
            assert!(!encoded.is_empty());
        }
        Err(e) => {
            assert_eq!(render_reply(&Err(e))["status"], 400);
        }
    }
});
