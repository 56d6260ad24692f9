//! Fuzz target for ServerEvent::decode
//!
//! Server events only travel server-to-client, but clients built against
//! this protocol reuse the same decoder, so it gets the same hostile-input
//! treatment: malformed JSON, unknown event names, type confusion between
//! payload shapes.
//!
//! The decoder should NEVER panic, and anything it accepts must re-encode
//! cleanly.

#![no_main]

use banter_proto::ServerEvent;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(event) = ServerEvent::decode(text) {
        // Accepted input must round-trip through the encoder.
        let encoded = event.encode().expect("decoded event failed to re-encode");
        let _ = ServerEvent::decode(&encoded).expect("re-encoded event failed to decode");
    }
});
