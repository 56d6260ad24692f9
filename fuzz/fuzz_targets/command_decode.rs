//! Fuzz target for ClientCommand::decode
//!
//! Room commands arrive as text frames straight off the socket, so the
//! decoder sees arbitrary client input: truncated JSON, wrong event names,
//! payloads of the wrong shape, deeply nested garbage.
//!
//! The decoder should NEVER panic. All invalid inputs should return an error.

#![no_main]

use banter_proto::ClientCommand;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let _ = ClientCommand::decode(text);
});
