#![no_main]

use lazyresolv::dns::{parse_message, serialize_message_compressed, serialize_message_truncated};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes must fail cleanly, never panic
    let Ok(message) = parse_message(data) else {
        return;
    };

    // Whatever decoded must encode without panicking too
    if let Ok(bytes) = serialize_message_compressed(&message) {
        let _ = parse_message(&bytes);
    }
    if let Ok(bytes) = serialize_message_truncated(&message, 512) {
        assert!(bytes.len() <= 512);
    }
});
