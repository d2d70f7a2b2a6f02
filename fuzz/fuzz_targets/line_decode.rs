//! Fuzz target for `decode_line`
//!
//! Arbitrary text must decode to a message or a structured error, never a
//! panic. Anything that decodes must re-encode within the same limit.

#![no_main]

use dih_proto::{DEFAULT_MAX_RECORD_LEN, decode_line, encode_line};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(message) = decode_line(text, DEFAULT_MAX_RECORD_LEN) {
        let line = encode_line(&message, usize::MAX).expect("decoded message re-encodes");
        let again = decode_line(&line, usize::MAX).expect("re-encoded line decodes");
        assert_eq!(again, message);
    }
});
