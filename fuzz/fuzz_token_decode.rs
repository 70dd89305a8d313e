//! Fuzz target for the action token decoder.
//!
//! Run with: cargo +nightly fuzz run fuzz_token_decode
//!
//! Any token that decodes to an action must survive a re-encode and decode.

#![no_main]

use coursedesk_core::TokenCodec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };
    let codec = TokenCodec::new(4096);
    if let Ok(action) = codec.decode_action(token) {
        // Re-encoding may grow past the ceiling; only fitting tokens are checked.
        if let Ok(encoded) = codec.encode_action(&action) {
            let again = codec
                .decode_action(&encoded)
                .expect("re-encoded token must decode");
            assert_eq!(again, action);
        }
    }
});
