//! Fuzz target for configuration parsing and validation.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = coursedesk_config::AppConfig::parse(text) {
        // Anything that parsed must survive the redacted round trip.
        let shown = toml::to_string(&config.redacted());
        assert!(shown.is_ok());
    }
});
