//! Integration tests for the coursedesk-macros derives.
//!
//! Proc-macro crates cannot use their own macros in tests, so they live here.

#![allow(dead_code)]

use coursedesk_macros::{Redact, Validate};

#[derive(Redact)]
struct Transport {
    pub name: String,
    #[redact]
    pub secret: String,
    #[redact]
    pub bot_token: Option<String>,
}

#[test]
fn test_redact_hides_plain_and_optional_fields() {
    let transport = Transport {
        name: "chat".to_string(),
        secret: "hunter2".to_string(),
        bot_token: Some("123:abc".to_string()),
    };

    let debug = format!("{transport:?}");
    assert!(debug.contains("chat"));
    assert!(!debug.contains("hunter2"));
    assert!(!debug.contains("123:abc"));
    assert!(debug.contains("[REDACTED]"));
}

#[test]
fn test_redact_shows_missing_option_as_none() {
    let transport = Transport {
        name: "chat".to_string(),
        secret: String::new(),
        bot_token: None,
    };
    assert!(format!("{transport:?}").contains("bot_token: None"));
}

#[derive(Validate)]
#[validate(section = "search")]
struct Limits {
    #[validate(range(min = 1, max = 32))]
    pub min_keyword_len: usize,
    #[validate(non_empty)]
    pub label: String,
    #[validate(min_len = 2)]
    pub code: String,
    #[validate(max_len = 8)]
    pub tag: String,
    #[validate(one_of("all", "courses", "chapters", "resources"))]
    pub filter: String,
}

fn limits() -> Limits {
    Limits {
        min_keyword_len: 3,
        label: "search".to_string(),
        code: "cs".to_string(),
        tag: "short".to_string(),
        filter: "all".to_string(),
    }
}

#[test]
fn test_validate_accepts_valid_values() {
    assert!(limits().validate().is_ok());
}

#[test]
fn test_validate_prefixes_section() {
    let invalid = Limits {
        min_keyword_len: 0,
        ..limits()
    };
    let errors = invalid.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0], "search.min_keyword_len: must be at least 1");
}

#[test]
fn test_validate_upper_bound() {
    let invalid = Limits {
        min_keyword_len: 33,
        ..limits()
    };
    let errors = invalid.validate().unwrap_err();
    assert!(errors[0].contains("at most 32"));
}

#[test]
fn test_validate_one_of_reports_choices() {
    let invalid = Limits {
        filter: "everything".to_string(),
        ..limits()
    };
    let errors = invalid.validate().unwrap_err();
    assert!(errors[0].starts_with("search.filter: must be one of"));
    assert!(errors[0].contains("\"everything\""));
}

#[test]
fn test_validate_collects_every_error() {
    let invalid = Limits {
        min_keyword_len: 0,
        label: String::new(),
        code: "c".to_string(),
        tag: "far too long".to_string(),
        filter: "x".to_string(),
    };
    let errors = invalid.validate().unwrap_err();
    assert_eq!(errors.len(), 5, "{errors:?}");
}

#[derive(Redact, Validate)]
struct Credential {
    #[validate(non_empty)]
    pub service: String,
    #[redact]
    #[validate(min_len = 16)]
    pub key: String,
}

#[test]
fn test_combined_redact_and_validate() {
    let cred = Credential {
        service: "chat".to_string(),
        key: "0123456789abcdef".to_string(),
    };
    assert!(cred.validate().is_ok());

    let debug = format!("{cred:?}");
    assert!(debug.contains("chat"));
    assert!(!debug.contains("0123456789"));
}
