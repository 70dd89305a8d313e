#![deny(unsafe_code)]

//! Procedural macros for coursedesk.
//!
//! - `#[derive(Validate)]`: generate a `validate()` method from field annotations
//! - `#[derive(Redact)]`: hide sensitive fields (bot tokens) in Debug output

extern crate proc_macro;

mod redact;
mod validate;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derive macro for redacting sensitive fields in Debug output.
///
/// Fields annotated with `#[redact]` display as `"[REDACTED]"`. An
/// `Option` field that is `None` still displays as `None`, so an operator can
/// tell a missing credential from a configured one.
///
/// # Example
///
/// ```ignore
/// use coursedesk_macros::Redact;
///
/// #[derive(Redact)]
/// struct ChannelConfig {
///     pub enabled: bool,
///     #[redact]
///     pub bot_token: Option<String>,
/// }
/// ```
#[proc_macro_derive(Redact, attributes(redact))]
pub fn derive_redact(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    redact::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive macro for declarative field validation.
///
/// Generates a `validate(&self) -> Result<(), Vec<String>>` method.
///
/// Container attribute:
/// - `#[validate(section = "search")]`: prefix messages with `search.`
///
/// Field attributes:
/// - `#[validate(non_empty)]`: string/collection must not be empty
/// - `#[validate(range(min = N, max = M))]`: numeric value in [N, M]
/// - `#[validate(min_len = N)]` / `#[validate(max_len = N)]`
/// - `#[validate(one_of("a", "b"))]`: string must equal one of the literals
///
/// # Example
///
/// ```ignore
/// use coursedesk_macros::Validate;
///
/// #[derive(Validate)]
/// #[validate(section = "search")]
/// struct SearchConfig {
///     #[validate(range(min = 1, max = 32))]
///     pub min_keyword_len: usize,
///     #[validate(range(min = 1, max = 50))]
///     pub page_size: usize,
/// }
/// ```
#[proc_macro_derive(Validate, attributes(validate))]
pub fn derive_validate(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    validate::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
