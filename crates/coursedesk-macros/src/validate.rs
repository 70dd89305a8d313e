//! Implementation of `#[derive(Validate)]`.
//!
//! Parses `#[validate(...)]` attributes on the struct and its fields and
//! generates a `validate(&self) -> Result<(), Vec<String>>` method. Every
//! violated rule contributes one message; all rules are checked.

use proc_macro2::TokenStream;
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::parse::Parse;
use syn::{DeriveInput, LitInt, LitStr, Result, Token};

/// Parsed validation rules for a single field.
struct FieldRules {
    field_name: syn::Ident,
    label: String,
    non_empty: bool,
    range_min: Option<i64>,
    range_max: Option<i64>,
    min_len: Option<usize>,
    max_len: Option<usize>,
    one_of: Vec<LitStr>,
}

impl FieldRules {
    fn parse(field: &syn::Field, section: Option<&str>) -> Result<Option<Self>> {
        let Some(field_name) = field.ident.clone() else {
            return Err(syn::Error::new_spanned(field, "expected a named field"));
        };
        let label = match section {
            Some(section) => format!("{section}.{field_name}"),
            None => field_name.to_string(),
        };

        let mut rules = FieldRules {
            field_name,
            label,
            non_empty: false,
            range_min: None,
            range_max: None,
            min_len: None,
            max_len: None,
            one_of: Vec::new(),
        };

        let mut has_validate = false;
        for attr in &field.attrs {
            if !attr.path().is_ident("validate") {
                continue;
            }
            has_validate = true;
            attr.parse_nested_meta(|meta| rules.parse_rule(meta))?;
        }

        Ok(has_validate.then_some(rules))
    }

    fn parse_rule(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("non_empty") {
            self.non_empty = true;
            return Ok(());
        }

        if meta.path.is_ident("min_len") {
            let lit: LitInt = meta.value()?.parse()?;
            self.min_len = Some(lit.base10_parse()?);
            return Ok(());
        }

        if meta.path.is_ident("max_len") {
            let lit: LitInt = meta.value()?.parse()?;
            self.max_len = Some(lit.base10_parse()?);
            return Ok(());
        }

        if meta.path.is_ident("one_of") {
            let content;
            syn::parenthesized!(content in meta.input);
            let choices = content.parse_terminated(<LitStr as Parse>::parse, Token![,])?;
            if choices.is_empty() {
                return Err(meta.error("one_of needs at least one choice"));
            }
            self.one_of = choices.into_iter().collect();
            return Ok(());
        }

        if meta.path.is_ident("range") {
            meta.parse_nested_meta(|nested| {
                let lit: LitInt = nested.value()?.parse()?;
                if nested.path.is_ident("min") {
                    self.range_min = Some(lit.base10_parse()?);
                    Ok(())
                } else if nested.path.is_ident("max") {
                    self.range_max = Some(lit.base10_parse()?);
                    Ok(())
                } else {
                    Err(nested.error("expected `min` or `max`"))
                }
            })?;
            return Ok(());
        }

        Err(meta.error(
            "unknown validate rule; expected non_empty, range, min_len, max_len, or one_of",
        ))
    }

    fn generate_checks(&self) -> TokenStream {
        let field_name = &self.field_name;
        let label = &self.label;
        let mut checks = Vec::new();

        if self.non_empty {
            checks.push(quote! {
                if self.#field_name.is_empty() {
                    errors.push(format!("{}: must not be empty", #label));
                }
            });
        }

        if let Some(min) = self.min_len {
            checks.push(quote! {
                if self.#field_name.len() < #min {
                    errors.push(format!("{}: length must be at least {}", #label, #min));
                }
            });
        }

        if let Some(max) = self.max_len {
            checks.push(quote! {
                if self.#field_name.len() > #max {
                    errors.push(format!("{}: length must be at most {}", #label, #max));
                }
            });
        }

        if let Some(min) = self.range_min {
            checks.push(quote! {
                if (self.#field_name as i64) < #min {
                    errors.push(format!("{}: must be at least {}", #label, #min));
                }
            });
        }

        if let Some(max) = self.range_max {
            checks.push(quote! {
                if (self.#field_name as i64) > #max {
                    errors.push(format!("{}: must be at most {}", #label, #max));
                }
            });
        }

        if !self.one_of.is_empty() {
            let choices = &self.one_of;
            checks.push(quote! {
                {
                    let value: &str = ::std::convert::AsRef::<str>::as_ref(&self.#field_name);
                    let choices: &[&str] = &[#(#choices),*];
                    if !choices.contains(&value) {
                        errors.push(format!(
                            "{}: must be one of {:?}, got {:?}",
                            #label, choices, value
                        ));
                    }
                }
            });
        }

        quote! { #(#checks)* }
    }
}

/// Read `#[validate(section = "...")]` from the container attributes.
fn parse_section(input: &DeriveInput) -> Result<Option<String>> {
    let mut section = None;
    for attr in &input.attrs {
        if !attr.path().is_ident("validate") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("section") {
                let lit: LitStr = meta.value()?.parse()?;
                section = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("expected `section = \"...\"`"))
            }
        })?;
    }
    Ok(section)
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Validate only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Validate can only be derived for structs",
            ));
        }
    };

    let section = parse_section(&input)?;

    let mut all_checks = Vec::new();
    for field in fields {
        if let Some(rules) = FieldRules::parse(field, section.as_deref())? {
            all_checks.push(rules.generate_checks());
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            /// Validate this struct according to its field-level constraints.
            ///
            /// Returns `Ok(())` if all constraints pass, or `Err(Vec<String>)`
            /// with one human-readable message per violated constraint.
            pub fn validate(&self) -> ::std::result::Result<(), ::std::vec::Vec<::std::string::String>> {
                let mut errors = ::std::vec::Vec::new();
                #(#all_checks)*
                if errors.is_empty() {
                    ::std::result::Result::Ok(())
                } else {
                    ::std::result::Result::Err(errors)
                }
            }
        }
    })
}
