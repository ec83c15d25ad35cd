//! Phone number validation and formatting against per-country rules.
//!
//! Raw input is reduced to its ASCII digits first, so every function here accepts
//! whatever a user typed, including its own formatted output.

mod countries;

pub use countries::{COUNTRIES, Country, find as find_country};

use crate::error::ValidationError;

fn digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn validate(raw: &str, country: &Country) -> bool {
    let len = digits(raw).len();
    len > 0 && country.valid_lengths.contains(&len)
}

/// Formats a partial or complete national number for display.
///
/// Digits beyond the longest valid length are dropped. The country's group spans are
/// applied in order and whatever is left forms the last group.
pub fn format(raw: &str, country: &Country) -> String {
    let digits = digits(raw);
    let mut rest = &digits[..digits.len().min(country.max_length())];

    let mut out = String::with_capacity(rest.len() + 4);
    for &span in countries::grouping(country) {
        if rest.is_empty() {
            break;
        }
        let (group, tail) = rest.split_at(span.min(rest.len()));
        push_group(&mut out, group);
        rest = tail;
    }
    if !rest.is_empty() {
        push_group(&mut out, rest);
    }

    out
}

fn push_group(out: &mut String, group: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(group);
}

/// Dial prefix followed by the bare digits. This is the only form that gets stored.
pub fn to_canonical(raw: &str, country: &Country) -> String {
    format!("{}{}", country.dial_prefix, digits(raw))
}

/// Validates and canonicalizes in one step.
pub fn normalize(raw: &str, country: &Country) -> Result<String, ValidationError> {
    if digits(raw).is_empty() {
        return Err(ValidationError::EmptyPhone);
    }
    if !validate(raw, country) {
        let expected = country
            .valid_lengths
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        return Err(ValidationError::PhoneLength { country: country.name, expected });
    }
    Ok(to_canonical(raw, country))
}
