//! Helpers for content generators that inspect the query string.
//!
//! Parameters are separated by `&`; each is `key=value` or a bare `key`.
//! Keys are matched with the same wildcard rules as resource patterns.

use crate::error::{HttpServerError, Result};
use crate::resource::wildcard;

/// Number of parameters in `query`: one, plus one per `&`.
///
/// # Example
///
/// ```
/// # use kiln::http::query::parameter_count;
/// assert_eq!(parameter_count("a=1&b=2&flag"), 3);
/// ```
pub fn parameter_count(query: &str) -> usize {
    1 + query.bytes().filter(|&b| b == b'&').count()
}

/// Value of the first parameter whose key matches `key_pattern`.
///
/// Returns `Ok(None)` for a bare key without `=`, and `NotFound` when no key
/// matches.
pub fn parameter_value<'q>(query: &'q str, key_pattern: &str) -> Result<Option<&'q str>> {
    query
        .split('&')
        .find_map(|param| {
            let (key, value) = match param.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (param, None),
            };
            wildcard::matches(key_pattern.as_bytes(), key.as_bytes()).then_some(value)
        })
        .ok_or(HttpServerError::NotFound)
}

/// True when a key matching `key_pattern` carries exactly `value`.
pub fn parameter_matches(query: &str, key_pattern: &str, value: &str) -> bool {
    matches!(parameter_value(query, key_pattern), Ok(Some(found)) if found == value)
}
