//! URL resources: pattern matching, the registry, and request dispatch.
//!
//! Patterns use `?` and `*` wildcards and are tried in registration order.
//! The first pattern that matches the decoded request path, and whose MIME
//! type is acceptable to the request, serves it.

pub(crate) mod dispatch;
pub mod registry;
pub mod wildcard;
