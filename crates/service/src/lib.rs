//! Service layer: a file-per-record JSON store and the `users` resource
//! built on it.
//! - Storage knows nothing about users; users know nothing about HTTP.
//! - Reuses record shapes and field rules from the `models` crate.
//! - Provides clear error types and documented interfaces.

pub mod runtime;
pub mod storage;
pub mod users;
#[cfg(test)]
pub mod test_support;
