//! Record shapes and field rules for the `users` collection.

pub mod errors;
pub mod user;
