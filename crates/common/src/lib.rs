//! Shared building blocks for the workspace: health payload, logging setup
//! and data-directory bootstrap.

pub mod types;
pub mod utils;
pub mod env;
