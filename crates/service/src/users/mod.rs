//! Users resource: validation, hashing and persistence of phone-keyed
//! user records on top of a [`RecordStore`](crate::storage::RecordStore).

pub mod domain;
pub mod errors;
pub mod handler;
pub mod hasher;
pub mod service;

pub use domain::{CreateUserInput, Deleted, UpdateUserInput, UserRequest};
pub use errors::UserError;
pub use handler::handle;
pub use hasher::{hasher_from_config, Argon2Hasher, CredentialHasher, HmacSha256Hasher};
pub use service::UserService;
