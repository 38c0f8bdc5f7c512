use std::sync::Arc;

use models::user::{self, PublicUser, UserRecord, COLLECTION};
use tracing::{debug, error, info, instrument};

use crate::storage::{read_json, RecordStore, StoreError};

use super::domain::{CreateUserInput, Deleted, UpdateUserInput};
use super::errors::UserError;
use super::hasher::CredentialHasher;

/// Users resource over a record store, independent of web framework.
///
/// Every operation validates first, then talks to the store; nothing is kept
/// between calls.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use service::storage::record_store::mock::MemoryRecordStore;
/// use service::users::{CreateUserInput, HmacSha256Hasher, UserService};
///
/// let svc = UserService::new(Arc::new(MemoryRecordStore::default()), Arc::new(HmacSha256Hasher::new("secret")));
/// let input = CreateUserInput {
///     first_name: Some("John".into()),
///     last_name: Some("Doe".into()),
///     phone: Some("5551234".into()),
///     password: Some("abc123".into()),
///     tos_agreement: Some(true),
/// };
/// let user = tokio_test::block_on(svc.create(input)).unwrap();
/// assert_eq!(user.phone, "5551234");
/// ```
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RecordStore>,
    hasher: Arc<dyn CredentialHasher>,
}

impl UserService {
    pub fn new(store: Arc<dyn RecordStore>, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { store, hasher }
    }

    /// Register a new user keyed by phone number.
    #[instrument(skip(self, input), fields(phone))]
    pub async fn create(&self, input: CreateUserInput) -> Result<PublicUser, UserError> {
        let input = input.trimmed();
        let (Some(first_name), Some(last_name), Some(phone), Some(password), Some(true)) =
            (input.first_name, input.last_name, input.phone, input.password, input.tos_agreement)
        else {
            return Err(UserError::invalid_fields());
        };
        tracing::Span::current().record("phone", phone.as_str());
        if first_name.is_empty() || last_name.is_empty() || password.is_empty() || !user::validate_phone_number(&phone) {
            return Err(UserError::invalid_fields());
        }

        match self.store.exists(COLLECTION, &phone).await {
            Ok(true) => return Err(already_exists(&phone)),
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, code = e.code(), "duplicate check failed");
                return Err(UserError::Internal(format!("Failed to create user {first_name} {last_name}.")));
            }
        }

        let record = UserRecord {
            hashed_password: self.hasher.hash(&password)?,
            first_name,
            last_name,
            phone,
            tos_agreement: true,
        };
        let document = record.to_document().map_err(|e| UserError::Internal(e.to_string()))?;
        match self.store.create(COLLECTION, &record.phone, &document).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => return Err(already_exists(&record.phone)),
            Err(e) => {
                error!(error = %e, code = e.code(), "failed to store new user");
                return Err(UserError::Internal(format!(
                    "Failed to create user {} {}.",
                    record.first_name, record.last_name
                )));
            }
        }
        info!(algorithm = self.hasher.algorithm(), "user_created");
        Ok(record.into())
    }

    /// Look up a user by phone number.
    #[instrument(skip(self))]
    pub async fn get(&self, phone: &str) -> Result<PublicUser, UserError> {
        let phone = valid_phone(phone)?;
        let record = self.load(phone).await?;
        Ok(record.into())
    }

    /// Change names and/or password of an existing user.
    #[instrument(skip(self, input), fields(phone))]
    pub async fn update(&self, input: UpdateUserInput) -> Result<PublicUser, UserError> {
        let input = input.trimmed();
        let phone = input.phone.as_deref().unwrap_or_default();
        tracing::Span::current().record("phone", phone);
        let phone = valid_phone(phone)?;
        let mut record = self.load(phone).await?;

        let names_ok = [&input.first_name, &input.last_name]
            .into_iter()
            .flatten()
            .all(|name| user::validate_name(name));
        let password_ok = input.password.as_deref().map_or(true, user::validate_password);
        if !names_ok || !password_ok {
            return Err(UserError::invalid_fields());
        }

        if let Some(first_name) = input.first_name {
            record.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            record.last_name = last_name;
        }
        if let Some(password) = input.password {
            record.hashed_password = self.hasher.hash(&password)?;
        }

        let document = record.to_document().map_err(|e| UserError::Internal(e.to_string()))?;
        match self.store.update(COLLECTION, phone, &document).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Err(not_found(phone)),
            Err(e) => {
                error!(error = %e, code = e.code(), "failed to update user");
                return Err(UserError::Internal(format!("Failed to update user with phone number {phone}!")));
            }
        }
        info!("user_updated");
        Ok(record.into())
    }

    /// Remove a user. The record must exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, phone: &str) -> Result<Deleted, UserError> {
        let phone = valid_phone(phone)?;
        self.load(phone).await?;
        match self.store.delete(COLLECTION, phone).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => return Err(not_found(phone)),
            Err(e) => {
                error!(error = %e, code = e.code(), "failed to delete user");
                return Err(UserError::Internal(format!("Failed to delete user with phone number {phone}!")));
            }
        }
        info!("user_deleted");
        Ok(Deleted { message: format!("Successfully deleted user with phone number {phone}.") })
    }

    async fn load(&self, phone: &str) -> Result<UserRecord, UserError> {
        match read_json::<UserRecord>(self.store.as_ref(), COLLECTION, phone).await {
            Ok(record) => Ok(record),
            Err(e) if e.is_not_found() => {
                debug!("user not found");
                Err(not_found(phone))
            }
            Err(e) => {
                error!(error = %e, code = e.code(), "failed to load user");
                Err(UserError::Internal(format!("Failed to read user with phone number {phone}!")))
            }
        }
    }
}

/// Query values are checked as received. Only payload fields get trimmed.
fn valid_phone(phone: &str) -> Result<&str, UserError> {
    if user::validate_phone_number(phone) {
        Ok(phone)
    } else {
        Err(UserError::InvalidInput(format!("The phone number {phone:?} is not valid!")))
    }
}

fn not_found(phone: &str) -> UserError {
    UserError::NotFound(format!("Could not find user with phone number {phone}!"))
}

fn already_exists(phone: &str) -> UserError {
    UserError::Conflict(format!("User with phone # {phone} already exists!"))
}
