//! Method dispatch for the `users` resource.
//!
//! Turns a transport-neutral [`UserRequest`] into one call on [`UserService`]
//! and resolves exactly once with either a JSON body (status 200) or a
//! [`UserError`] carrying the status.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use super::domain::{CreateUserInput, UpdateUserInput, UserRequest};
use super::errors::UserError;
use super::service::UserService;

pub const SUPPORTED_METHODS: [&str; 4] = ["POST", "GET", "PUT", "DELETE"];

pub async fn handle(users: &UserService, request: UserRequest) -> Result<Value, UserError> {
    let method = request.method.to_ascii_uppercase();
    debug!(%method, "dispatching users request");
    match method.as_str() {
        "POST" => {
            let input: CreateUserInput = parse_payload(request.payload)?;
            to_body(&users.create(input).await?)
        }
        "GET" => to_body(&users.get(query_phone(&request)).await?),
        "PUT" => {
            let input: UpdateUserInput = parse_payload(request.payload)?;
            to_body(&users.update(input).await?)
        }
        "DELETE" => to_body(&users.delete(query_phone(&request)).await?),
        other => Err(UserError::MethodNotAllowed(format!("HTTP method {other} is not supported for /users!"))),
    }
}

fn query_phone(request: &UserRequest) -> &str {
    request.query.get("phone").map(String::as_str).unwrap_or_default()
}

/// A missing payload counts as an empty object; anything that is not an
/// object, or has fields of the wrong type, is invalid input.
fn parse_payload<T: DeserializeOwned + Default>(payload: Value) -> Result<T, UserError> {
    match payload {
        Value::Null => Ok(T::default()),
        Value::Object(_) => serde_json::from_value(payload).map_err(|e| {
            debug!(error = %e, "payload rejected");
            UserError::invalid_fields()
        }),
        _ => Err(UserError::invalid_fields()),
    }
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, UserError> {
    serde_json::to_value(value).map_err(|e| UserError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::storage::record_store::mock::MemoryRecordStore;
    use crate::storage::{read_json, Document, FileRecordStore};
    use crate::test_support::TempDataDir;
    use crate::users::hasher::HmacSha256Hasher;

    fn request(method: &str, query: &[(&str, &str)], payload: Value) -> UserRequest {
        UserRequest {
            method: method.to_string(),
            query: query.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>(),
            payload,
        }
    }

    fn new_user() -> Value {
        json!({"firstName": "John", "lastName": "Doe", "phone": "5551234", "password": "abc123", "tosAgreement": true})
    }

    fn status(result: &Result<Value, UserError>) -> u16 {
        match result {
            Ok(_) => 200,
            Err(e) => e.status(),
        }
    }

    #[tokio::test]
    async fn users_resource_lifecycle() -> Result<(), anyhow::Error> {
        let dir = TempDataDir::new("handler_lifecycle");
        let store = Arc::new(FileRecordStore::new(dir.path()));
        let users = UserService::new(store.clone(), Arc::new(HmacSha256Hasher::new("test-secret")));

        let created = handle(&users, request("POST", &[], new_user())).await?;
        assert!(created.get("hashedPassword").is_none());
        assert!(created.get("password").is_none());
        assert_eq!(created["phone"], "5551234");

        let dup = handle(&users, request("POST", &[], new_user())).await;
        assert_eq!(status(&dup), 400);

        let got = handle(&users, request("GET", &[("phone", "5551234")], Value::Null)).await?;
        assert_eq!(got, json!({"firstName": "John", "lastName": "Doe", "phone": "5551234", "tosAgreement": true}));
        let stored_before: Document = read_json(&*store, "users", "5551234").await?;

        let put = handle(&users, request("PUT", &[], json!({"phone": "5551234", "lastName": "NewName"}))).await?;
        assert_eq!(put["lastName"], "NewName");
        assert_eq!(put["firstName"], "John");
        assert!(put.get("hashedPassword").is_none());
        let stored_after: Document = read_json(&*store, "users", "5551234").await?;
        assert_eq!(stored_after["hashedPassword"], stored_before["hashedPassword"]);
        assert_eq!(stored_after["firstName"], "John");

        let deleted = handle(&users, request("DELETE", &[("phone", "5551234")], Value::Null)).await?;
        assert_eq!(deleted, json!({"message": "Successfully deleted user with phone number 5551234."}));

        let gone = handle(&users, request("GET", &[("phone", "5551234")], Value::Null)).await;
        assert_eq!(status(&gone), 404);
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_methods_are_405_for_any_input() -> Result<(), anyhow::Error> {
        let users = UserService::new(Arc::new(MemoryRecordStore::default()), Arc::new(HmacSha256Hasher::new("s")));
        for method in ["PATCH", "HEAD", "OPTIONS", "TRACE", ""] {
            for payload in [Value::Null, new_user(), json!("junk")] {
                let res = handle(&users, request(method, &[("phone", "bad")], payload)).await;
                assert_eq!(status(&res), 405, "{method}");
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn methods_are_case_insensitive() -> Result<(), anyhow::Error> {
        let users = UserService::new(Arc::new(MemoryRecordStore::default()), Arc::new(HmacSha256Hasher::new("s")));
        handle(&users, request("post", &[], new_user())).await?;
        handle(&users, request("get", &[("phone", "5551234")], Value::Null)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn malformed_payloads_are_400() -> Result<(), anyhow::Error> {
        let users = UserService::new(Arc::new(MemoryRecordStore::default()), Arc::new(HmacSha256Hasher::new("s")));
        let cases = [
            ("POST", Value::Null),
            ("POST", json!([1, 2])),
            ("POST", json!({"firstName": "John", "lastName": "Doe", "phone": "5551234", "password": "abc123", "tosAgreement": "yes"})),
            ("POST", json!({"firstName": 7, "lastName": "Doe", "phone": "5551234", "password": "abc123", "tosAgreement": true})),
            ("PUT", Value::Null),
            ("PUT", json!({"phone": 5551234})),
        ];
        for (method, payload) in cases {
            let res = handle(&users, request(method, &[], payload.clone())).await;
            assert_eq!(status(&res), 400, "{method} {payload}");
        }
        let missing_query = handle(&users, request("GET", &[], Value::Null)).await;
        assert_eq!(status(&missing_query), 400);
        Ok(())
    }

    #[tokio::test]
    async fn store_failures_are_500() -> Result<(), anyhow::Error> {
        let store = Arc::new(MemoryRecordStore::default());
        let users = UserService::new(store.clone(), Arc::new(HmacSha256Hasher::new("s")));
        handle(&users, request("POST", &[], new_user())).await?;

        store.fail_writes(true);
        let put = handle(&users, request("PUT", &[], json!({"phone": "5551234", "firstName": "Jane"}))).await;
        assert_eq!(status(&put), 500);
        let del = handle(&users, request("DELETE", &[("phone", "5551234")], Value::Null)).await;
        assert_eq!(status(&del), 500);
        let post = handle(&users, request("POST", &[], json!({"firstName": "A", "lastName": "B", "phone": "5559999", "password": "x", "tosAgreement": true}))).await;
        assert_eq!(status(&post), 500);
        if let Err(e) = post {
            assert!(!e.to_string().contains("writes disabled"));
        }
        store.fail_writes(false);

        let got = handle(&users, request("GET", &[("phone", "5551234")], Value::Null)).await?;
        assert_eq!(got["firstName"], "John");
        Ok(())
    }
}
