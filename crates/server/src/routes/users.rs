use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::Method,
    Json,
};
use serde_json::Value;
use service::users::{self, UserRequest};

use crate::errors::ApiError;
use crate::routes::ServerState;

/// `/users` for every HTTP method.
///
/// The body is read as JSON; an empty or unparsable body becomes an empty
/// payload and the users handler decides whether that is acceptable.
pub async fn users_resource(
    State(state): State<ServerState>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let payload = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    let request = UserRequest { method: method.as_str().to_string(), query, payload };
    let body = users::handle(&state.users, request).await?;
    Ok(Json(body))
}
