//! Request handlers of the builder API.

pub mod build;
pub mod permit;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use builder_types::APIError;
use serde_json::Value;

/// Unwraps a JSON body, reporting malformed input as `INVALID_REQUEST`.
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, APIError> {
	body.map(|Json(value)| value)
		.map_err(|rejection| APIError::invalid_request(rejection.body_text()))
}
