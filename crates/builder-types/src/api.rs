//! API types for the transaction builder HTTP API.
//!
//! This module defines the response envelopes shared by every endpoint and
//! the error taxonomy clients program against. Every failure is reported as
//! `{ "success": false, "error": <message>, "code": <ErrorCode> }` with a
//! status fixed by its code.

use crate::permit::PermitTypedData;
use crate::transaction::BuildResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	/// Structural or parameter validation failure (400).
	InvalidRequest,
	/// Missing or unknown API key (401).
	Unauthorized,
	/// Request budget of the caller exhausted (429).
	RateLimited,
	/// A quote signature did not recover to the expected signer (401).
	InvalidSignature,
	/// The transaction builder failed (500).
	BuildFailed,
	/// Unexpected failure (500).
	InternalError,
}

impl ErrorCode {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorCode::InvalidRequest => "INVALID_REQUEST",
			ErrorCode::Unauthorized => "UNAUTHORIZED",
			ErrorCode::RateLimited => "RATE_LIMITED",
			ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
			ErrorCode::BuildFailed => "BUILD_FAILED",
			ErrorCode::InternalError => "INTERNAL_ERROR",
		}
	}

	/// HTTP status code paired with this error code.
	pub fn status_code(&self) -> u16 {
		match self {
			ErrorCode::InvalidRequest => 400,
			ErrorCode::Unauthorized | ErrorCode::InvalidSignature => 401,
			ErrorCode::RateLimited => 429,
			ErrorCode::BuildFailed | ErrorCode::InternalError => 500,
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// API error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Always `false`.
	pub success: bool,
	/// Human-readable description
	pub error: String,
	/// Error type/code
	pub code: ErrorCode,
}

/// Message reported for every unexpected failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum APIError {
	#[error("{message}")]
	InvalidRequest { message: String },
	#[error("{message}")]
	Unauthorized { message: String },
	/// Carries the number of seconds until the caller's window resets.
	#[error("{message}")]
	RateLimited { message: String, retry_after: u64 },
	#[error("{message}")]
	InvalidSignature { message: String },
	/// The builder's own message is passed through to the client.
	#[error("{message}")]
	BuildFailed { message: String },
	/// The underlying cause is logged, never returned.
	#[error("Internal server error")]
	InternalError,
}

impl APIError {
	pub fn invalid_request(message: impl Into<String>) -> Self {
		APIError::InvalidRequest {
			message: message.into(),
		}
	}

	pub fn unauthorized(message: impl Into<String>) -> Self {
		APIError::Unauthorized {
			message: message.into(),
		}
	}

	pub fn invalid_signature(message: impl Into<String>) -> Self {
		APIError::InvalidSignature {
			message: message.into(),
		}
	}

	pub fn build_failed(message: impl Into<String>) -> Self {
		APIError::BuildFailed {
			message: message.into(),
		}
	}

	pub fn code(&self) -> ErrorCode {
		match self {
			APIError::InvalidRequest { .. } => ErrorCode::InvalidRequest,
			APIError::Unauthorized { .. } => ErrorCode::Unauthorized,
			APIError::RateLimited { .. } => ErrorCode::RateLimited,
			APIError::InvalidSignature { .. } => ErrorCode::InvalidSignature,
			APIError::BuildFailed { .. } => ErrorCode::BuildFailed,
			APIError::InternalError => ErrorCode::InternalError,
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		self.code().status_code()
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		ErrorResponse {
			success: false,
			error: self.to_string(),
			code: self.code(),
		}
	}
}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{
			http::{header::RETRY_AFTER, HeaderValue, StatusCode},
			response::Json,
		};

		let status =
			StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		let mut response = (status, Json(self.to_error_response())).into_response();
		if let APIError::RateLimited { retry_after, .. } = &self {
			response
				.headers_mut()
				.insert(RETRY_AFTER, HeaderValue::from(*retry_after));
		}
		response
	}
}

/// Built transaction(s), keyed by request mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildOutput {
	/// Single-quote request.
	Transaction(BuildResult),
	/// Batch request; results follow the order of the submitted quotes.
	Transactions(Vec<BuildResult>),
}

/// Success envelope of `POST /build`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildTransactionResponse {
	pub success: bool,
	#[serde(flatten)]
	pub output: BuildOutput,
}

impl BuildTransactionResponse {
	pub fn new(output: BuildOutput) -> Self {
		Self {
			success: true,
			output,
		}
	}
}

/// Success envelope of the permit parameter endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitParamsResponse {
	pub success: bool,
	pub permit_params: PermitTypedData,
}

impl PermitParamsResponse {
	pub fn new(permit_params: PermitTypedData) -> Self {
		Self {
			success: true,
			permit_params,
		}
	}
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: String,
	/// RFC 3339 time of the check.
	pub timestamp: String,
}
