//! Transaction building endpoint.

use super::json_body;
use crate::server::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use builder_types::{APIError, BuildOutput, BuildTransactionResponse};
use serde_json::Value;

/// Handles POST /build requests.
///
/// Accepts `{ quote, params }` for a single transaction or
/// `{ quotes, params }` for a batch built concurrently.
pub async fn build_transaction(
	State(state): State<AppState>,
	body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BuildTransactionResponse>, APIError> {
	let body = json_body(body)?;

	match state.engine.build(body).await {
		Ok(output) => {
			let count = match &output {
				BuildOutput::Transaction(_) => 1,
				BuildOutput::Transactions(results) => results.len(),
			};
			tracing::info!(count, "Built transactions");
			Ok(Json(BuildTransactionResponse::new(output)))
		}
		Err(e) => {
			tracing::warn!(code = %e.code(), "Build request failed: {}", e);
			Err(e)
		}
	}
}
