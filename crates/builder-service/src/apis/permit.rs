//! Permit parameter endpoints.

use super::json_body;
use crate::server::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use builder_types::{APIError, PermitParamsResponse};
use serde_json::Value;

/// Handles POST /permit-params requests.
pub async fn permit_params(
	State(state): State<AppState>,
	body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PermitParamsResponse>, APIError> {
	let body = json_body(body)?;

	state
		.engine
		.permit_params(body)
		.await
		.map(|typed_data| Json(PermitParamsResponse::new(typed_data)))
		.inspect_err(|e| tracing::warn!(code = %e.code(), "Permit request failed: {}", e))
}

/// Handles POST /hypercore/permit-params requests.
///
/// Returns the permit authorizing the HyperCore bridge to pull the quoted
/// USDC deposit on Arbitrum.
pub async fn hypercore_permit_params(
	State(state): State<AppState>,
	body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PermitParamsResponse>, APIError> {
	let body = json_body(body)?;

	state
		.engine
		.hypercore_permit_params(body)
		.await
		.map(|typed_data| Json(PermitParamsResponse::new(typed_data)))
		.inspect_err(|e| tracing::warn!(code = %e.code(), "HyperCore permit request failed: {}", e))
}
