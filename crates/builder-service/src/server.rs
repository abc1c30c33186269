//! HTTP server for the builder API.
//!
//! Every route except `/health` and `/metrics` sits behind the admission
//! middleware, which authenticates the caller, applies the rate limit and
//! records request metrics with the final status of the response.

use crate::apis;
use axum::{
	error_handling::HandleErrorLayer,
	extract::{DefaultBodyLimit, Request, State},
	http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
	middleware::{self, Next},
	response::{IntoResponse, Json, Response},
	routing::{get, post},
	BoxError, Router,
};
use builder_admission::{AdmissionError, AdmissionGate, RateLimitStatus, API_KEY_HEADER};
use builder_config::ServerConfig;
use builder_core::BuilderEngine;
use builder_types::{APIError, HealthResponse};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower::{timeout::error::Elapsed, ServiceBuilder};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Validation, verification and build pipeline.
	pub engine: Arc<BuilderEngine>,
	/// Authentication, rate limiting and metrics.
	pub gate: AdmissionGate,
}

/// Builds the router with all routes and middleware.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
	let timeout = Duration::from_secs(server.timeout_seconds);

	Router::new()
		.route("/health", get(handle_health))
		.route("/metrics", get(handle_metrics))
		.route("/build", post(apis::build::build_transaction))
		.route("/permit-params", post(apis::permit::permit_params))
		.route(
			"/hypercore/permit-params",
			post(apis::permit::hypercore_permit_params),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CorsLayer::permissive())
				.layer(middleware::from_fn_with_state(state.clone(), admission))
				.layer(HandleErrorLayer::new(move |err: BoxError| async move {
					handle_timeout(err, timeout)
				}))
				.timeout(timeout)
				.layer(DefaultBodyLimit::max(server.max_request_size)),
		)
		.with_state(state)
}

/// Starts the HTTP server and serves until `shutdown` resolves.
pub async fn start_server(
	server: &ServerConfig,
	state: AppState,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = router(state, server);

	let bind_address = format!("{}:{}", server.host, server.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Builder API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await?;

	Ok(())
}

/// Admission middleware: auth, rate limit and request metrics.
async fn admission(State(state): State<AppState>, request: Request, next: Next) -> Response {
	let path = request.uri().path().to_string();
	if AdmissionGate::is_ungated(&path) {
		return next.run(request).await;
	}

	let started = Instant::now();
	let method = request.method().to_string();
	let api_key = request
		.headers()
		.get(API_KEY_HEADER)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string);

	let (identity, response) = match state.gate.admit(&path, api_key.as_deref()) {
		Ok(admitted) => {
			let mut response = next.run(request).await;
			if let Some(status) = admitted.rate_limit {
				set_rate_limit_headers(response.headers_mut(), &status);
			}
			(admitted.identity, response)
		}
		Err(e) => {
			let identity = AdmissionGate::reported_identity(api_key.as_deref()).to_string();
			let status = match &e {
				AdmissionError::RateLimited { status, .. } => Some(*status),
				_ => None,
			};
			let mut response = APIError::from(e).into_response();
			if let Some(status) = status {
				set_rate_limit_headers(response.headers_mut(), &status);
			}
			(identity, response)
		}
	};

	state.gate.record(
		&identity,
		&path,
		&method,
		response.status().as_u16(),
		started.elapsed(),
	);
	response
}

/// Converts a failure of the timeout layer into the error envelope.
fn handle_timeout(err: BoxError, timeout: Duration) -> APIError {
	if err.is::<Elapsed>() {
		tracing::warn!(timeout_secs = timeout.as_secs(), "Request timed out");
		APIError::build_failed(format!(
			"Request timed out after {} seconds",
			timeout.as_secs()
		))
	} else {
		tracing::error!("Unhandled middleware error: {}", err);
		APIError::InternalError
	}
}

fn set_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
	headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(status.limit));
	headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(status.remaining));
	// Unix seconds, rounded up.
	let reset_secs = (status.reset_at_ms + 999).div_euclid(1000);
	headers.insert(RATE_LIMIT_RESET, HeaderValue::from(reset_secs));
}

/// Handles GET /health requests.
async fn handle_health() -> Json<HealthResponse> {
	Json(HealthResponse {
		status: "ok".to_string(),
		timestamp: chrono::Utc::now().to_rfc3339(),
	})
}

/// Handles GET /metrics requests in Prometheus text format.
async fn handle_metrics(State(state): State<AppState>) -> impl IntoResponse {
	(
		[(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
		state.gate.metrics().render(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{keccak256, Address, U256};
	use alloy_signer::SignerSync;
	use alloy_signer_local::PrivateKeySigner;
	use async_trait::async_trait;
	use axum::body::{to_bytes, Body};
	use axum::http::{header::RETRY_AFTER, Method, Request as HttpRequest, StatusCode};
	use builder_admission::{ApiKeyAuth, RateLimitStore, RequestMetrics};
	use builder_core::{
		BuildError, BuilderConnections, Dispatcher, EvmTransactionBuilder, PermitError,
		PermitService, SuiTransactionBuilder, SvmTransactionBuilder, TokenReader,
	};
	use builder_signature::{canonical_bytes, QuoteVerifier};
	use builder_types::{
		EvmBuildParams, EvmCalldataResult, EvmTransaction, EvmTransactionResult, Quote,
		SuiBuildParams, SuiTransactionResult, SvmBuildParams, SvmTransactionResult,
	};
	use serde_json::{json, Value};
	use std::collections::HashMap;
	use tower::ServiceExt;

	struct StubBuilder;

	#[async_trait]
	impl EvmTransactionBuilder for StubBuilder {
		async fn build(
			&self,
			_quote: &Quote,
			params: &EvmBuildParams,
		) -> Result<EvmTransactionResult, BuildError> {
			Ok(EvmTransactionResult::Calldata(EvmCalldataResult {
				quote_type: String::new(),
				gasless: false,
				transaction: EvmTransaction {
					to: "0x337685fdaB40D39bd02028545a4FfA7D287cC3E2".to_string(),
					data: "0xabcd".to_string(),
					value: U256::from(10u64).pow(U256::from(30u64)),
					chain_id: Some(params.signer_chain_id),
				},
				forwarder_params: None,
			}))
		}
	}

	#[async_trait]
	impl SvmTransactionBuilder for StubBuilder {
		async fn build(
			&self,
			_quote: &Quote,
			_params: &SvmBuildParams,
		) -> Result<SvmTransactionResult, BuildError> {
			Err(BuildError::Backend("Blockhash not found".to_string()))
		}
	}

	#[async_trait]
	impl SuiTransactionBuilder for StubBuilder {
		async fn build(
			&self,
			_quote: &Quote,
			_params: &SuiBuildParams,
		) -> Result<SuiTransactionResult, BuildError> {
			// Outlives the server timeout.
			tokio::time::sleep(Duration::from_secs(600)).await;
			Ok(SuiTransactionResult {
				quote_type: String::new(),
				transaction: "c3Vp".to_string(),
			})
		}
	}

	struct StubTokens;

	#[async_trait]
	impl TokenReader for StubTokens {
		async fn name(&self, _: u64, _: Address) -> Result<String, PermitError> {
			Ok("USD Coin".to_string())
		}

		async fn version(&self, _: u64, _: Address) -> Result<String, PermitError> {
			Ok("2".to_string())
		}

		async fn nonces(&self, _: u64, _: Address, _: Address) -> Result<U256, PermitError> {
			Ok(U256::from(3u64))
		}
	}

	struct Harness {
		app: Router,
		gate: AdmissionGate,
		signer: PrivateKeySigner,
	}

	fn harness(auth_enabled: bool, max_requests: u32, exempt: &[&str]) -> Harness {
		let signer = PrivateKeySigner::random();
		let stub = Arc::new(StubBuilder);
		let mut svm: HashMap<String, Arc<dyn SvmTransactionBuilder>> = HashMap::new();
		svm.insert("solana".to_string(), stub.clone());
		let engine = BuilderEngine::new(
			QuoteVerifier::new(signer.address()),
			Dispatcher::new(BuilderConnections {
				evm: stub.clone(),
				svm,
				sui: stub,
			}),
			PermitService::new(Arc::new(StubTokens)),
		);
		let gate = AdmissionGate::new(
			ApiKeyAuth::new(auth_enabled, ["test-key-1".to_string()]),
			Arc::new(RateLimitStore::new(60_000, max_requests)),
			Arc::new(RequestMetrics::new()),
			exempt.iter().map(|path| path.to_string()),
		);
		let state = AppState {
			engine: Arc::new(engine),
			gate: gate.clone(),
		};

		Harness {
			app: router(state, &ServerConfig::default()),
			gate,
			signer,
		}
	}

	fn signed(signer: &PrivateKeySigner, raw: Value) -> Value {
		let Value::Object(mut fields) = raw else {
			panic!("quote must be an object");
		};
		let digest = keccak256(canonical_bytes(&fields));
		let signature = signer.sign_message_sync(digest.as_slice()).unwrap();
		fields.insert(
			"signature".to_string(),
			json!(format!("0x{}", hex::encode(signature.as_bytes()))),
		);
		Value::Object(fields)
	}

	fn post_json(path: &str, api_key: Option<&str>, body: &Value) -> Request {
		let mut builder = HttpRequest::builder()
			.method(Method::POST)
			.uri(path)
			.header(CONTENT_TYPE, "application/json");
		if let Some(key) = api_key {
			builder = builder.header(API_KEY_HEADER, key);
		}
		builder.body(Body::from(body.to_string())).unwrap()
	}

	async fn send(app: &Router, request: Request) -> (StatusCode, HeaderMap, Value) {
		let response = app.clone().oneshot(request).await.unwrap();
		let status = response.status();
		let headers = response.headers().clone();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
		(status, headers, body)
	}

	fn evm_build_body(signer: &PrivateKeySigner) -> Value {
		json!({
			"quote": signed(signer, json!({"type": "SWIFT", "fromChain": "base", "toChain": "solana"})),
			"params": {
				"destinationAddress": "7dm9am6Qx7cH64RB99Mzf7ZsLbEfmXM7ihXXCvMiT2X1",
				"swapperAddress": "0x1111111111111111111111111111111111111111",
				"signerChainId": 8453
			}
		})
	}

	#[tokio::test]
	async fn test_health_bypasses_admission() {
		let harness = harness(true, 1, &[]);
		let request = HttpRequest::builder().uri("/health").body(Body::empty()).unwrap();

		let (status, _, body) = send(&harness.app, request).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");
		assert!(body["timestamp"].is_string());
		assert_eq!(harness.gate.metrics().endpoint_request_count("/health"), 0);
	}

	#[tokio::test]
	async fn test_single_build_succeeds() {
		let harness = harness(true, 10, &[]);
		let body = evm_build_body(&harness.signer);

		let (status, headers, body) =
			send(&harness.app, post_json("/build", Some("test-key-1"), &body)).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["success"], true);
		assert_eq!(body["transaction"]["chainCategory"], "evm");
		assert_eq!(body["transaction"]["quoteType"], "SWIFT");
		assert_eq!(
			body["transaction"]["transaction"]["value"],
			"1000000000000000000000000000000"
		);
		assert_eq!(headers[RATE_LIMIT_LIMIT], "10");
		assert_eq!(headers[RATE_LIMIT_REMAINING], "9");
		assert_eq!(
			harness.gate.metrics().request_count("test-key-1", "/build", "POST", 200),
			1
		);
	}

	#[tokio::test]
	async fn test_missing_api_key_is_unauthorized_and_counted() {
		let harness = harness(true, 10, &[]);
		let body = evm_build_body(&harness.signer);

		let (status, _, body) = send(&harness.app, post_json("/build", None, &body)).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["success"], false);
		assert_eq!(body["code"], "UNAUTHORIZED");
		assert_eq!(
			body["error"],
			"API key required. Please provide X-API-Key header."
		);
		assert_eq!(
			harness.gate.metrics().request_count("anonymous", "/build", "POST", 401),
			1
		);

		let (status, _, body) =
			send(&harness.app, post_json("/build", Some("wrong"), &json!({}))).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["error"], "Invalid API key");
	}

	#[tokio::test]
	async fn test_rate_limit_rejects_after_max_requests() {
		let harness = harness(false, 2, &[]);
		let body = evm_build_body(&harness.signer);

		for _ in 0..2 {
			let (status, _, _) = send(&harness.app, post_json("/build", None, &body)).await;
			assert_eq!(status, StatusCode::OK);
		}
		let (status, headers, body) = send(&harness.app, post_json("/build", None, &body)).await;
		assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(body["code"], "RATE_LIMITED");
		assert!(headers.contains_key(RETRY_AFTER));
		assert_eq!(headers[RATE_LIMIT_REMAINING], "0");
		assert_eq!(
			harness.gate.metrics().rate_limited_count("anonymous", "/build"),
			1
		);
	}

	#[tokio::test]
	async fn test_exempt_path_is_never_throttled() {
		let harness = harness(true, 1, &["/permit-params"]);
		let body = json!({
			"quote": signed(&harness.signer, json!({
				"type": "SWIFT",
				"fromChain": "base",
				"effectiveAmountIn64": "2500000",
				"fromToken": {
					"contract": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
					"chainId": 8453,
					"supportsPermit": true
				}
			})),
			"walletAddress": "0x1111111111111111111111111111111111111111",
			"deadline": "1700000000"
		});

		for _ in 0..5 {
			let (status, headers, response) =
				send(&harness.app, post_json("/permit-params", Some("test-key-1"), &body)).await;
			assert_eq!(status, StatusCode::OK);
			assert!(!headers.contains_key(RATE_LIMIT_LIMIT));
			assert_eq!(response["permitParams"]["value"]["value"], "2500000");
			assert_eq!(response["permitParams"]["value"]["nonce"], "3");
			assert_eq!(response["permitParams"]["domain"]["chainId"], 8453);
		}
		assert_eq!(
			harness
				.gate
				.metrics()
				.request_count("test-key-1", "/permit-params", "POST", 200),
			5
		);

		let (status, _, _) = send(&harness.app, post_json("/permit-params", None, &body)).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
	}

	#[tokio::test]
	async fn test_malformed_json_is_invalid_request() {
		let harness = harness(false, 10, &[]);
		let request = HttpRequest::builder()
			.method(Method::POST)
			.uri("/build")
			.header(CONTENT_TYPE, "application/json")
			.body(Body::from("{\"quote\": "))
			.unwrap();

		let (status, _, body) = send(&harness.app, request).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["code"], "INVALID_REQUEST");
		assert_eq!(body["success"], false);
	}

	#[tokio::test]
	async fn test_validation_and_signature_errors() {
		let harness = harness(false, 10, &[]);

		let (status, _, body) = send(
			&harness.app,
			post_json("/build", None, &json!({"quotes": [], "params": {"destinationAddress": "d"}})),
		)
		.await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "quotes array cannot be empty");

		let single = evm_build_body(&PrivateKeySigner::random());
		let batch = json!({"quotes": [single["quote"].clone()], "params": single["params"].clone()});
		let (status, _, body) = send(&harness.app, post_json("/build", None, &batch)).await;
		assert_eq!(status, StatusCode::UNAUTHORIZED);
		assert_eq!(body["code"], "INVALID_SIGNATURE");
		assert_eq!(body["error"], "Invalid signature for quote(s) at index: 0");
	}

	#[tokio::test]
	async fn test_builder_failure_is_build_failed() {
		let harness = harness(false, 10, &[]);
		let body = json!({
			"quotes": [signed(&harness.signer, json!({"type": "SWIFT", "fromChain": "solana"}))],
			"params": {"destinationAddress": "0xdest", "swapperAddress": "So1"}
		});

		let (status, _, body) = send(&harness.app, post_json("/build", None, &body)).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["code"], "BUILD_FAILED");
		assert_eq!(
			body["error"],
			"Build failed for quote(s) at index: 0: Blockhash not found"
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_timeout_is_reported_as_error_envelope() {
		let harness = harness(false, 10, &[]);
		let body = json!({
			"quote": signed(&harness.signer, json!({"type": "SWIFT", "fromChain": "sui"})),
			"params": {"destinationAddress": "0xdest", "swapperAddress": "0xswapper"}
		});

		let (status, _, body) = send(&harness.app, post_json("/build", None, &body)).await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body["success"], false);
		assert_eq!(body["code"], "BUILD_FAILED");
		assert_eq!(body["error"], "Request timed out after 30 seconds");
		assert_eq!(
			harness.gate.metrics().request_count("anonymous", "/build", "POST", 500),
			1
		);
	}

	#[tokio::test]
	async fn test_metrics_exposition() {
		let harness = harness(false, 10, &[]);
		let body = evm_build_body(&harness.signer);
		send(&harness.app, post_json("/build", None, &body)).await;

		let response = harness
			.app
			.clone()
			.oneshot(HttpRequest::builder().uri("/metrics").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert!(response.headers()[CONTENT_TYPE]
			.to_str()
			.unwrap()
			.starts_with("text/plain"));
		let text = String::from_utf8(
			to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec(),
		)
		.unwrap();
		assert!(text.contains(
			"api_requests_total{api_key=\"anonymous\",endpoint=\"/build\",method=\"POST\",status=\"200\"} 1"
		));
		assert!(!text.contains("endpoint=\"/metrics\""));
	}
}
