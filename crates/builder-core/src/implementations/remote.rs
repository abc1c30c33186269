//! Builders backed by the external transaction-construction service.
//!
//! The construction backend exposes one route per chain category. Every call
//! is a JSON `POST` of `{ quote, params, rpcUrl? }`; a 2xx answer carries the
//! category payload, anything else carries an error message that is surfaced
//! to the client unchanged.

use crate::builders::{
	BuildError, EvmTransactionBuilder, SuiTransactionBuilder, SvmTransactionBuilder,
};
use async_trait::async_trait;
use builder_types::{
	EvmBuildParams, EvmTransactionResult, Quote, SuiBuildParams, SuiTransactionResult,
	SvmBuildParams, SvmTransactionResult,
};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Request body sent to the backend.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildCall<'a, P: Serialize> {
	quote: &'a Quote,
	params: &'a P,
	#[serde(skip_serializing_if = "Option::is_none")]
	rpc_url: Option<&'a str>,
}

/// HTTP client of the construction backend.
#[derive(Debug, Clone)]
pub struct RemoteBuilderClient {
	client: reqwest::Client,
	base_url: String,
}

impl RemoteBuilderClient {
	/// Creates a client whose every call is bounded by `timeout`.
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BuildError> {
		let client = reqwest::Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| BuildError::Transport(e.to_string()))?;

		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	/// Posts a build call to `route` and returns the decoded payload.
	async fn call<P: Serialize + Sync>(
		&self,
		route: &str,
		quote: &Quote,
		params: &P,
		rpc_url: Option<&str>,
	) -> Result<Value, BuildError> {
		let url = format!("{}/{}", self.base_url, route);
		debug!(%url, quote_type = quote.quote_type(), "Calling builder backend");

		let response = self
			.client
			.post(&url)
			.json(&BuildCall {
				quote,
				params,
				rpc_url,
			})
			.send()
			.await
			.map_err(|e| BuildError::Transport(e.to_string()))?;

		let status = response.status();
		let body = response
			.bytes()
			.await
			.map_err(|e| BuildError::Transport(e.to_string()))?;

		if !status.is_success() {
			return Err(BuildError::Backend(backend_message(status, &body)));
		}

		serde_json::from_slice(&body).map_err(|e| BuildError::InvalidResponse(e.to_string()))
	}
}

/// Extracts the backend's error message, falling back to the raw body.
fn backend_message(status: reqwest::StatusCode, body: &[u8]) -> String {
	let parsed = serde_json::from_slice::<Value>(body).ok();
	let message = parsed.as_ref().and_then(|value| {
		value
			.get("error")
			.or_else(|| value.get("message"))
			.and_then(Value::as_str)
	});

	match message {
		Some(message) => message.to_string(),
		None => {
			let text = String::from_utf8_lossy(body);
			let text = text.trim();
			if text.is_empty() {
				format!("Builder backend returned {}", status)
			} else {
				text.to_string()
			}
		}
	}
}

/// EVM builder posting to `{url}/evm`.
pub struct RemoteEvmBuilder {
	client: RemoteBuilderClient,
}

impl RemoteEvmBuilder {
	pub fn new(client: RemoteBuilderClient) -> Self {
		Self { client }
	}
}

#[async_trait]
impl EvmTransactionBuilder for RemoteEvmBuilder {
	async fn build(
		&self,
		quote: &Quote,
		params: &EvmBuildParams,
	) -> Result<EvmTransactionResult, BuildError> {
		let payload = self.client.call("evm", quote, params, None).await?;
		EvmTransactionResult::from_value(payload)
			.map_err(|e| BuildError::InvalidResponse(e.to_string()))
	}
}

/// Builder of one Solana-family chain, posting to `{url}/svm`.
pub struct RemoteSvmBuilder {
	client: RemoteBuilderClient,
	chain: String,
	rpc_url: String,
}

impl RemoteSvmBuilder {
	pub fn new(client: RemoteBuilderClient, chain: impl Into<String>, rpc_url: impl Into<String>) -> Self {
		Self {
			client,
			chain: chain.into(),
			rpc_url: rpc_url.into(),
		}
	}

	pub fn chain(&self) -> &str {
		&self.chain
	}
}

#[async_trait]
impl SvmTransactionBuilder for RemoteSvmBuilder {
	async fn build(
		&self,
		quote: &Quote,
		params: &SvmBuildParams,
	) -> Result<SvmTransactionResult, BuildError> {
		let payload = self
			.client
			.call("svm", quote, params, Some(&self.rpc_url))
			.await?;
		serde_json::from_value(payload).map_err(|e| BuildError::InvalidResponse(e.to_string()))
	}
}

/// Sui builder posting to `{url}/sui`.
pub struct RemoteSuiBuilder {
	client: RemoteBuilderClient,
	rpc_url: Option<String>,
}

impl RemoteSuiBuilder {
	pub fn new(client: RemoteBuilderClient, rpc_url: Option<String>) -> Self {
		Self { client, rpc_url }
	}
}

#[async_trait]
impl SuiTransactionBuilder for RemoteSuiBuilder {
	async fn build(
		&self,
		quote: &Quote,
		params: &SuiBuildParams,
	) -> Result<SuiTransactionResult, BuildError> {
		let payload = self
			.client
			.call("sui", quote, params, self.rpc_url.as_deref())
			.await?;
		serde_json::from_value(payload).map_err(|e| BuildError::InvalidResponse(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{http::StatusCode, routing::post, Json, Router};
	use builder_types::BaseBuildParams;
	use serde_json::json;
	use tokio::net::TcpListener;

	/// Serves a fake backend on an ephemeral port, returning its base url.
	async fn serve(router: Router) -> String {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		tokio::spawn(async move {
			axum::serve(listener, router).await.unwrap();
		});
		format!("http://{}", addr)
	}

	fn base() -> BaseBuildParams {
		BaseBuildParams {
			destination_address: "dest".to_string(),
			referrer_addresses: None,
			custom_payload: None,
		}
	}

	fn quote() -> Quote {
		Quote::from_value(json!({"type": "SWIFT", "fromChain": "solana", "signature": "0x01"}))
			.unwrap()
	}

	#[tokio::test]
	async fn test_svm_call_carries_rpc_url_and_decodes_payload() {
		let router = Router::new().route(
			"/svm",
			post(|Json(body): Json<Value>| async move {
				Json(json!({
					"transaction": body["rpcUrl"],
					"signers": [body["params"]["swapperAddress"]],
				}))
			}),
		);
		let url = serve(router).await;

		let client = RemoteBuilderClient::new(&format!("{}/", url), Duration::from_secs(5)).unwrap();
		assert_eq!(client.base_url(), url);
		let builder = RemoteSvmBuilder::new(client, "solana", "https://rpc.example");
		let params = SvmBuildParams {
			base: base(),
			swapper_address: "So1".to_string(),
			usdc_permit_signature: None,
		};

		let result = builder.build(&quote(), &params).await.unwrap();
		assert_eq!(result.transaction, "https://rpc.example");
		assert_eq!(result.signers, Some(vec!["So1".to_string()]));
		assert_eq!(builder.chain(), "solana");
	}

	#[tokio::test]
	async fn test_backend_error_message_is_kept() {
		let router = Router::new()
			.route(
				"/sui",
				post(|| async {
					(
						StatusCode::UNPROCESSABLE_ENTITY,
						Json(json!({"error": "Quote has expired"})),
					)
				}),
			)
			.route(
				"/evm",
				post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
			);
		let url = serve(router).await;
		let client = RemoteBuilderClient::new(&url, Duration::from_secs(5)).unwrap();

		let sui = RemoteSuiBuilder::new(client.clone(), None);
		let params = SuiBuildParams {
			base: base(),
			swapper_address: "0x1".to_string(),
			usdc_permit_signature: None,
		};
		assert_eq!(
			sui.build(&quote(), &params).await.unwrap_err(),
			BuildError::Backend("Quote has expired".to_string())
		);

		let evm = RemoteEvmBuilder::new(client);
		let params = EvmBuildParams {
			base: base(),
			swapper_address: "0x1".to_string(),
			signer_chain_id: 1,
			permit: None,
			usdc_permit_signature: None,
		};
		assert_eq!(
			evm.build(&quote(), &params).await.unwrap_err(),
			BuildError::Backend("upstream down".to_string())
		);
	}

	#[tokio::test]
	async fn test_gasless_payload_decodes_as_typed_data() {
		let router = Router::new().route(
			"/evm",
			post(|| async {
				Json(json!({
					"gasless": true,
					"typedData": {"domain": {}, "types": {}, "value": {}},
					"orderHash": "0xabc"
				}))
			}),
		);
		let url = serve(router).await;
		let evm = RemoteEvmBuilder::new(RemoteBuilderClient::new(&url, Duration::from_secs(5)).unwrap());
		let params = EvmBuildParams {
			base: base(),
			swapper_address: "0x1".to_string(),
			signer_chain_id: 1,
			permit: None,
			usdc_permit_signature: None,
		};

		let result = evm.build(&quote(), &params).await.unwrap();
		assert!(result.is_gasless());
	}

	#[tokio::test]
	async fn test_unreachable_backend_is_a_transport_error() {
		let client = RemoteBuilderClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
		let sui = RemoteSuiBuilder::new(client, None);
		let params = SuiBuildParams {
			base: base(),
			swapper_address: "0x1".to_string(),
			usdc_permit_signature: None,
		};

		assert!(matches!(
			sui.build(&quote(), &params).await,
			Err(BuildError::Transport(_))
		));
	}
}
