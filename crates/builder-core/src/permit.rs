//! EIP-2612 permit parameters.
//!
//! Clients that pay with a permit-capable token sign an EIP-712 `Permit`
//! message instead of sending an approval transaction. This module assembles
//! that message from the quote and from the token's on-chain state (name,
//! version and the owner's current nonce).

use alloy_primitives::{address, Address, U256};
use async_trait::async_trait;
use builder_types::utils::{parse_u256, parse_u64};
use builder_types::{APIError, PermitDomain, PermitTypedData, PermitValue, Quote};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Forwarder contract that pulls permitted tokens into a swap.
pub const FORWARDER_CONTRACT: Address = address!("337685fdaB40D39bd02028545a4FfA7D287cC3E2");

/// Native USDC on Arbitrum.
pub const ARBITRUM_USDC: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");

/// Bridge crediting USDC deposits to HyperCore.
pub const HYPERCORE_BRIDGE: Address = address!("2df1c51e09aecf9cacb7bc98cb1742757f163df7");

pub const ARBITRUM_CHAIN_ID: u64 = 42161;

/// Chain name of HyperCore destinations.
pub const HYPERCORE_CHAIN: &str = "hypercore";

/// Lifetime of a permit when the client does not choose a deadline.
pub const DEFAULT_PERMIT_TTL_SECS: i64 = 3600;

/// Version assumed for tokens without a `version()` getter.
const DEFAULT_DOMAIN_VERSION: &str = "1";

/// Errors raised while deriving permit parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermitError {
	/// The quote does not qualify for a permit.
	#[error("{0}")]
	Precondition(String),
	#[error("Token does not support permit (missing name/version)")]
	MissingDomain,
	#[error("No RPC endpoint configured for chain {0}")]
	NoProvider(u64),
	#[error("RPC call failed: {0}")]
	Rpc(String),
}

impl PermitError {
	fn precondition(message: &str) -> Self {
		PermitError::Precondition(message.to_string())
	}
}

impl From<PermitError> for APIError {
	fn from(err: PermitError) -> Self {
		match err {
			PermitError::Precondition(_) | PermitError::MissingDomain => {
				APIError::invalid_request(err.to_string())
			}
			PermitError::NoProvider(_) | PermitError::Rpc(_) => APIError::build_failed(err.to_string()),
		}
	}
}

/// Read access to ERC-20 token state.
#[async_trait]
pub trait TokenReader: Send + Sync {
	async fn name(&self, chain_id: u64, token: Address) -> Result<String, PermitError>;

	/// EIP-712 domain version; absent on many tokens.
	async fn version(&self, chain_id: u64, token: Address) -> Result<String, PermitError>;

	/// Next permit nonce of `owner`.
	async fn nonces(&self, chain_id: u64, token: Address, owner: Address) -> Result<U256, PermitError>;
}

/// Derives permit typed data for quotes.
#[derive(Clone)]
pub struct PermitService {
	reader: Arc<dyn TokenReader>,
}

impl PermitService {
	pub fn new(reader: Arc<dyn TokenReader>) -> Self {
		Self { reader }
	}

	/// Permit letting the forwarder pull the quote's input amount from `owner`.
	///
	/// `deadline` defaults to one hour from now.
	pub async fn permit_params(
		&self,
		quote: &Quote,
		owner: Address,
		deadline: Option<String>,
	) -> Result<PermitTypedData, PermitError> {
		let token = quote.get("fromToken");
		let supports_permit = token
			.and_then(|token| token.get("supportsPermit"))
			.and_then(Value::as_bool)
			.unwrap_or(false);
		if !supports_permit {
			return Err(PermitError::precondition("Token does not support permit"));
		}
		let chain_id = token
			.and_then(|token| token.get("chainId"))
			.and_then(parse_u64)
			.ok_or_else(|| PermitError::precondition("Token chainId is not available"))?;
		let contract = token
			.and_then(|token| token.get("contract"))
			.and_then(Value::as_str)
			.and_then(|contract| contract.parse::<Address>().ok())
			.ok_or_else(|| PermitError::precondition("Token contract is not an EVM address"))?;
		let value = quote
			.get("effectiveAmountIn64")
			.and_then(parse_u256)
			.ok_or_else(|| PermitError::precondition("Quote does not have effectiveAmountIn64"))?;

		let (domain, nonce) = futures::try_join!(
			self.domain(chain_id, contract),
			self.reader.nonces(chain_id, contract, owner)
		)?;
		let deadline = deadline.unwrap_or_else(|| {
			(chrono::Utc::now().timestamp() + DEFAULT_PERMIT_TTL_SECS).to_string()
		});
		debug!(chain_id, %contract, %owner, "Derived token permit");

		Ok(PermitTypedData::new(
			domain,
			PermitValue {
				owner: owner.to_string(),
				spender: FORWARDER_CONTRACT.to_string(),
				value: value.to_string(),
				nonce: nonce.to_string(),
				deadline,
			},
		))
	}

	/// Permit letting the HyperCore bridge pull the deposit from `owner`'s
	/// Arbitrum USDC; expires with the quote.
	pub async fn hypercore_permit_params(
		&self,
		quote: &Quote,
		owner: Address,
	) -> Result<PermitTypedData, PermitError> {
		let hypercore = quote
			.get("hyperCoreParams")
			.filter(|params| params.is_object())
			.ok_or_else(|| PermitError::precondition("Quote does not have hyperCoreParams"))?;
		if quote.to_chain() != Some(HYPERCORE_CHAIN) {
			return Err(PermitError::precondition("Quote toChain is not hypercore"));
		}
		let to_token_is_usdc = quote
			.get("toToken")
			.and_then(|token| token.get("contract"))
			.and_then(Value::as_str)
			.and_then(|contract| contract.parse::<Address>().ok())
			.is_some_and(|contract| contract == ARBITRUM_USDC);
		if !to_token_is_usdc {
			return Err(PermitError::precondition("Quote toToken is not USDC on Arbitrum"));
		}
		let value = hypercore
			.get("depositAmountUSDC64")
			.and_then(parse_u256)
			.ok_or_else(|| {
				PermitError::precondition("Quote hyperCoreParams does not have depositAmountUSDC64")
			})?;
		let deadline = quote
			.get("deadline64")
			.and_then(parse_u256)
			.ok_or_else(|| PermitError::precondition("Quote does not have deadline64"))?;

		let (domain, nonce) = futures::try_join!(
			self.domain(ARBITRUM_CHAIN_ID, ARBITRUM_USDC),
			self.reader.nonces(ARBITRUM_CHAIN_ID, ARBITRUM_USDC, owner)
		)?;
		debug!(%owner, "Derived HyperCore deposit permit");

		Ok(PermitTypedData::new(
			domain,
			PermitValue {
				owner: owner.to_string(),
				spender: HYPERCORE_BRIDGE.to_string(),
				value: value.to_string(),
				nonce: nonce.to_string(),
				deadline: deadline.to_string(),
			},
		))
	}

	/// EIP-712 domain of a token.
	async fn domain(&self, chain_id: u64, token: Address) -> Result<PermitDomain, PermitError> {
		let (name, version) = futures::join!(
			self.reader.name(chain_id, token),
			self.reader.version(chain_id, token)
		);

		let (name, version) = match (name, version) {
			(Ok(name), Ok(version)) => (name, version),
			(Ok(name), Err(e)) => {
				debug!(%token, error = %e, "Token has no version(), assuming \"1\"");
				(name, DEFAULT_DOMAIN_VERSION.to_string())
			}
			(Err(PermitError::NoProvider(chain)), _) => return Err(PermitError::NoProvider(chain)),
			(Err(e), _) => {
				debug!(%token, error = %e, "Token has no name()");
				return Err(PermitError::MissingDomain);
			}
		};

		Ok(PermitDomain {
			name,
			version,
			chain_id,
			verifying_contract: token.to_string(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use builder_types::{ErrorCode, PERMIT_PRIMARY_TYPE};
	use serde_json::json;
	use std::collections::HashMap;

	/// In-memory token state keyed by contract.
	#[derive(Default)]
	struct StaticTokens {
		names: HashMap<Address, String>,
		versions: HashMap<Address, String>,
		nonce: u64,
	}

	#[async_trait]
	impl TokenReader for StaticTokens {
		async fn name(&self, _chain_id: u64, token: Address) -> Result<String, PermitError> {
			self.names
				.get(&token)
				.cloned()
				.ok_or_else(|| PermitError::Rpc("execution reverted".to_string()))
		}

		async fn version(&self, _chain_id: u64, token: Address) -> Result<String, PermitError> {
			self.versions
				.get(&token)
				.cloned()
				.ok_or_else(|| PermitError::Rpc("execution reverted".to_string()))
		}

		async fn nonces(
			&self,
			chain_id: u64,
			_token: Address,
			_owner: Address,
		) -> Result<U256, PermitError> {
			if chain_id == 0 {
				return Err(PermitError::NoProvider(chain_id));
			}
			Ok(U256::from(self.nonce))
		}
	}

	const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
	const OWNER: Address = address!("1111111111111111111111111111111111111111");

	fn service(with_version: bool) -> PermitService {
		let mut tokens = StaticTokens {
			nonce: 7,
			..Default::default()
		};
		tokens.names.insert(BASE_USDC, "USD Coin".to_string());
		tokens.names.insert(ARBITRUM_USDC, "USD Coin".to_string());
		if with_version {
			tokens.versions.insert(BASE_USDC, "2".to_string());
			tokens.versions.insert(ARBITRUM_USDC, "2".to_string());
		}
		PermitService::new(Arc::new(tokens))
	}

	fn swap_quote(token: Value) -> Quote {
		let raw: Value = serde_json::from_str(&format!(
			r#"{{"fromChain": "base", "effectiveAmountIn64": 123456789012345678901234567890, "fromToken": {}}}"#,
			token
		))
		.unwrap();
		Quote::from_value(raw).unwrap()
	}

	fn hypercore_quote() -> Value {
		json!({
			"fromChain": "arbitrum",
			"toChain": "hypercore",
			"toToken": {"contract": "0xAF88D065E77C8CC2239327C5EDB3A432268E5831"},
			"hyperCoreParams": {"depositAmountUSDC64": "5000000"},
			"deadline64": "1700003600"
		})
	}

	#[tokio::test]
	async fn test_permit_params_for_permit_token() {
		let quote = swap_quote(json!({
			"contract": BASE_USDC.to_string(),
			"chainId": 8453,
			"supportsPermit": true
		}));

		let typed = service(true)
			.permit_params(&quote, OWNER, Some("1700000000".to_string()))
			.await
			.unwrap();

		assert_eq!(typed.domain.name, "USD Coin");
		assert_eq!(typed.domain.version, "2");
		assert_eq!(typed.domain.chain_id, 8453);
		assert_eq!(typed.domain.verifying_contract, BASE_USDC.to_string());
		assert_eq!(typed.value.spender, FORWARDER_CONTRACT.to_string());
		assert_eq!(typed.value.value, "123456789012345678901234567890");
		assert_eq!(typed.value.nonce, "7");
		assert_eq!(typed.value.deadline, "1700000000");
		assert!(typed.types.contains_key(PERMIT_PRIMARY_TYPE));
	}

	#[tokio::test]
	async fn test_missing_version_falls_back_to_one() {
		let quote = swap_quote(json!({
			"contract": BASE_USDC.to_string(),
			"chainId": "8453",
			"supportsPermit": true
		}));

		let before = chrono::Utc::now().timestamp();
		let typed = service(false).permit_params(&quote, OWNER, None).await.unwrap();
		assert_eq!(typed.domain.version, "1");

		let deadline: i64 = typed.value.deadline.parse().unwrap();
		assert!(deadline >= before + DEFAULT_PERMIT_TTL_SECS);
		assert!(deadline <= chrono::Utc::now().timestamp() + DEFAULT_PERMIT_TTL_SECS);
	}

	#[tokio::test]
	async fn test_permit_preconditions() {
		let service = service(true);
		let no_permit = swap_quote(json!({"contract": BASE_USDC.to_string(), "chainId": 8453}));
		let err = service.permit_params(&no_permit, OWNER, None).await.unwrap_err();
		assert_eq!(err.to_string(), "Token does not support permit");
		assert_eq!(APIError::from(err).code(), ErrorCode::InvalidRequest);

		let no_chain = swap_quote(json!({"contract": BASE_USDC.to_string(), "supportsPermit": true}));
		assert_eq!(
			service.permit_params(&no_chain, OWNER, None).await.unwrap_err().to_string(),
			"Token chainId is not available"
		);

		let unknown = swap_quote(json!({
			"contract": "0x2222222222222222222222222222222222222222",
			"chainId": 8453,
			"supportsPermit": true
		}));
		assert_eq!(
			service.permit_params(&unknown, OWNER, None).await.unwrap_err(),
			PermitError::MissingDomain
		);
	}

	#[tokio::test]
	async fn test_rpc_failures_are_build_failures() {
		let quote = swap_quote(json!({
			"contract": BASE_USDC.to_string(),
			"chainId": 0,
			"supportsPermit": true
		}));
		let err = service(true).permit_params(&quote, OWNER, None).await.unwrap_err();
		assert_eq!(err, PermitError::NoProvider(0));
		assert_eq!(APIError::from(err).code(), ErrorCode::BuildFailed);
	}

	#[tokio::test]
	async fn test_hypercore_permit() {
		let quote = Quote::from_value(hypercore_quote()).unwrap();
		let typed = service(true).hypercore_permit_params(&quote, OWNER).await.unwrap();

		assert_eq!(typed.domain.chain_id, ARBITRUM_CHAIN_ID);
		assert_eq!(typed.domain.verifying_contract, ARBITRUM_USDC.to_string());
		assert_eq!(typed.value.spender, HYPERCORE_BRIDGE.to_string());
		assert_eq!(typed.value.value, "5000000");
		assert_eq!(typed.value.deadline, "1700003600");
		assert_eq!(typed.value.owner, OWNER.to_string());
	}

	#[tokio::test]
	async fn test_hypercore_preconditions() {
		let service = service(true);
		let check = |mutate: fn(&mut Value)| {
			let mut raw = hypercore_quote();
			mutate(&mut raw);
			Quote::from_value(raw).unwrap()
		};

		let quote = check(|raw| {
			raw.as_object_mut().unwrap().remove("hyperCoreParams");
		});
		assert_eq!(
			service.hypercore_permit_params(&quote, OWNER).await.unwrap_err().to_string(),
			"Quote does not have hyperCoreParams"
		);

		let quote = check(|raw| raw["toChain"] = json!("arbitrum"));
		assert_eq!(
			service.hypercore_permit_params(&quote, OWNER).await.unwrap_err().to_string(),
			"Quote toChain is not hypercore"
		);

		let quote = check(|raw| raw["toToken"]["contract"] = json!(BASE_USDC.to_string()));
		assert_eq!(
			service.hypercore_permit_params(&quote, OWNER).await.unwrap_err().to_string(),
			"Quote toToken is not USDC on Arbitrum"
		);
	}
}
