//! ERC-20 state reads over EVM JSON-RPC using the Alloy library.

use crate::permit::{PermitError, TokenReader};
use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use builder_config::RpcConfig;
use std::collections::HashMap;
use std::sync::Arc;

sol! {
	/// Permit-related getters of an EIP-2612 token.
	interface IERC20Permit {
		function nonces(address owner) external view returns (uint256);
		function name() external view returns (string);
		function version() external view returns (string);
	}
}

/// Token reader with one HTTP provider per configured EVM chain.
pub struct AlloyTokenReader {
	providers: HashMap<u64, Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>>,
}

impl AlloyTokenReader {
	/// Creates providers for every EVM endpoint in the RPC configuration.
	pub fn new(rpc: &RpcConfig) -> Result<Self, PermitError> {
		let mut providers = HashMap::new();

		for (chain_id, url) in &rpc.evm {
			let chain_id: u64 = chain_id
				.parse()
				.map_err(|_| PermitError::Rpc(format!("Invalid chain id in RPC config: {}", chain_id)))?;
			let url = url.parse().map_err(|e| {
				PermitError::Rpc(format!("Invalid RPC URL for chain {}: {}", chain_id, e))
			})?;

			let provider = ProviderBuilder::new().on_http(url);
			providers.insert(
				chain_id,
				Arc::new(provider) as Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>,
			);
		}

		Ok(Self { providers })
	}

	/// Chains a provider exists for, ascending.
	pub fn chain_ids(&self) -> Vec<u64> {
		let mut ids: Vec<u64> = self.providers.keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	/// Executes an `eth_call` against `token` and decodes its return data.
	async fn call<C: SolCall + Send>(
		&self,
		chain_id: u64,
		token: Address,
		call: C,
	) -> Result<C::Return, PermitError> {
		let provider = self
			.providers
			.get(&chain_id)
			.ok_or(PermitError::NoProvider(chain_id))?;

		let request = TransactionRequest::default()
			.to(token)
			.input(Bytes::from(call.abi_encode()).into());

		let output = provider
			.call(&request)
			.await
			.map_err(|e| PermitError::Rpc(format!("Failed to call {}: {}", C::SIGNATURE, e)))?;

		C::abi_decode_returns(&output, true)
			.map_err(|e| PermitError::Rpc(format!("Failed to decode {}: {}", C::SIGNATURE, e)))
	}
}

#[async_trait]
impl TokenReader for AlloyTokenReader {
	async fn name(&self, chain_id: u64, token: Address) -> Result<String, PermitError> {
		Ok(self.call(chain_id, token, IERC20Permit::nameCall {}).await?._0)
	}

	async fn version(&self, chain_id: u64, token: Address) -> Result<String, PermitError> {
		Ok(self.call(chain_id, token, IERC20Permit::versionCall {}).await?._0)
	}

	async fn nonces(&self, chain_id: u64, token: Address, owner: Address) -> Result<U256, PermitError> {
		Ok(self
			.call(chain_id, token, IERC20Permit::noncesCall { owner })
			.await?
			._0)
	}
}
