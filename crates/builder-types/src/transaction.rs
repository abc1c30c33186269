//! Results of transaction construction.
//!
//! Every result is tagged with the chain category it was built for. Backend
//! payloads that are not interpreted by the service (typed-data messages,
//! order parameters, Solana instructions) are carried as opaque JSON with
//! wide integers rewritten as decimal strings.

use crate::chains::ChainCategory;
use crate::utils::{stringify_big_integers, u256_serde};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary type of a gasless SWIFT order.
pub const GASLESS_PRIMARY_TYPE: &str = "CreateOrder";

/// Unsigned EVM transaction ready for `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmTransaction {
	pub to: String,
	pub data: String,
	/// Native value attached to the call, as a decimal string on the wire.
	#[serde(with = "u256_serde", default)]
	pub value: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chain_id: Option<u64>,
}

/// Forwarder call wrapping the swap when the input token must be swapped first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwarderParams {
	pub method: String,
	#[serde(default)]
	pub params: Vec<Value>,
}

/// Calldata result for non-gasless EVM quotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmCalldataResult {
	#[serde(default)]
	pub quote_type: String,
	/// Always `false` for calldata results.
	#[serde(default)]
	pub gasless: bool,
	pub transaction: EvmTransaction,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub forwarder_params: Option<ForwarderParams>,
}

/// EIP-712 typed data the swapper signs for a gasless order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessTypedData {
	pub domain: Value,
	pub types: Value,
	pub value: Value,
	#[serde(default = "default_gasless_primary_type")]
	pub primary_type: String,
}

fn default_gasless_primary_type() -> String {
	GASLESS_PRIMARY_TYPE.to_string()
}

/// Typed-data result for gasless SWIFT quotes, submitted later by a relayer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmGaslessResult {
	#[serde(default)]
	pub quote_type: String,
	/// Always `true` for gasless results.
	#[serde(default = "gasless_flag")]
	pub gasless: bool,
	pub typed_data: GaslessTypedData,
	#[serde(default)]
	pub order_params: Value,
	pub order_hash: String,
	#[serde(default)]
	pub permit_params: Value,
}

fn gasless_flag() -> bool {
	true
}

/// EVM build output, discriminated on the wire by `gasless`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EvmTransactionResult {
	Calldata(EvmCalldataResult),
	Gasless(EvmGaslessResult),
}

impl EvmTransactionResult {
	/// Decodes a backend payload, selecting the variant from its `gasless` flag.
	pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
		let gasless = value.get("gasless").and_then(Value::as_bool).unwrap_or(false);
		if gasless {
			serde_json::from_value(value).map(EvmTransactionResult::Gasless)
		} else {
			serde_json::from_value(value).map(EvmTransactionResult::Calldata)
		}
	}

	pub fn is_gasless(&self) -> bool {
		matches!(self, EvmTransactionResult::Gasless(_))
	}

	fn quote_type_mut(&mut self) -> &mut String {
		match self {
			EvmTransactionResult::Calldata(result) => &mut result.quote_type,
			EvmTransactionResult::Gasless(result) => &mut result.quote_type,
		}
	}
}

/// Solana-family build output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SvmTransactionResult {
	#[serde(default)]
	pub quote_type: String,
	/// Serialized transaction, base64.
	pub transaction: String,
	/// Base58 secrets of additional signers, if the route needs any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub signers: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instructions: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lookup_tables: Option<Vec<String>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub swap_message_v0_params: Option<Value>,
}

/// Sui build output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiTransactionResult {
	#[serde(default)]
	pub quote_type: String,
	/// Serialized transaction bytes, base64.
	pub transaction: String,
}

/// Result of building one quote, tagged with its chain category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chainCategory", rename_all = "lowercase")]
pub enum BuildResult {
	Evm(EvmTransactionResult),
	Svm(SvmTransactionResult),
	Sui(SuiTransactionResult),
}

impl BuildResult {
	pub fn category(&self) -> ChainCategory {
		match self {
			BuildResult::Evm(_) => ChainCategory::Evm,
			BuildResult::Svm(_) => ChainCategory::Svm,
			BuildResult::Sui(_) => ChainCategory::Sui,
		}
	}

	/// Stamps the route type of the quote the result was built from.
	pub fn with_quote_type(mut self, quote_type: &str) -> Self {
		let slot = match &mut self {
			BuildResult::Evm(result) => result.quote_type_mut(),
			BuildResult::Svm(result) => &mut result.quote_type,
			BuildResult::Sui(result) => &mut result.quote_type,
		};
		*slot = quote_type.to_string();
		self
	}

	/// Rewrites integers wider than 64 bits in opaque payloads as decimal
	/// strings.
	pub fn normalize_numbers(&mut self) {
		match self {
			BuildResult::Evm(EvmTransactionResult::Calldata(result)) => {
				if let Some(forwarder) = result.forwarder_params.as_mut() {
					forwarder.params.iter_mut().for_each(stringify_big_integers);
				}
			}
			BuildResult::Evm(EvmTransactionResult::Gasless(result)) => {
				stringify_big_integers(&mut result.typed_data.domain);
				stringify_big_integers(&mut result.typed_data.value);
				stringify_big_integers(&mut result.order_params);
				stringify_big_integers(&mut result.permit_params);
			}
			BuildResult::Svm(result) => {
				for payload in [&mut result.instructions, &mut result.swap_message_v0_params]
					.into_iter()
					.flatten()
				{
					stringify_big_integers(payload);
				}
			}
			BuildResult::Sui(_) => {}
		}
	}
}
