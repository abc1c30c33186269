//! Typed build parameters.
//!
//! Client input arrives untyped; the request validator converts it into one of
//! these per-category structs before any builder sees it. The structs
//! serialize back into the camelCase shape the construction backend expects.

use crate::chains::ChainCategory;
use crate::utils::u256_serde;
use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

/// Referrer addresses per destination environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerAddresses {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub evm: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub solana: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sui: Option<String>,
}

/// Signed ERC-20 permit authorizing the swap contract to pull tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Permit {
	/// Approved amount.
	#[serde(with = "u256_serde")]
	pub value: U256,
	/// Permit expiry as a unix timestamp.
	pub deadline: u64,
	pub v: u8,
	pub r: String,
	pub s: String,
}

/// Parameters shared by every chain category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseBuildParams {
	/// Recipient on the destination chain.
	pub destination_address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub referrer_addresses: Option<ReferrerAddresses>,
	/// Opaque payload forwarded to the destination.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub custom_payload: Option<Bytes>,
}

/// Parameters for quotes originating on an EVM chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmBuildParams {
	#[serde(flatten)]
	pub base: BaseBuildParams,
	pub swapper_address: String,
	/// Chain id the swapper's wallet signs for.
	pub signer_chain_id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub permit: Option<Erc20Permit>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usdc_permit_signature: Option<String>,
}

/// Parameters for quotes originating on a Solana-family chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SvmBuildParams {
	#[serde(flatten)]
	pub base: BaseBuildParams,
	pub swapper_address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usdc_permit_signature: Option<String>,
}

/// Parameters for quotes originating on Sui.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiBuildParams {
	#[serde(flatten)]
	pub base: BaseBuildParams,
	pub swapper_address: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub usdc_permit_signature: Option<String>,
}

/// Build parameters validated against the category of the request's quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BuildParams {
	Evm(EvmBuildParams),
	Svm(SvmBuildParams),
	Sui(SuiBuildParams),
}

impl BuildParams {
	/// Category these parameters were validated for.
	pub fn category(&self) -> ChainCategory {
		match self {
			BuildParams::Evm(_) => ChainCategory::Evm,
			BuildParams::Svm(_) => ChainCategory::Svm,
			BuildParams::Sui(_) => ChainCategory::Sui,
		}
	}

	/// Parameters common to all categories.
	pub fn base(&self) -> &BaseBuildParams {
		match self {
			BuildParams::Evm(params) => &params.base,
			BuildParams::Svm(params) => &params.base,
			BuildParams::Sui(params) => &params.base,
		}
	}

	/// Address of the wallet that will sign the built transaction.
	pub fn swapper_address(&self) -> &str {
		match self {
			BuildParams::Evm(params) => &params.swapper_address,
			BuildParams::Svm(params) => &params.swapper_address,
			BuildParams::Sui(params) => &params.swapper_address,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_evm_params_wire_shape() {
		let params = BuildParams::Evm(EvmBuildParams {
			base: BaseBuildParams {
				destination_address: "dest".to_string(),
				referrer_addresses: Some(ReferrerAddresses {
					solana: Some("ref".to_string()),
					..Default::default()
				}),
				custom_payload: Some(Bytes::from(vec![0xde, 0xad])),
			},
			swapper_address: "0xswapper".to_string(),
			signer_chain_id: 8453,
			permit: Some(Erc20Permit {
				value: U256::MAX,
				deadline: 1_700_000_000,
				v: 27,
				r: "0x01".to_string(),
				s: "0x02".to_string(),
			}),
			usdc_permit_signature: None,
		});

		assert_eq!(params.category(), ChainCategory::Evm);
		assert_eq!(params.swapper_address(), "0xswapper");
		assert_eq!(
			serde_json::to_value(&params).unwrap(),
			json!({
				"destinationAddress": "dest",
				"referrerAddresses": {"solana": "ref"},
				"customPayload": "0xdead",
				"swapperAddress": "0xswapper",
				"signerChainId": 8453,
				"permit": {
					"value": U256::MAX.to_string(),
					"deadline": 1700000000,
					"v": 27,
					"r": "0x01",
					"s": "0x02"
				}
			})
		);
	}

	#[test]
	fn test_permit_accepts_numeric_value() {
		let permit: Erc20Permit = serde_json::from_value(json!({
			"value": 1000,
			"deadline": 1700000000,
			"v": 28,
			"r": "0x01",
			"s": "0x02"
		}))
		.unwrap();
		assert_eq!(permit.value, U256::from(1000u64));
	}
}
