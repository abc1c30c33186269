//! EIP-2612 permit typed data.
//!
//! Permit parameters are returned to the client, signed by the token owner
//! and later submitted back as part of the build parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the EIP-712 primary type of a permit.
pub const PERMIT_PRIMARY_TYPE: &str = "Permit";

/// One member of an EIP-712 struct type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedDataField {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: String,
}

impl TypedDataField {
	fn new(name: &str, kind: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
		}
	}
}

/// EIP-712 domain of a permit-capable token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitDomain {
	pub name: String,
	pub version: String,
	pub chain_id: u64,
	pub verifying_contract: String,
}

/// Message half of the permit typed data.
///
/// Integers are carried as decimal strings so they survive JSON clients
/// without precision loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitValue {
	pub owner: String,
	pub spender: String,
	pub value: String,
	pub nonce: String,
	pub deadline: String,
}

/// Complete typed data the token owner signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitTypedData {
	pub domain: PermitDomain,
	pub types: BTreeMap<String, Vec<TypedDataField>>,
	pub value: PermitValue,
}

impl PermitTypedData {
	/// Builds typed data with the standard `Permit` type definition.
	pub fn new(domain: PermitDomain, value: PermitValue) -> Self {
		Self {
			domain,
			types: permit_types(),
			value,
		}
	}
}

/// The EIP-2612 `Permit` struct definition.
pub fn permit_types() -> BTreeMap<String, Vec<TypedDataField>> {
	let fields = vec![
		TypedDataField::new("owner", "address"),
		TypedDataField::new("spender", "address"),
		TypedDataField::new("value", "uint256"),
		TypedDataField::new("nonce", "uint256"),
		TypedDataField::new("deadline", "uint256"),
	];
	BTreeMap::from([(PERMIT_PRIMARY_TYPE.to_string(), fields)])
}
