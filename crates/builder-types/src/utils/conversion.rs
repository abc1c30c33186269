//! Numeric conversion utilities.
//!
//! Amounts cross the JSON boundary either as decimal strings or as numbers
//! wider than 64 bits. Both are kept as exact integers here and are never
//! routed through a fixed-width or floating point type.

use alloy_primitives::U256;
use serde_json::{Number, Value};
use std::str::FromStr;

/// Returns true for an integer literal that fits neither `u64` nor `i64`.
pub fn is_big_integer(number: &Number) -> bool {
	!number.is_u64() && !number.is_i64() && !number.is_f64()
}

/// Parses an unsigned 256-bit integer from a decimal/hex string or a JSON
/// integer of any width.
pub fn parse_u256(value: &Value) -> Option<U256> {
	match value {
		Value::String(s) => U256::from_str(s.trim()).ok(),
		Value::Number(n) => match n.as_u64() {
			Some(small) => Some(U256::from(small)),
			None if is_big_integer(n) => U256::from_str_radix(&n.to_string(), 10).ok(),
			None => None,
		},
		_ => None,
	}
}

/// Parses a `u64` from a JSON integer or a decimal string.
pub fn parse_u64(value: &Value) -> Option<u64> {
	match value {
		Value::Number(n) => n.as_u64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

/// Rewrites every integer wider than 64 bits into its exact decimal string.
pub fn stringify_big_integers(value: &mut Value) {
	match value {
		Value::Number(n) if is_big_integer(n) => {
			*value = Value::String(n.to_string());
		}
		Value::Array(items) => items.iter_mut().for_each(stringify_big_integers),
		Value::Object(fields) => fields.values_mut().for_each(stringify_big_integers),
		_ => {}
	}
}

/// Serde module for U256 values carried as decimal strings.
///
/// Deserialization also accepts JSON integers of any width.
pub mod u256_serde {
	use super::parse_u256;
	use alloy_primitives::U256;
	use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
	use serde_json::Value;

	pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		value.to_string().serialize(serializer)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = Value::deserialize(deserializer)?;
		parse_u256(&raw).ok_or_else(|| D::Error::custom(format!("invalid uint256 value: {}", raw)))
	}
}
