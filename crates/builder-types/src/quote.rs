//! Signed quotes.
//!
//! A quote is an opaque record produced by the quoting authority. Only a
//! handful of its fields are interpreted here; the rest is carried verbatim to
//! the transaction builders and into the signature payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the signer's signature. Never part of the signed payload.
pub const SIGNATURE_FIELD: &str = "signature";

/// A quote together with its attached signature.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quote(Map<String, Value>);

impl Quote {
	/// Wraps a JSON value, returning `None` unless it is an object.
	pub fn from_value(value: Value) -> Option<Self> {
		match value {
			Value::Object(fields) => Some(Self(fields)),
			_ => None,
		}
	}

	/// All fields of the quote, signature included.
	pub fn fields(&self) -> &Map<String, Value> {
		&self.0
	}

	/// Looks up a top-level field.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.0.get(key)
	}

	/// Returns a non-empty string field.
	pub fn str_field(&self, key: &str) -> Option<&str> {
		self.0
			.get(key)
			.and_then(Value::as_str)
			.filter(|value| !value.is_empty())
	}

	/// The attached signature, hex encoded.
	pub fn signature(&self) -> Option<&str> {
		self.str_field(SIGNATURE_FIELD)
	}

	/// Name of the chain the swap starts on.
	pub fn from_chain(&self) -> Option<&str> {
		self.str_field("fromChain")
	}

	/// Name of the chain the swap ends on.
	pub fn to_chain(&self) -> Option<&str> {
		self.str_field("toChain")
	}

	/// Route type selecting the build pipeline (`SWIFT`, `MCTP`, ...).
	pub fn quote_type(&self) -> Option<&str> {
		self.str_field("type")
	}

	/// Whether the quote asks for a relayer-submitted order.
	pub fn is_gasless(&self) -> bool {
		self.0.get("gasless").and_then(Value::as_bool).unwrap_or(false)
	}

	/// Consumes the quote, returning its fields.
	pub fn into_inner(self) -> Map<String, Value> {
		self.0
	}
}

impl From<Map<String, Value>> for Quote {
	fn from(fields: Map<String, Value>) -> Self {
		Self(fields)
	}
}
