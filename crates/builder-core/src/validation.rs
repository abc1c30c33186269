//! Request validation.
//!
//! Validation runs in two passes around signature verification. The
//! structural pass only looks at the shape of the request and is cheap enough
//! to run before any cryptography. The category pass classifies the quotes and
//! converts the untyped `params` object into the typed parameters of that
//! category; it runs after the signatures have been checked.

use alloy_primitives::{Address, Bytes};
use builder_types::utils::{parse_u256, parse_u64};
use builder_types::{
	chain_category, without_0x_prefix, APIError, BaseBuildParams, BuildParams, ChainCategory,
	ChainError, Erc20Permit, EvmBuildParams, Quote, ReferrerAddresses, SuiBuildParams,
	SvmBuildParams,
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Reasons a request is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
	#[error("Request body must be a JSON object")]
	NotAnObject,
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Provide either quote or quotes, not both")]
	AmbiguousQuotes,
	#[error("quotes array cannot be empty")]
	EmptyQuotes,
	#[error("Quote at index {0} must be an object")]
	QuoteNotObject(usize),
	#[error("Quote at index {index} is missing {field}")]
	QuoteMissingField { index: usize, field: &'static str },
	#[error("All quotes must be from the same chain category (evm, svm, or sui)")]
	MixedCategories,
	#[error(transparent)]
	Chain(#[from] ChainError),
	#[error("{} transactions require {field} in params", upper(.category))]
	MissingParam {
		category: ChainCategory,
		field: &'static str,
	},
	#[error("Invalid {field}: {reason}")]
	InvalidField { field: String, reason: String },
}

fn upper(category: &ChainCategory) -> String {
	category.as_str().to_uppercase()
}

impl ValidationError {
	fn invalid(field: &str, reason: impl Into<String>) -> Self {
		ValidationError::InvalidField {
			field: field.to_string(),
			reason: reason.into(),
		}
	}
}

impl From<ValidationError> for APIError {
	fn from(err: ValidationError) -> Self {
		APIError::invalid_request(err.to_string())
	}
}

/// How the quotes were submitted; decides the shape of the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
	/// `{ quote, params }`: one result, any failure fails the request.
	Single,
	/// `{ quotes, params }`: one result per quote, in input order.
	Batch,
}

/// A build request that passed the structural pass.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
	pub mode: RequestMode,
	/// Never empty.
	pub quotes: Vec<Quote>,
	/// Raw params; `destinationAddress` is known to be present.
	pub params: Map<String, Value>,
}

/// Structural pass over a `/build` body.
pub fn parse_build_request(body: Value) -> Result<BuildRequest, ValidationError> {
	let Value::Object(mut body) = body else {
		return Err(ValidationError::NotAnObject);
	};

	let single = take_present(&mut body, "quote");
	let batch = take_present(&mut body, "quotes");
	let (mode, raw_quotes) = match (single, batch) {
		(Some(_), Some(_)) => return Err(ValidationError::AmbiguousQuotes),
		(Some(Value::Array(_)), None) => {
			return Err(ValidationError::invalid(
				"quote",
				"expected a single quote object, use quotes for batches",
			))
		}
		(Some(quote), None) => (RequestMode::Single, vec![quote]),
		(None, Some(Value::Array(quotes))) => (RequestMode::Batch, quotes),
		(None, Some(quote)) => (RequestMode::Batch, vec![quote]),
		(None, None) => return Err(ValidationError::MissingField("quotes".to_string())),
	};

	let params = match take_present(&mut body, "params") {
		Some(Value::Object(params)) => params,
		Some(_) => return Err(ValidationError::invalid("params", "must be an object")),
		None => return Err(ValidationError::MissingField("params".to_string())),
	};
	if non_empty_str(&params, "destinationAddress").is_none() {
		return Err(ValidationError::MissingField(
			"params.destinationAddress".to_string(),
		));
	}

	if raw_quotes.is_empty() {
		return Err(ValidationError::EmptyQuotes);
	}
	let quotes = raw_quotes
		.into_iter()
		.enumerate()
		.map(|(index, raw)| check_quote(index, raw))
		.collect::<Result<Vec<_>, _>>()?;

	Ok(BuildRequest {
		mode,
		quotes,
		params,
	})
}

fn check_quote(index: usize, raw: Value) -> Result<Quote, ValidationError> {
	let quote = Quote::from_value(raw).ok_or(ValidationError::QuoteNotObject(index))?;
	let missing = |field| ValidationError::QuoteMissingField { index, field };

	quote.signature().ok_or_else(|| missing("signature"))?;
	quote.from_chain().ok_or_else(|| missing("fromChain"))?;
	quote.quote_type().ok_or_else(|| missing("type"))?;
	Ok(quote)
}

/// Classifies the quotes, requiring a single shared category.
pub fn resolve_category(quotes: &[Quote]) -> Result<ChainCategory, ValidationError> {
	let categories = quotes
		.iter()
		.map(|quote| chain_category(quote.from_chain().unwrap_or_default()))
		.collect::<Result<Vec<_>, _>>()?;

	let (first, rest) = categories
		.split_first()
		.ok_or(ValidationError::EmptyQuotes)?;
	if rest.iter().any(|category| category != first) {
		return Err(ValidationError::MixedCategories);
	}
	Ok(*first)
}

/// Converts raw params into the typed parameters of `category`.
pub fn parse_params(
	category: ChainCategory,
	params: &Map<String, Value>,
) -> Result<BuildParams, ValidationError> {
	let base = parse_base(params)?;

	match category {
		ChainCategory::Evm => {
			// Zero is not a chain id; it counts as absent.
			let signer_chain_id = match params.get("signerChainId") {
				None | Some(Value::Null) => None,
				Some(Value::String(s)) if s.is_empty() => None,
				Some(raw) => Some(parse_u64(raw).ok_or_else(|| {
					ValidationError::invalid("signerChainId", "must be a number or numeric string")
				})?),
			}
			.filter(|id| *id != 0)
			.ok_or(ValidationError::MissingParam {
				category,
				field: "signerChainId",
			})?;
			let swapper_address = require_swapper(category, params)?;
			let permit = match params.get("permit") {
				None | Some(Value::Null) => None,
				Some(raw) => Some(parse_permit(raw)?),
			};

			Ok(BuildParams::Evm(EvmBuildParams {
				base,
				swapper_address,
				signer_chain_id,
				permit,
				usdc_permit_signature: optional_str(params, "usdcPermitSignature")?,
			}))
		}
		ChainCategory::Svm => Ok(BuildParams::Svm(SvmBuildParams {
			swapper_address: require_swapper(category, params)?,
			usdc_permit_signature: optional_str(params, "usdcPermitSignature")?,
			base,
		})),
		ChainCategory::Sui => Ok(BuildParams::Sui(SuiBuildParams {
			swapper_address: require_swapper(category, params)?,
			usdc_permit_signature: optional_str(params, "usdcPermitSignature")?,
			base,
		})),
	}
}

fn parse_base(params: &Map<String, Value>) -> Result<BaseBuildParams, ValidationError> {
	let destination_address = non_empty_str(params, "destinationAddress")
		.ok_or_else(|| ValidationError::MissingField("params.destinationAddress".to_string()))?
		.to_string();

	let referrer_addresses = match params.get("referrerAddresses") {
		None | Some(Value::Null) => None,
		Some(raw) => Some(
			serde_json::from_value::<ReferrerAddresses>(raw.clone())
				.map_err(|e| ValidationError::invalid("referrerAddresses", e.to_string()))?,
		),
	};

	let custom_payload = optional_str(params, "customPayload")?
		.map(|payload| {
			hex::decode(without_0x_prefix(&payload))
				.map(Bytes::from)
				.map_err(|e| ValidationError::invalid("customPayload", e.to_string()))
		})
		.transpose()?;

	Ok(BaseBuildParams {
		destination_address,
		referrer_addresses,
		custom_payload,
	})
}

/// Parses an ERC-20 permit; amounts and deadlines may be numbers or strings.
fn parse_permit(raw: &Value) -> Result<Erc20Permit, ValidationError> {
	let field = |name: &str| raw.get(name).filter(|value| !value.is_null());
	let invalid = |reason: &str| ValidationError::invalid("permit", reason);

	let value = field("value")
		.and_then(parse_u256)
		.ok_or_else(|| invalid("value must be an unsigned integer"))?;
	let deadline = field("deadline")
		.and_then(parse_u64)
		.ok_or_else(|| invalid("deadline must be a unix timestamp"))?;
	let v = field("v")
		.and_then(parse_u64)
		.and_then(|v| u8::try_from(v).ok())
		.ok_or_else(|| invalid("v must be a small integer"))?;
	let r = field("r")
		.and_then(Value::as_str)
		.ok_or_else(|| invalid("r must be a hex string"))?;
	let s = field("s")
		.and_then(Value::as_str)
		.ok_or_else(|| invalid("s must be a hex string"))?;

	Ok(Erc20Permit {
		value,
		deadline,
		v,
		r: r.to_string(),
		s: s.to_string(),
	})
}

fn require_swapper(
	category: ChainCategory,
	params: &Map<String, Value>,
) -> Result<String, ValidationError> {
	non_empty_str(params, "swapperAddress")
		.map(str::to_string)
		.ok_or(ValidationError::MissingParam {
			category,
			field: "swapperAddress",
		})
}

/// A permit-params request that passed the structural pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PermitRequest {
	pub quote: Quote,
	/// Wallet that will sign the permit.
	pub owner: Address,
	/// Unix timestamp; a default applies when absent.
	pub deadline: Option<String>,
}

/// Structural pass over a `/permit-params` body.
pub fn parse_permit_request(body: Value) -> Result<PermitRequest, ValidationError> {
	let Value::Object(mut body) = body else {
		return Err(ValidationError::NotAnObject);
	};
	let quote = take_signed_quote(&mut body)?;
	let owner = parse_address(&body, "walletAddress")?;
	let deadline = match body.get("deadline") {
		None | Some(Value::Null) => None,
		Some(raw) => Some(
			parse_u64(raw)
				.ok_or_else(|| ValidationError::invalid("deadline", "must be a unix timestamp"))?
				.to_string(),
		),
	};

	Ok(PermitRequest {
		quote,
		owner,
		deadline,
	})
}

/// Structural pass over a `/hypercore/permit-params` body.
pub fn parse_hypercore_permit_request(body: Value) -> Result<PermitRequest, ValidationError> {
	let Value::Object(mut body) = body else {
		return Err(ValidationError::NotAnObject);
	};
	let quote = take_signed_quote(&mut body)?;
	let owner = parse_address(&body, "userArbitrumAddress")?;

	Ok(PermitRequest {
		quote,
		owner,
		deadline: None,
	})
}

fn take_signed_quote(body: &mut Map<String, Value>) -> Result<Quote, ValidationError> {
	let raw = take_present(body, "quote")
		.ok_or_else(|| ValidationError::MissingField("quote".to_string()))?;
	let quote = Quote::from_value(raw)
		.ok_or_else(|| ValidationError::invalid("quote", "must be an object"))?;
	if quote.signature().is_none() {
		return Err(ValidationError::MissingField("quote.signature".to_string()));
	}
	Ok(quote)
}

fn parse_address(body: &Map<String, Value>, field: &str) -> Result<Address, ValidationError> {
	non_empty_str(body, field)
		.ok_or_else(|| ValidationError::MissingField(field.to_string()))?
		.parse()
		.map_err(|_| ValidationError::invalid(field, "not an EVM address"))
}

fn take_present(body: &mut Map<String, Value>, key: &str) -> Option<Value> {
	body.remove(key).filter(|value| !value.is_null())
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
	map.get(key)
		.and_then(Value::as_str)
		.filter(|value| !value.is_empty())
}

fn optional_str(map: &Map<String, Value>, key: &str) -> Result<Option<String>, ValidationError> {
	match map.get(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(s)) if s.is_empty() => Ok(None),
		Some(Value::String(s)) => Ok(Some(s.clone())),
		Some(_) => Err(ValidationError::invalid(key, "must be a string")),
	}
}
