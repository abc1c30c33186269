//! Quote signature verification.

use crate::canonical::canonical_bytes;
use alloy_primitives::{eip191_hash_message, keccak256, Address, PrimitiveSignature, B256};
use builder_types::{without_0x_prefix, Quote};
use thiserror::Error;
use tracing::debug;

/// Reasons a signature could not be checked.
#[derive(Debug, Error)]
pub enum SignatureError {
	#[error("Quote has no signature")]
	Missing,
	#[error("Signature is not valid hex: {0}")]
	Hex(#[from] hex::FromHexError),
	#[error("Signature must be 65 bytes, got {0}")]
	Length(usize),
	#[error("Malformed signature: {0}")]
	Malformed(String),
	#[error("Signer recovery failed: {0}")]
	Recovery(String),
}

/// Digest the signer signs: the EIP-191 personal message hash of
/// `keccak256(canonical quote)`.
pub fn signing_hash(quote: &Quote) -> B256 {
	let payload_hash = keccak256(canonical_bytes(quote.fields()));
	eip191_hash_message(payload_hash)
}

/// Parses a 65-byte `r || s || v` signature, hex encoded with optional `0x`.
pub fn parse_signature(raw: &str) -> Result<PrimitiveSignature, SignatureError> {
	let bytes = hex::decode(without_0x_prefix(raw.trim()))?;
	if bytes.len() != 65 {
		return Err(SignatureError::Length(bytes.len()));
	}
	PrimitiveSignature::try_from(bytes.as_slice())
		.map_err(|e| SignatureError::Malformed(e.to_string()))
}

/// Recovers the address that signed a quote.
pub fn recover_signer(quote: &Quote) -> Result<Address, SignatureError> {
	let signature = parse_signature(quote.signature().ok_or(SignatureError::Missing)?)?;
	signature
		.recover_address_from_prehash(&signing_hash(quote))
		.map_err(|e| SignatureError::Recovery(e.to_string()))
}

/// Outcome of verifying several quotes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchVerification {
	/// Positions of the quotes that failed, ascending.
	pub invalid_indexes: Vec<usize>,
}

impl BatchVerification {
	pub fn is_valid(&self) -> bool {
		self.invalid_indexes.is_empty()
	}
}

/// Checks quotes against the one trusted signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteVerifier {
	expected_signer: Address,
}

impl QuoteVerifier {
	pub fn new(expected_signer: Address) -> Self {
		Self { expected_signer }
	}

	pub fn expected_signer(&self) -> Address {
		self.expected_signer
	}

	/// True only if the quote's signature recovers to the expected signer.
	///
	/// Malformed or missing signatures count as failures; nothing is raised.
	pub fn verify(&self, quote: &Quote) -> bool {
		match recover_signer(quote) {
			Ok(recovered) if recovered == self.expected_signer => true,
			Ok(recovered) => {
				debug!(%recovered, expected = %self.expected_signer, "Quote signed by unexpected address");
				false
			}
			Err(e) => {
				debug!(error = %e, "Quote signature could not be verified");
				false
			}
		}
	}

	/// Verifies every quote independently.
	pub fn verify_batch(&self, quotes: &[Quote]) -> BatchVerification {
		BatchVerification {
			invalid_indexes: quotes
				.iter()
				.enumerate()
				.filter(|(_, quote)| !self.verify(quote))
				.map(|(index, _)| index)
				.collect(),
		}
	}
}
