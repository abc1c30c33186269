//! Quote signature verification.
//!
//! Quotes are signed off-chain by a single trusted signer. The signer hashes
//! the canonical JSON form of the quote with keccak256 and signs that hash as
//! an EIP-191 personal message; verification recomputes the digest, recovers
//! the secp256k1 signer and compares it with the configured address.

pub mod canonical;
pub mod verify;

pub use canonical::{canonical_bytes, canonicalize};
pub use verify::{
	parse_signature, recover_signer, signing_hash, BatchVerification, QuoteVerifier,
	SignatureError,
};
