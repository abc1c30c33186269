//! Common types module for the quote transaction builder.
//!
//! This module defines the data types shared by every stage of a build
//! request: signed quotes, chain categories, typed build parameters, the
//! category-tagged build results and the HTTP envelopes wrapping them.

/// API types for HTTP endpoints and request/response envelopes.
pub mod api;
/// Chain names and the execution environment each one belongs to.
pub mod chains;
/// Typed, category-specific build parameters.
pub mod params;
/// EIP-2612 permit typed data handed to clients for signing.
pub mod permit;
/// Signed quotes as issued by the quoting authority.
pub mod quote;
/// Category-tagged results of transaction construction.
pub mod transaction;
/// Utility functions for common type conversions.
pub mod utils;

pub use api::*;
pub use chains::{chain_category, ChainCategory, ChainError, EVM_CHAINS, SUI_CHAINS, SVM_CHAINS};
pub use params::*;
pub use permit::*;
pub use quote::{Quote, SIGNATURE_FIELD};
pub use transaction::*;
pub use utils::{mask_identity, without_0x_prefix};
