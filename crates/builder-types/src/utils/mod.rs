//! Utility functions for common type conversions and transformations.
//!
//! This module provides helper functions for numeric fidelity across the JSON
//! boundary and string formatting used throughout the builder.

pub mod conversion;
pub mod formatting;

pub use conversion::{is_big_integer, parse_u256, parse_u64, stringify_big_integers, u256_serde};
pub use formatting::{mask_identity, without_0x_prefix};
