//! Chain classification.
//!
//! Every chain the service builds for belongs to exactly one execution
//! environment. The partition is maintained by hand; a chain missing from it
//! is rejected rather than mapped to a default.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Chains executing EVM bytecode.
pub const EVM_CHAINS: &[&str] = &[
	"ethereum",
	"bsc",
	"polygon",
	"avalanche",
	"arbitrum",
	"optimism",
	"base",
	"unichain",
	"linea",
	"sonic",
	"hyperevm",
	"monad",
];

/// Solana-family chains.
pub const SVM_CHAINS: &[&str] = &["solana", "fogo"];

/// Move-based chains.
pub const SUI_CHAINS: &[&str] = &["sui"];

/// Execution environment a chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainCategory {
	/// Ethereum virtual machine chains.
	Evm,
	/// Solana virtual machine chains.
	Svm,
	/// Sui Move virtual machine.
	Sui,
}

impl ChainCategory {
	/// Wire name of the category, as used in `chainCategory` fields.
	pub fn as_str(&self) -> &'static str {
		match self {
			ChainCategory::Evm => "evm",
			ChainCategory::Svm => "svm",
			ChainCategory::Sui => "sui",
		}
	}

	/// Chain names belonging to this category.
	pub fn chains(&self) -> &'static [&'static str] {
		match self {
			ChainCategory::Evm => EVM_CHAINS,
			ChainCategory::Svm => SVM_CHAINS,
			ChainCategory::Sui => SUI_CHAINS,
		}
	}
}

impl fmt::Display for ChainCategory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Errors raised while classifying a chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
	/// The chain is not part of any category.
	#[error("Unsupported chain: {0}")]
	Unsupported(String),
}

/// Resolves the execution environment of a chain name.
///
/// Names are matched exactly; there is no fallback category.
pub fn chain_category(chain: &str) -> Result<ChainCategory, ChainError> {
	[ChainCategory::Evm, ChainCategory::Svm, ChainCategory::Sui]
		.into_iter()
		.find(|category| category.chains().contains(&chain))
		.ok_or_else(|| ChainError::Unsupported(chain.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashSet;

	#[test]
	fn test_classifies_every_configured_chain() {
		for chain in EVM_CHAINS {
			assert_eq!(chain_category(chain).unwrap(), ChainCategory::Evm);
		}
		for chain in SVM_CHAINS {
			assert_eq!(chain_category(chain).unwrap(), ChainCategory::Svm);
		}
		for chain in SUI_CHAINS {
			assert_eq!(chain_category(chain).unwrap(), ChainCategory::Sui);
		}
	}

	#[test]
	fn test_partition_is_disjoint() {
		let mut seen = HashSet::new();
		for chain in EVM_CHAINS.iter().chain(SVM_CHAINS).chain(SUI_CHAINS) {
			assert!(seen.insert(*chain), "{} appears in more than one category", chain);
		}
	}

	#[test]
	fn test_unknown_chain_is_rejected() {
		for chain in ["hypercore", "bitcoin", "", "Solana", "ethereum "] {
			assert_eq!(
				chain_category(chain),
				Err(ChainError::Unsupported(chain.to_string()))
			);
		}
	}

	#[test]
	fn test_category_wire_names() {
		assert_eq!(serde_json::to_string(&ChainCategory::Svm).unwrap(), "\"svm\"");
		assert_eq!(ChainCategory::Sui.to_string(), "sui");
	}
}
