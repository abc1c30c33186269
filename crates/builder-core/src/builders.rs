//! Transaction builders and the dispatcher routing quotes to them.
//!
//! Each chain category has one builder trait. The dispatcher holds one
//! builder per category (one per chain for the Solana family, since every
//! chain there has its own RPC endpoint) and selects it by an explicit match
//! on the category of the quote.

use async_trait::async_trait;
use builder_types::{
	chain_category, APIError, BuildParams, BuildResult, ChainCategory, ChainError,
	EvmBuildParams, EvmTransactionResult, Quote, SuiBuildParams, SuiTransactionResult,
	SvmBuildParams, SvmTransactionResult,
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while building a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
	#[error(transparent)]
	Chain(#[from] ChainError),
	/// No builder is configured for the chain.
	#[error("No transaction builder configured for chain: {0}")]
	NoBuilder(String),
	/// Parameters were validated for a different category than the quote's.
	#[error("Parameters for {params} cannot build a {quote} quote")]
	CategoryMismatch {
		params: ChainCategory,
		quote: ChainCategory,
	},
	/// The backend could not be reached or did not answer in time.
	#[error("Builder backend unreachable: {0}")]
	Transport(String),
	/// The backend refused to build; carries its message.
	#[error("{0}")]
	Backend(String),
	/// The backend answered with a payload that does not decode.
	#[error("Invalid builder response: {0}")]
	InvalidResponse(String),
}

impl From<BuildError> for APIError {
	fn from(err: BuildError) -> Self {
		APIError::build_failed(err.to_string())
	}
}

/// Builds unsigned transactions for quotes originating on EVM chains.
#[async_trait]
pub trait EvmTransactionBuilder: Send + Sync {
	/// Returns calldata for regular quotes and typed data for gasless ones.
	async fn build(
		&self,
		quote: &Quote,
		params: &EvmBuildParams,
	) -> Result<EvmTransactionResult, BuildError>;
}

/// Builds serialized transactions for quotes originating on a Solana-family chain.
#[async_trait]
pub trait SvmTransactionBuilder: Send + Sync {
	async fn build(
		&self,
		quote: &Quote,
		params: &SvmBuildParams,
	) -> Result<SvmTransactionResult, BuildError>;
}

/// Builds serialized transactions for quotes originating on Sui.
#[async_trait]
pub trait SuiTransactionBuilder: Send + Sync {
	async fn build(
		&self,
		quote: &Quote,
		params: &SuiBuildParams,
	) -> Result<SuiTransactionResult, BuildError>;
}

/// Live builder handles, one per category.
#[derive(Clone)]
pub struct BuilderConnections {
	pub evm: Arc<dyn EvmTransactionBuilder>,
	/// Keyed by chain name (`solana`, `fogo`).
	pub svm: HashMap<String, Arc<dyn SvmTransactionBuilder>>,
	pub sui: Arc<dyn SuiTransactionBuilder>,
}

/// Routes quotes to the builder of their chain category.
#[derive(Clone)]
pub struct Dispatcher {
	connections: BuilderConnections,
}

impl Dispatcher {
	pub fn new(connections: BuilderConnections) -> Self {
		Self { connections }
	}

	/// Builds one quote.
	///
	/// The result is stamped with the quote's route type and has every wide
	/// integer rewritten as a decimal string.
	pub async fn build(&self, quote: &Quote, params: &BuildParams) -> Result<BuildResult, BuildError> {
		let chain = quote.from_chain().unwrap_or_default();
		let category = chain_category(chain)?;
		debug!(chain, %category, quote_type = quote.quote_type(), "Dispatching quote");

		let result = match (category, params) {
			(ChainCategory::Evm, BuildParams::Evm(params)) => {
				BuildResult::Evm(self.connections.evm.build(quote, params).await?)
			}
			(ChainCategory::Svm, BuildParams::Svm(params)) => {
				let builder = self
					.connections
					.svm
					.get(chain)
					.ok_or_else(|| BuildError::NoBuilder(chain.to_string()))?;
				BuildResult::Svm(builder.build(quote, params).await?)
			}
			(ChainCategory::Sui, BuildParams::Sui(params)) => {
				BuildResult::Sui(self.connections.sui.build(quote, params).await?)
			}
			(quote_category, params) => {
				return Err(BuildError::CategoryMismatch {
					params: params.category(),
					quote: quote_category,
				})
			}
		};

		let mut result = result.with_quote_type(quote.quote_type().unwrap_or_default());
		result.normalize_numbers();
		Ok(result)
	}

	/// Builds every quote concurrently, keeping input order.
	pub async fn build_all(
		&self,
		quotes: &[Quote],
		params: &BuildParams,
	) -> Vec<Result<BuildResult, BuildError>> {
		join_all(quotes.iter().map(|quote| self.build(quote, params))).await
	}
}
