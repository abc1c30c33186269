//! Core of the quote transaction builder.
//!
//! The [`BuilderEngine`] runs a request through the fixed pipeline of the
//! service: structural validation, quote signature verification, category
//! and parameter validation, and finally dispatch to the transaction builder
//! of the quotes' chain category. Permit parameter requests share the
//! validation and verification stages and are answered from on-chain token
//! state instead of a builder.

use builder_config::{Config, ConfigError};
use builder_signature::QuoteVerifier;
use builder_types::{
	chain_category, APIError, BuildOutput, ChainCategory, PermitTypedData, Quote, SVM_CHAINS,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod builders;
pub mod permit;
pub mod validation;

/// Concrete builder and token reader implementations
pub mod implementations {
	pub mod alloy;
	pub mod remote;
}

pub use builders::{
	BuildError, BuilderConnections, Dispatcher, EvmTransactionBuilder, SuiTransactionBuilder,
	SvmTransactionBuilder,
};
pub use permit::{PermitError, PermitService, TokenReader};
pub use validation::{BuildRequest, PermitRequest, RequestMode, ValidationError};

use implementations::alloy::AlloyTokenReader;
use implementations::remote::{
	RemoteBuilderClient, RemoteEvmBuilder, RemoteSuiBuilder, RemoteSvmBuilder,
};

/// Errors raised while assembling the engine from configuration.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),
	#[error("Builder setup failed: {0}")]
	Builder(#[from] BuildError),
	#[error("Token reader setup failed: {0}")]
	Permit(#[from] PermitError),
}

/// Validates, verifies and builds quote requests.
#[derive(Clone)]
pub struct BuilderEngine {
	verifier: QuoteVerifier,
	dispatcher: Dispatcher,
	permits: PermitService,
}

impl BuilderEngine {
	pub fn new(verifier: QuoteVerifier, dispatcher: Dispatcher, permits: PermitService) -> Self {
		Self {
			verifier,
			dispatcher,
			permits,
		}
	}

	/// Wires the remote builders and the RPC token reader from configuration.
	///
	/// Solana-family chains without an RPC endpoint get no builder; quotes
	/// from them fail at build time.
	pub fn from_config(config: &Config) -> Result<Self, EngineError> {
		let verifier = QuoteVerifier::new(config.signer_address()?);
		let client = RemoteBuilderClient::new(
			&config.builders.url,
			Duration::from_secs(config.builders.timeout_seconds),
		)?;

		let mut svm: HashMap<String, Arc<dyn SvmTransactionBuilder>> = HashMap::new();
		for chain in SVM_CHAINS {
			match config.rpc.svm_url(chain) {
				Some(url) => {
					svm.insert(
						chain.to_string(),
						Arc::new(RemoteSvmBuilder::new(client.clone(), *chain, url)),
					);
				}
				None => warn!(chain, "No RPC endpoint configured, quotes from this chain cannot be built"),
			}
		}

		let connections = BuilderConnections {
			evm: Arc::new(RemoteEvmBuilder::new(client.clone())),
			svm,
			sui: Arc::new(RemoteSuiBuilder::new(client.clone(), config.rpc.sui.clone())),
		};
		let reader = AlloyTokenReader::new(&config.rpc)?;
		info!(
			backend = client.base_url(),
			evm_chains = ?reader.chain_ids(),
			svm_chains = ?connections.svm.keys().collect::<Vec<_>>(),
			"Transaction builders configured"
		);

		Ok(Self::new(
			verifier,
			Dispatcher::new(connections),
			PermitService::new(Arc::new(reader)),
		))
	}

	pub fn verifier(&self) -> &QuoteVerifier {
		&self.verifier
	}

	/// Handles a `/build` body.
	pub async fn build(&self, body: Value) -> Result<BuildOutput, APIError> {
		let request = validation::parse_build_request(body)?;

		let verification = self.verifier.verify_batch(&request.quotes);
		if !verification.is_valid() {
			let message = format!(
				"Invalid signature for quote(s) at index: {}",
				join_indexes(&verification.invalid_indexes)
			);
			warn!(invalid = ?verification.invalid_indexes, "Rejected quotes with invalid signatures");
			return Err(APIError::invalid_signature(message));
		}

		let category = validation::resolve_category(&request.quotes)?;
		let params = validation::parse_params(category, &request.params)?;

		match request.mode {
			RequestMode::Single => {
				let quote = request.quotes.first().ok_or(APIError::InternalError)?;
				let result = self.dispatcher.build(quote, &params).await.map_err(|e| {
					error!(%category, error = %e, "Transaction build failed");
					APIError::from(e)
				})?;
				Ok(BuildOutput::Transaction(result))
			}
			RequestMode::Batch => {
				let outcomes = self.dispatcher.build_all(&request.quotes, &params).await;
				let mut results = Vec::with_capacity(outcomes.len());
				let mut failures = Vec::new();
				for (index, outcome) in outcomes.into_iter().enumerate() {
					match outcome {
						Ok(result) => results.push(result),
						Err(e) => {
							error!(index, %category, error = %e, "Transaction build failed");
							failures.push((index, e));
						}
					}
				}

				match failures.first() {
					None => Ok(BuildOutput::Transactions(results)),
					Some((_, first)) => {
						let indexes: Vec<usize> = failures.iter().map(|(index, _)| *index).collect();
						Err(APIError::build_failed(format!(
							"Build failed for quote(s) at index: {}: {}",
							join_indexes(&indexes),
							first
						)))
					}
				}
			}
		}
	}

	/// Handles a `/permit-params` body.
	pub async fn permit_params(&self, body: Value) -> Result<PermitTypedData, APIError> {
		let request = validation::parse_permit_request(body)?;
		self.verify_one(&request.quote)?;

		let chain = request.quote.from_chain().unwrap_or_default();
		match chain_category(chain).map_err(ValidationError::from)? {
			ChainCategory::Evm => {}
			category => {
				return Err(APIError::invalid_request(format!(
					"Permits are only available for EVM source chains, got {} chain {}",
					category, chain
				)))
			}
		}

		self.permits
			.permit_params(&request.quote, request.owner, request.deadline)
			.await
			.map_err(|e| log_permit_error("token", e))
	}

	/// Handles a `/hypercore/permit-params` body.
	pub async fn hypercore_permit_params(&self, body: Value) -> Result<PermitTypedData, APIError> {
		let request = validation::parse_hypercore_permit_request(body)?;
		self.verify_one(&request.quote)?;

		self.permits
			.hypercore_permit_params(&request.quote, request.owner)
			.await
			.map_err(|e| log_permit_error("hypercore", e))
	}

	fn verify_one(&self, quote: &Quote) -> Result<(), APIError> {
		if self.verifier.verify(quote) {
			Ok(())
		} else {
			warn!("Rejected permit request with an invalid quote signature");
			Err(APIError::invalid_signature("Invalid signature for quote"))
		}
	}
}

fn log_permit_error(kind: &str, err: PermitError) -> APIError {
	match &err {
		PermitError::Precondition(_) | PermitError::MissingDomain => {
			warn!(kind, error = %err, "Permit request rejected")
		}
		PermitError::NoProvider(_) | PermitError::Rpc(_) => {
			error!(kind, error = %err, "Permit derivation failed")
		}
	}
	APIError::from(err)
}

fn join_indexes(indexes: &[usize]) -> String {
	indexes
		.iter()
		.map(usize::to_string)
		.collect::<Vec<_>>()
		.join(", ")
}
