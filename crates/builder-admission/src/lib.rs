//! Admission control for the builder API.
//!
//! Every request except the health and metrics endpoints passes the
//! [`AdmissionGate`] before any validation runs. The gate authenticates the
//! caller by API key, charges the request against the caller's rate limit
//! window (unless the path is exempt) and records request metrics once the
//! response is known.

pub mod auth;
pub mod metrics;
pub mod rate_limit;

pub use auth::{ApiKeyAuth, ANONYMOUS_IDENTITY, API_KEY_HEADER};
pub use metrics::{RequestMetrics, DURATION_BUCKETS};
pub use rate_limit::{
	now_ms, RateLimitDecision, RateLimitEntry, RateLimitStatus, RateLimitStore, RateLimitSweeper,
};

use builder_config::{AuthConfig, RateLimitConfig};
use builder_types::{mask_identity, APIError};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Paths that skip the gate entirely.
pub const UNGATED_PATHS: &[&str] = &["/health", "/metrics"];

/// Reasons a request is refused admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
	#[error("API key required. Please provide X-API-Key header.")]
	MissingApiKey,
	#[error("Invalid API key")]
	InvalidApiKey,
	#[error("Rate limit exceeded. Please try again later.")]
	RateLimited {
		status: RateLimitStatus,
		retry_after_secs: u64,
	},
}

impl From<AdmissionError> for APIError {
	fn from(err: AdmissionError) -> Self {
		match &err {
			AdmissionError::MissingApiKey | AdmissionError::InvalidApiKey => {
				APIError::unauthorized(err.to_string())
			}
			AdmissionError::RateLimited {
				retry_after_secs, ..
			} => APIError::RateLimited {
				message: err.to_string(),
				retry_after: *retry_after_secs,
			},
		}
	}
}

/// A request that passed the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
	/// Identity the request is accounted under.
	pub identity: String,
	/// Budget after this request; `None` for exempt paths.
	pub rate_limit: Option<RateLimitStatus>,
}

/// Authentication, rate limiting and request metrics in one place.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
	auth: ApiKeyAuth,
	limiter: Arc<RateLimitStore>,
	metrics: Arc<RequestMetrics>,
	exempt_paths: HashSet<String>,
}

impl AdmissionGate {
	pub fn new(
		auth: ApiKeyAuth,
		limiter: Arc<RateLimitStore>,
		metrics: Arc<RequestMetrics>,
		exempt_paths: impl IntoIterator<Item = String>,
	) -> Self {
		Self {
			auth,
			limiter,
			metrics,
			exempt_paths: exempt_paths.into_iter().collect(),
		}
	}

	/// Builds a gate with a fresh rate limit store and metrics registry.
	pub fn from_config(auth: &AuthConfig, rate_limit: &RateLimitConfig) -> Self {
		Self::new(
			ApiKeyAuth::new(auth.enabled, auth.api_keys.iter().cloned()),
			Arc::new(RateLimitStore::new(rate_limit.window_ms, rate_limit.max_requests)),
			Arc::new(RequestMetrics::new()),
			rate_limit.exempt_paths.iter().cloned(),
		)
	}

	pub fn limiter(&self) -> &Arc<RateLimitStore> {
		&self.limiter
	}

	pub fn metrics(&self) -> &Arc<RequestMetrics> {
		&self.metrics
	}

	/// Starts the periodic sweep of expired rate limit windows.
	pub fn spawn_sweeper(&self, interval: Duration) -> RateLimitSweeper {
		self.limiter.spawn_sweeper(interval)
	}

	/// Whether the path skips the gate and its metrics.
	pub fn is_ungated(path: &str) -> bool {
		UNGATED_PATHS.contains(&path)
	}

	/// Whether the path is authenticated but not throttled.
	pub fn is_exempt(&self, path: &str) -> bool {
		self.exempt_paths.contains(path)
	}

	/// Identity a request is reported under before or without admission.
	pub fn reported_identity(presented: Option<&str>) -> &str {
		presented
			.filter(|key| !key.is_empty())
			.unwrap_or(ANONYMOUS_IDENTITY)
	}

	/// Admits or refuses a request to `path` carrying `api_key`.
	pub fn admit(&self, path: &str, api_key: Option<&str>) -> Result<Admitted, AdmissionError> {
		self.admit_at(path, api_key, now_ms())
	}

	pub fn admit_at(
		&self,
		path: &str,
		api_key: Option<&str>,
		now_ms: i64,
	) -> Result<Admitted, AdmissionError> {
		let identity = self.auth.authenticate(api_key).inspect_err(|e| {
			warn!(
				path,
				api_key = %log_label(Self::reported_identity(api_key)),
				"Rejected request: {}", e
			);
		})?;

		if self.is_exempt(path) {
			return Ok(Admitted {
				identity,
				rate_limit: None,
			});
		}

		match self.limiter.check_at(&identity, now_ms) {
			RateLimitDecision::Allowed(status) => Ok(Admitted {
				identity,
				rate_limit: Some(status),
			}),
			RateLimitDecision::Limited(status) => {
				self.metrics.record_rate_limited(&identity, path);
				warn!(path, api_key = %log_label(&identity), "Rate limit exceeded");
				Err(AdmissionError::RateLimited {
					status,
					retry_after_secs: status.retry_after_secs(now_ms),
				})
			}
		}
	}

	/// Records the outcome of a gated request, admitted or not.
	///
	/// Series are labelled with the identity itself so every key keeps its
	/// own counters.
	pub fn record(
		&self,
		identity: &str,
		path: &str,
		method: &str,
		status: u16,
		duration: Duration,
	) {
		self.metrics
			.record_request(identity, path, method, status, duration);
	}
}

/// Label under which an identity appears in logs.
///
/// API keys are reduced to a short prefix; the anonymous identity is kept.
pub fn log_label(identity: &str) -> String {
	if identity == ANONYMOUS_IDENTITY {
		identity.to_string()
	} else {
		mask_identity(identity)
	}
}
