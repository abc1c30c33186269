//! API key authentication.

use crate::AdmissionError;
use std::collections::HashSet;
use std::fmt;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Identity of callers that present no key while enforcement is off.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Resolves the identity of a caller from its presented API key.
#[derive(Clone, Default)]
pub struct ApiKeyAuth {
	enabled: bool,
	keys: HashSet<String>,
}

impl fmt::Debug for ApiKeyAuth {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ApiKeyAuth")
			.field("enabled", &self.enabled)
			.field("keys", &self.keys.len())
			.finish()
	}
}

impl ApiKeyAuth {
	pub fn new(enabled: bool, keys: impl IntoIterator<Item = String>) -> Self {
		Self {
			enabled,
			keys: keys.into_iter().collect(),
		}
	}

	/// Accepts every caller.
	pub fn disabled() -> Self {
		Self::default()
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	/// Returns the identity requests are accounted under.
	///
	/// With enforcement on, a missing or unknown key is rejected. With it off,
	/// the presented key (or [`ANONYMOUS_IDENTITY`]) is used as-is.
	pub fn authenticate(&self, presented: Option<&str>) -> Result<String, AdmissionError> {
		let presented = presented.filter(|key| !key.is_empty());

		if !self.enabled {
			return Ok(presented.unwrap_or(ANONYMOUS_IDENTITY).to_string());
		}

		let key = presented.ok_or(AdmissionError::MissingApiKey)?;
		if !self.keys.contains(key) {
			return Err(AdmissionError::InvalidApiKey);
		}
		Ok(key.to_string())
	}
}
