//! String formatting utilities.
//!
//! Provides hex prefix stripping and masking of identities for log output.

/// Masks an identity for display, keeping only its first four characters.
///
/// API keys are credentials; logs only ever see the masked form.
pub fn mask_identity(identity: &str) -> String {
	if identity.chars().count() <= 4 {
		return "****".to_string();
	}
	let prefix: String = identity.chars().take(4).collect();
	format!("{}****", prefix)
}

/// Removes "0x" prefix from a hex string if present.
///
/// This function removes the "0x" or "0X" prefix from a hex string if present,
/// returning the hex string without prefix.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}
