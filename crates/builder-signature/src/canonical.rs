//! Canonical quote serialization.
//!
//! The signer and this service must produce byte-identical payloads for the
//! same logical quote. The canonical form is compact JSON with:
//! - the `signature` field and every top-level `null` field removed;
//! - object keys ordered at every level, integer-like keys first in numeric
//!   order and the remaining keys by UTF-16 code units;
//! - integers wider than 64 bits written as the string `"<digits>n"`;
//! - other numbers written in their shortest round-trip decimal form.

use builder_types::{utils::is_big_integer, SIGNATURE_FIELD};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Canonical JSON text of a quote, excluding its signature.
pub fn canonicalize(fields: &Map<String, Value>) -> String {
	let mut out = String::new();
	write_object(
		&mut out,
		fields
			.iter()
			.filter(|(key, value)| key.as_str() != SIGNATURE_FIELD && !value.is_null()),
	);
	out
}

/// Canonical payload bytes, as hashed for signing.
pub fn canonical_bytes(fields: &Map<String, Value>) -> Vec<u8> {
	canonicalize(fields).into_bytes()
}

fn write_value(out: &mut String, value: &Value) {
	match value {
		Value::Null => out.push_str("null"),
		Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
		Value::Number(number) => write_number(out, number),
		Value::String(text) => write_string(out, text),
		Value::Array(items) => {
			out.push('[');
			for (index, item) in items.iter().enumerate() {
				if index > 0 {
					out.push(',');
				}
				write_value(out, item);
			}
			out.push(']');
		}
		Value::Object(fields) => write_object(out, fields.iter()),
	}
}

fn write_object<'a>(out: &mut String, entries: impl Iterator<Item = (&'a String, &'a Value)>) {
	let mut entries: Vec<_> = entries.collect();
	entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));

	out.push('{');
	for (index, (key, value)) in entries.into_iter().enumerate() {
		if index > 0 {
			out.push(',');
		}
		write_string(out, key);
		out.push(':');
		write_value(out, value);
	}
	out.push('}');
}

fn write_string(out: &mut String, text: &str) {
	out.push_str(&Value::from(text).to_string());
}

fn write_number(out: &mut String, number: &Number) {
	if let Some(unsigned) = number.as_u64() {
		out.push_str(&unsigned.to_string());
	} else if let Some(signed) = number.as_i64() {
		out.push_str(&signed.to_string());
	} else if is_big_integer(number) {
		write_string(out, &format!("{}n", number));
	} else if let Some(float) = number.as_f64() {
		out.push_str(&format_float(float));
	} else {
		out.push_str(&number.to_string());
	}
}

/// Keys that are array indices in the signer's object model.
fn array_index(key: &str) -> Option<u32> {
	if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
		return None;
	}
	if !key.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	key.parse::<u32>().ok().filter(|index| *index < u32::MAX)
}

fn compare_keys(a: &str, b: &str) -> Ordering {
	match (array_index(a), array_index(b)) {
		(Some(x), Some(y)) => x.cmp(&y),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		// UTF-16 code unit order, as the signer sorts.
		(None, None) => a.encode_utf16().cmp(b.encode_utf16()),
	}
}

/// Shortest round-trip decimal form; exponent notation below 1e-6 and from 1e21.
fn format_float(value: f64) -> String {
	if value == 0.0 || !value.is_finite() {
		return "0".to_string();
	}

	let scientific = format!("{:e}", value.abs());
	let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
	let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
	let exponent: i32 = exponent.parse().unwrap_or(0);

	let k = digits.len() as i32;
	let n = exponent + 1;
	let body = if k <= n && n <= 21 {
		format!("{}{}", digits, "0".repeat((n - k) as usize))
	} else if 0 < n && n <= 21 {
		let (int, frac) = digits.split_at(n as usize);
		format!("{}.{}", int, frac)
	} else if -6 < n && n <= 0 {
		format!("0.{}{}", "0".repeat(n.unsigned_abs() as usize), digits)
	} else {
		let (lead, rest) = digits.split_at(1);
		let mantissa = if rest.is_empty() {
			lead.to_string()
		} else {
			format!("{}.{}", lead, rest)
		};
		let exponent = n - 1;
		format!(
			"{}e{}{}",
			mantissa,
			if exponent < 0 { '-' } else { '+' },
			exponent.unsigned_abs()
		)
	};

	if value < 0.0 {
		format!("-{}", body)
	} else {
		body
	}
}
