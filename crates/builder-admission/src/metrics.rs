//! Request metrics in Prometheus text exposition format.
//!
//! Three families are tracked:
//! - `api_requests_total{api_key,endpoint,method,status}` counter;
//! - `api_request_duration_seconds{api_key,endpoint,method}` histogram;
//! - `rate_limit_exceeded_total{api_key,endpoint}` counter.

use dashmap::DashMap;
use std::fmt::Write;
use std::time::Duration;

/// Upper bounds of the latency histogram buckets, in seconds.
pub const DURATION_BUCKETS: [f64; 9] = [0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RequestLabels {
	api_key: String,
	endpoint: String,
	method: String,
	status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct DurationLabels {
	api_key: String,
	endpoint: String,
	method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RateLimitLabels {
	api_key: String,
	endpoint: String,
}

#[derive(Debug, Clone, Default)]
struct Histogram {
	/// Observations per bucket, not cumulative.
	buckets: [u64; DURATION_BUCKETS.len()],
	count: u64,
	sum: f64,
}

impl Histogram {
	fn observe(&mut self, seconds: f64) {
		if let Some(index) = DURATION_BUCKETS.iter().position(|bound| seconds <= *bound) {
			self.buckets[index] += 1;
		}
		self.count += 1;
		self.sum += seconds;
	}
}

/// Counters and latency histograms of gated requests.
#[derive(Debug, Default)]
pub struct RequestMetrics {
	requests: DashMap<RequestLabels, u64>,
	durations: DashMap<DurationLabels, Histogram>,
	rate_limited: DashMap<RateLimitLabels, u64>,
}

impl RequestMetrics {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one completed request.
	pub fn record_request(
		&self,
		api_key: &str,
		endpoint: &str,
		method: &str,
		status: u16,
		duration: Duration,
	) {
		*self
			.requests
			.entry(RequestLabels {
				api_key: api_key.to_string(),
				endpoint: endpoint.to_string(),
				method: method.to_string(),
				status,
			})
			.or_insert(0) += 1;

		self.durations
			.entry(DurationLabels {
				api_key: api_key.to_string(),
				endpoint: endpoint.to_string(),
				method: method.to_string(),
			})
			.or_default()
			.observe(duration.as_secs_f64());
	}

	/// Records one request rejected by the rate limiter.
	pub fn record_rate_limited(&self, api_key: &str, endpoint: &str) {
		*self
			.rate_limited
			.entry(RateLimitLabels {
				api_key: api_key.to_string(),
				endpoint: endpoint.to_string(),
			})
			.or_insert(0) += 1;
	}

	/// Value of one `api_requests_total` series.
	pub fn request_count(&self, api_key: &str, endpoint: &str, method: &str, status: u16) -> u64 {
		let labels = RequestLabels {
			api_key: api_key.to_string(),
			endpoint: endpoint.to_string(),
			method: method.to_string(),
			status,
		};
		self.requests.get(&labels).map(|count| *count).unwrap_or(0)
	}

	/// Sum of `api_requests_total` over all series of an endpoint.
	pub fn endpoint_request_count(&self, endpoint: &str) -> u64 {
		self.requests
			.iter()
			.filter(|series| series.key().endpoint == endpoint)
			.map(|series| *series.value())
			.sum()
	}

	/// Value of one `rate_limit_exceeded_total` series.
	pub fn rate_limited_count(&self, api_key: &str, endpoint: &str) -> u64 {
		let labels = RateLimitLabels {
			api_key: api_key.to_string(),
			endpoint: endpoint.to_string(),
		};
		self.rate_limited.get(&labels).map(|count| *count).unwrap_or(0)
	}

	/// Renders every series, sorted by labels.
	pub fn render(&self) -> String {
		let mut out = String::new();

		let mut requests: Vec<_> = self
			.requests
			.iter()
			.map(|series| (series.key().clone(), *series.value()))
			.collect();
		requests.sort();
		out.push_str("# HELP api_requests_total Total number of API requests\n");
		out.push_str("# TYPE api_requests_total counter\n");
		for (labels, count) in requests {
			let _ = writeln!(
				out,
				"api_requests_total{{api_key=\"{}\",endpoint=\"{}\",method=\"{}\",status=\"{}\"}} {}",
				escape(&labels.api_key),
				escape(&labels.endpoint),
				escape(&labels.method),
				labels.status,
				count
			);
		}

		let mut durations: Vec<_> = self
			.durations
			.iter()
			.map(|series| (series.key().clone(), series.value().clone()))
			.collect();
		durations.sort_by(|(a, _), (b, _)| a.cmp(b));
		out.push_str("# HELP api_request_duration_seconds Duration of API requests in seconds\n");
		out.push_str("# TYPE api_request_duration_seconds histogram\n");
		for (labels, histogram) in durations {
			let base = format!(
				"api_key=\"{}\",endpoint=\"{}\",method=\"{}\"",
				escape(&labels.api_key),
				escape(&labels.endpoint),
				escape(&labels.method)
			);
			let mut cumulative = 0;
			for (bound, observed) in DURATION_BUCKETS.iter().zip(histogram.buckets.iter()) {
				cumulative += observed;
				let _ = writeln!(
					out,
					"api_request_duration_seconds_bucket{{{},le=\"{}\"}} {}",
					base, bound, cumulative
				);
			}
			let _ = writeln!(
				out,
				"api_request_duration_seconds_bucket{{{},le=\"+Inf\"}} {}",
				base, histogram.count
			);
			let _ = writeln!(out, "api_request_duration_seconds_sum{{{}}} {}", base, histogram.sum);
			let _ = writeln!(out, "api_request_duration_seconds_count{{{}}} {}", base, histogram.count);
		}

		let mut rate_limited: Vec<_> = self
			.rate_limited
			.iter()
			.map(|series| (series.key().clone(), *series.value()))
			.collect();
		rate_limited.sort();
		out.push_str("# HELP rate_limit_exceeded_total Total number of rate limit exceeded events\n");
		out.push_str("# TYPE rate_limit_exceeded_total counter\n");
		for (labels, count) in rate_limited {
			let _ = writeln!(
				out,
				"rate_limit_exceeded_total{{api_key=\"{}\",endpoint=\"{}\"}} {}",
				escape(&labels.api_key),
				escape(&labels.endpoint),
				count
			);
		}

		out
	}
}

/// Escapes a label value.
fn escape(value: &str) -> String {
	value
		.replace('\\', "\\\\")
		.replace('"', "\\\"")
		.replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_counts_requests_per_series() {
		let metrics = RequestMetrics::new();
		metrics.record_request("key-one", "/build", "POST", 200, Duration::from_millis(20));
		metrics.record_request("key-one", "/build", "POST", 200, Duration::from_millis(30));
		metrics.record_request("key-one", "/build", "POST", 429, Duration::from_millis(1));

		assert_eq!(metrics.request_count("key-one", "/build", "POST", 200), 2);
		assert_eq!(metrics.request_count("key-one", "/build", "POST", 429), 1);
		assert_eq!(metrics.request_count("key-one", "/quote", "POST", 200), 0);
		assert_eq!(metrics.endpoint_request_count("/build"), 3);
	}

	#[test]
	fn test_render_histogram_is_cumulative() {
		let metrics = RequestMetrics::new();
		metrics.record_request("anonymous", "/build", "POST", 200, Duration::from_millis(40));
		metrics.record_request("anonymous", "/build", "POST", 200, Duration::from_millis(300));
		metrics.record_request("anonymous", "/build", "POST", 500, Duration::from_secs(20));
		metrics.record_rate_limited("anonymous", "/build");

		let text = metrics.render();
		let base = "api_key=\"anonymous\",endpoint=\"/build\",method=\"POST\"";

		assert!(text.contains(&format!("api_requests_total{{{},status=\"200\"}} 2", base)));
		assert!(text.contains(&format!("api_requests_total{{{},status=\"500\"}} 1", base)));
		assert!(text.contains(&format!("api_request_duration_seconds_bucket{{{},le=\"0.01\"}} 0", base)));
		assert!(text.contains(&format!("api_request_duration_seconds_bucket{{{},le=\"0.05\"}} 1", base)));
		assert!(text.contains(&format!("api_request_duration_seconds_bucket{{{},le=\"0.5\"}} 2", base)));
		assert!(text.contains(&format!("api_request_duration_seconds_bucket{{{},le=\"10\"}} 2", base)));
		assert!(text.contains(&format!("api_request_duration_seconds_bucket{{{},le=\"+Inf\"}} 3", base)));
		assert!(text.contains(&format!("api_request_duration_seconds_count{{{}}} 3", base)));
		assert!(text.contains(
			"rate_limit_exceeded_total{api_key=\"anonymous\",endpoint=\"/build\"} 1"
		));
		assert!(text.contains("# TYPE api_request_duration_seconds histogram"));
	}

	#[test]
	fn test_label_values_are_escaped() {
		let metrics = RequestMetrics::new();
		metrics.record_rate_limited("a\"b", "/x\\y");
		assert!(metrics
			.render()
			.contains(r#"rate_limit_exceeded_total{api_key="a\"b",endpoint="/x\\y"} 1"#));
	}
}
