//! prometheus meters for the bridge

use prometheus::{labels, opts, IntCounter, IntGauge, Registry};

#[derive(Clone)]
/// Request and alert counters. Clones share the same meters.
pub struct Metrics {
	/// registry holding all meters below
	registry: Registry,
	/// total number of webhook requests
	pub requests_received: IntCounter,
	/// webhook requests with an undecodable body
	pub requests_invalid: IntCounter,
	/// total number of alerts in decoded requests
	pub alerts_received: IntCounter,
	/// alerts missing the title or message annotation
	pub alerts_invalid: IntCounter,
	/// alerts accepted by gotify
	pub alerts_processed: IntCounter,
	/// alerts gotify didn't accept or couldn't be reached for
	pub alerts_failed: IntCounter,
}

impl Metrics {
	/// construct and register prometheus meters
	pub fn new(namespace: &str) -> Result<Self, prometheus::Error> {
		let registry = Registry::new();

		let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
			let counter = IntCounter::with_opts(opts!(name, help).namespace(namespace))?;
			registry.register(Box::new(counter.clone()))?;
			Ok(counter)
		};

		let requests_received = counter("requests_received", "total number of webhook requests")?;
		let requests_invalid =
			counter("requests_invalid", "number of webhook requests with an invalid body")?;
		let alerts_received = counter("alerts_received", "total number of received alerts")?;
		let alerts_invalid =
			counter("alerts_invalid", "number of alerts missing required annotations")?;
		let alerts_processed =
			counter("alerts_processed", "number of alerts successfully sent to gotify")?;
		let alerts_failed = counter("alerts_failed", "number of alerts failed to send to gotify")?;

		let build_info = IntGauge::with_opts(
			opts!(
				"build_info",
				"build information of the bridge",
				labels! {"version" => env!("CARGO_PKG_VERSION")}
			)
			.namespace(namespace),
		)?;
		build_info.set(1);
		registry.register(Box::new(build_info))?;

		Ok(Self {
			registry,
			requests_received,
			requests_invalid,
			alerts_received,
			alerts_invalid,
			alerts_processed,
			alerts_failed,
		})
	}

	/// collect all meters for encoding
	pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
		self.registry.gather()
	}
}
