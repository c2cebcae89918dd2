//! Translates the alerts of a webhook request one by one, dispatches them to
//! gotify and folds the outcomes into a single response.
//!
//! Alerts are independent of each other: a failing alert never stops the ones
//! after it. They are dispatched strictly in order, the next one only after
//! the previous dispatch finished.

use std::sync::Arc;

use futures::{stream, StreamExt};
use http::StatusCode;

use crate::{
	alert::{Alert, Batch, DecodeError},
	gotify::{Dispatch, DispatchError},
	metrics::Metrics,
	notification::{MissingAnnotations, Translator},
};

/// response text for a request without body
pub const NO_CONTENT: &str = "No content sent";

/// what happened to a single alert
#[derive(Debug)]
pub enum AlertOutcome {
	/// accepted by gotify
	Dispatched { index: usize },
	/// not sent because annotations are missing
	Skipped(MissingAnnotations),
	/// gotify couldn't be reached or didn't accept it
	Failed(DispatchError),
}

impl AlertOutcome {
	/// status code this outcome imposes on the response, if any
	fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Dispatched { .. } => None,
			Self::Skipped(_) => Some(StatusCode::BAD_REQUEST),
			Self::Failed(err) => Some(err.status()),
		}
	}

	/// response line for this alert
	fn line(&self) -> String {
		match self {
			Self::Dispatched { index } => format!("Message {index} dispatched"),
			Self::Skipped(missing) => missing.to_string(),
			Self::Failed(err) => err.to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// response to a webhook request
pub struct Reply {
	pub status: StatusCode,
	pub body: String,
}

impl Reply {
	/// the request had no body
	pub fn no_content() -> Self {
		Self { status: StatusCode::OK, body: NO_CONTENT.to_owned() }
	}

	/// the request body couldn't be decoded
	pub fn invalid(err: &DecodeError) -> Self {
		Self { status: StatusCode::BAD_REQUEST, body: err.to_string() }
	}

	/// One line per alert in processing order. The status is 200 unless an
	/// alert failed, then it's the status of the last failed alert.
	pub fn aggregate(outcomes: &[AlertOutcome]) -> Self {
		let status = outcomes
			.iter()
			.fold(StatusCode::OK, |status, outcome| outcome.status().unwrap_or(status));

		let body = outcomes.iter().map(AlertOutcome::line).collect::<Vec<_>>().join("\n");

		Self { status, body }
	}
}

/// Translates and dispatches alerts, counting what happens to them.
pub struct Pipeline {
	translator: Translator,
	dispatcher: Arc<dyn Dispatch>,
	metrics: Metrics,
}

impl Pipeline {
	pub fn new(translator: Translator, dispatcher: Arc<dyn Dispatch>, metrics: Metrics) -> Self {
		Self { translator, dispatcher, metrics }
	}

	pub fn metrics(&self) -> &Metrics {
		&self.metrics
	}

	/// handles all alerts of a batch sequentially, in input order
	pub async fn process(&self, batch: Batch) -> Vec<AlertOutcome> {
		tracing::debug!("detected {} alerts", batch.alerts.len());

		stream::iter(batch.alerts.iter().enumerate())
			.then(move |(index, alert)| self.process_alert(index, alert))
			.collect()
			.await
	}

	async fn process_alert(&self, index: usize, alert: &Alert) -> AlertOutcome {
		self.metrics.alerts_received.inc();
		tracing::debug!("alert {index}");

		let notification = match self.translator.translate(alert) {
			Ok(notification) => notification,
			Err(missing) => {
				tracing::debug!("unable to dispatch alert {index}: {missing}");
				self.metrics.alerts_invalid.inc();
				return AlertOutcome::Skipped(missing);
			}
		};

		match self.dispatcher.dispatch(&notification).await {
			Ok(()) => {
				self.metrics.alerts_processed.inc();
				AlertOutcome::Dispatched { index }
			}
			Err(err) => {
				self.metrics.alerts_failed.inc();
				AlertOutcome::Failed(err)
			}
		}
	}
}
