//! prometheus alertmanager receiver that forwards alerts to gotify
//!
//! Features:
//! - one gotify message per alert, title, message and priority taken from
//!   configurable annotations
//! - optional html rendering with colorized status, link to the alert source
//!   and start time
//! - prometheus metrics about received and forwarded alerts, optionally behind
//!   basic auth

use std::sync::Arc;

use anyhow::{Context, Result};
use settings::Settings;

use crate::{
	alertmanager_webhook_receiver::State, metrics::Metrics, notification::Translator,
	pipeline::Pipeline,
};

mod alert;
mod alertmanager_webhook_receiver;
mod gotify;
mod log;
mod metrics;
mod notification;
mod pipeline;
mod settings;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::global();

	log::setup_logging(settings).context("could not setup logging")?;

	let metrics =
		Metrics::new(&settings.metrics_namespace).context("failed to register prometheus meters")?;
	let gotify = gotify::Client::from_settings(settings).context("failed to setup gotify client")?;

	let state = Arc::new(State {
		pipeline: Pipeline::new(Translator::new(settings), Arc::new(gotify), metrics),
		metrics_auth: settings.metrics_credentials(),
	});

	alertmanager_webhook_receiver::run_receiver(state, settings).await
}
