//! http endpoint receiving alert groups from the alertmanager webhook
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
	extract::Extension,
	http::{HeaderMap, StatusCode},
	routing::any,
	Router,
};
use bytes::Bytes;

use crate::{
	alert,
	pipeline::{Pipeline, Reply},
	settings::Settings,
	telemetry_endpoint,
};

/// shared by all requests
pub struct State {
	pub pipeline: Pipeline,
	/// username and password for the metrics endpoint
	pub metrics_auth: Option<(String, String)>,
}

async fn alertmanager_receiver(
	Extension(state): Extension<Arc<State>>,
	headers: HeaderMap,
	body: Bytes,
) -> (StatusCode, String) {
	let metrics = state.pipeline.metrics();
	metrics.requests_received.inc();

	for (name, value) in headers.iter() {
		tracing::debug!("header {name}: {value:?}");
	}
	tracing::debug!("body: {}", String::from_utf8_lossy(&body));

	let reply = match alert::decode(&body) {
		Ok(None) => Reply::no_content(),
		Ok(Some(batch)) => Reply::aggregate(&state.pipeline.process(batch).await),
		Err(err) => {
			tracing::warn!("failed to deserialize alerts: {err}");
			metrics.requests_invalid.inc();
			Reply::invalid(&err)
		}
	};

	(reply.status, reply.body)
}

pub fn router(state: Arc<State>, webhook_path: &str, metrics_path: &str) -> Router {
	Router::new()
		.route(webhook_path, any(alertmanager_receiver))
		.route(metrics_path, any(telemetry_endpoint::metrics_handler))
		.layer(Extension(state))
}

pub async fn run_receiver(state: Arc<State>, settings: &Settings) -> Result<()> {
	let addr = settings.to_socket_addr();
	let app = router(state, &settings.webhook_path, &settings.metrics_path);

	tracing::info!(
		"starting {}server on http://{addr}{} translating to {}",
		if settings.debug { "debug " } else { "" },
		settings.webhook_path,
		settings.gotify_endpoint
	);

	axum::Server::try_bind(&addr)
		.with_context(|| format!("can't bind to {addr}"))?
		.serve(app.into_make_service())
		.await
		.context("webhook receiver crashed")?;

	Ok(())
}
