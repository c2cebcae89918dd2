//! Here we expose prometheus metrics about the bridge, optionally behind basic
//! auth
use std::sync::Arc;

use axum::{
	extract::Extension,
	http::{
		header::{AUTHORIZATION, CONTENT_TYPE, WWW_AUTHENTICATE},
		HeaderMap, StatusCode,
	},
	response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};

use crate::alertmanager_webhook_receiver::State;

/// checks the `Authorization: Basic` header against the credentials
fn authorized(headers: &HeaderMap, (username, password): &(String, String)) -> bool {
	headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Basic "))
		.and_then(|encoded| base64::decode(encoded).ok())
		.and_then(|decoded| String::from_utf8(decoded).ok())
		.map_or(false, |decoded| {
			decoded.split_once(':') == Some((username.as_str(), password.as_str()))
		})
}

pub async fn metrics_handler(
	Extension(state): Extension<Arc<State>>,
	headers: HeaderMap,
) -> Response {
	if let Some(credentials) = &state.metrics_auth {
		if !authorized(&headers, credentials) {
			tracing::warn!("invalid http auth for metrics endpoint");
			return (
				StatusCode::UNAUTHORIZED,
				[(WWW_AUTHENTICATE, "Basic realm=\"metrics\"")],
				"Invalid username or password",
			)
				.into_response();
		}
	}

	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = state.pipeline.metrics().gather();

	if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
		tracing::error!("failed to encode metrics: {err}");
		return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
	}

	([(CONTENT_TYPE, encoder.format_type())], buffer).into_response()
}
