//! Sends notifications to the gotify message api.
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use http::{header::CONTENT_TYPE, StatusCode};
use thiserror::Error;
use url::Url;

use crate::{notification::Notification, settings::Settings};

/// header carrying the gotify application token
const TOKEN_HEADER: &str = "X-Gotify-Key";

#[derive(Error, Debug)]
pub enum DispatchError {
	#[error("failed to serialize notification: {0}")]
	Serialize(#[from] serde_json::Error),
	/// no response was received, includes timeouts
	#[error("{0}")]
	Transport(#[from] reqwest::Error),
	/// gotify answered with something else than 200
	#[error("Gotify Error: {0}")]
	Rejected(StatusCode),
}

impl DispatchError {
	/// status code reported to the alertmanager
	pub fn status(&self) -> StatusCode {
		match self {
			Self::Rejected(status) => *status,
			Self::Serialize(_) | Self::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

/// Delivers a single notification. Implementations don't retry.
#[async_trait]
pub trait Dispatch: Send + Sync {
	async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError>;
}

#[derive(Debug, Clone)]
/// http client for gotify, shared by all requests
pub struct Client {
	client: reqwest::Client,
	endpoint: Url,
	token: String,
}

impl Client {
	pub fn new(endpoint: Url, token: String, timeout: Duration) -> Result<Self> {
		Ok(Self {
			client: reqwest::Client::builder()
				.timeout(timeout)
				.build()
				.context("failed to build reqwest client")?,
			endpoint,
			token,
		})
	}

	pub fn from_settings(settings: &Settings) -> Result<Self> {
		Self::new(settings.endpoint_url()?, settings.gotify_token.clone(), settings.timeout)
	}
}

#[async_trait]
impl Dispatch for Client {
	async fn dispatch(&self, notification: &Notification) -> Result<(), DispatchError> {
		let body = serde_json::to_vec(notification)?;
		tracing::debug!("outbound: {}", String::from_utf8_lossy(&body));

		let response = self
			.client
			.post(self.endpoint.clone())
			.header(CONTENT_TYPE, "application/json")
			.header(TOKEN_HEADER, &self.token)
			.body(body)
			.send()
			.await
			.map_err(|err| {
				tracing::warn!("error dispatching to gotify: {err}");
				err
			})?;

		let status = response.status();
		let body = response.text().await.unwrap_or_default();

		if status != StatusCode::OK {
			tracing::warn!(
				"non-200 response from gotify at {}. code: {status} (enable debug to see body)",
				self.endpoint
			);
			tracing::debug!("gotify response: {body}");
			return Err(DispatchError::Rejected(status));
		}

		tracing::debug!("dispatched, response was {body}");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::net::{SocketAddr, TcpListener};

	use axum::{http::HeaderMap, routing::post, Extension, Json, Router};
	use serde_json::{Map, Value};
	use tokio::sync::mpsc;

	use super::*;

	type Received = (HeaderMap, Value);

	/// starts a fake gotify answering with `status` after `delay`
	fn spawn_gotify(status: StatusCode, delay: Duration) -> (Url, mpsc::UnboundedReceiver<Received>) {
		let (tx, rx) = mpsc::unbounded_channel::<Received>();

		let app = Router::new()
			.route(
				"/message",
				post(
					move |Extension(tx): Extension<mpsc::UnboundedSender<Received>>,
					      headers: HeaderMap,
					      Json(body): Json<Value>| async move {
						tokio::time::sleep(delay).await;
						let _ = tx.send((headers, body));
						(status, "{}")
					},
				),
			)
			.layer(Extension(tx));

		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let addr = listener.local_addr().unwrap();
		let server = axum::Server::from_tcp(listener).unwrap().serve(app.into_make_service());
		tokio::spawn(server);

		(Url::parse(&format!("http://{addr}/message")).unwrap(), rx)
	}

	fn notification() -> Notification {
		Notification {
			title: "DiskFull".to_owned(),
			message: "/ at 99%".to_owned(),
			priority: 7,
			extras: Map::new(),
		}
	}

	#[tokio::test]
	async fn posts_notification() {
		let (endpoint, mut rx) = spawn_gotify(StatusCode::OK, Duration::ZERO);
		let client = Client::new(endpoint, "token".to_owned(), Duration::from_secs(5)).unwrap();

		client.dispatch(&notification()).await.unwrap();

		let (headers, body) = rx.recv().await.unwrap();
		assert_eq!(headers["x-gotify-key"], "token");
		assert_eq!(headers["content-type"], "application/json");
		assert_eq!(body["title"], "DiskFull");
		assert_eq!(body["message"], "/ at 99%");
		assert_eq!(body["priority"], 7);
		assert_eq!(body["extras"], Value::Object(Map::new()));
	}

	#[tokio::test]
	async fn rejected() {
		let (endpoint, _rx) = spawn_gotify(StatusCode::SERVICE_UNAVAILABLE, Duration::ZERO);
		let client = Client::new(endpoint, "token".to_owned(), Duration::from_secs(5)).unwrap();

		let err = client.dispatch(&notification()).await.unwrap_err();
		assert!(matches!(err, DispatchError::Rejected(_)));
		assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
		assert_eq!(err.to_string(), "Gotify Error: 503 Service Unavailable");
	}

	#[tokio::test]
	async fn timeout() {
		let (endpoint, _rx) = spawn_gotify(StatusCode::OK, Duration::from_secs(5));
		let client = Client::new(endpoint, "token".to_owned(), Duration::from_millis(100)).unwrap();

		let err = client.dispatch(&notification()).await.unwrap_err();
		assert!(matches!(err, DispatchError::Transport(ref err) if err.is_timeout()));
		assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
	}

	#[tokio::test]
	async fn connection_refused() {
		let addr: SocketAddr = {
			let listener = TcpListener::bind("127.0.0.1:0").unwrap();
			listener.local_addr().unwrap()
		};
		let endpoint = Url::parse(&format!("http://{addr}/message")).unwrap();
		let client = Client::new(endpoint, "token".to_owned(), Duration::from_secs(5)).unwrap();

		let err = client.dispatch(&notification()).await.unwrap_err();
		assert!(matches!(err, DispatchError::Transport(ref err) if err.is_connect()));
	}
}
