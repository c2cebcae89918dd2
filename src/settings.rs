use std::{
	net::{IpAddr, SocketAddr},
	time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::{Arg, Command};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use url::Url;

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// path suffix of the gotify message api
const MESSAGE_SUFFIX: &str = "/message";

/// environment variables of earlier releases and the key each one sets, later
/// entries win
const LEGACY_ENVIRONMENT: &[(&str, &str)] = &[
	("SUMMARY_ANNOTATION", "message_annotation"),
	("AUTH_USERNAME", "metrics_auth_username"),
	("NUT_EXPORTER_WEB_AUTH_PASSWORD", "metrics_auth_password"),
	("AUTH_PASSWORD", "metrics_auth_password"),
];

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	/// full url of the gotify message endpoint
	pub gotify_endpoint: String,
	/// application token sent as `X-Gotify-Key`
	pub gotify_token: String,
	pub bind_address: IpAddr,
	pub port: u16,
	/// path the alertmanager webhook is served on
	pub webhook_path: String,
	/// timeout of a single request to gotify
	#[serde_as(as = "DurationSecondsWithFrac<f64>")]
	pub timeout: Duration,
	pub title_annotation: String,
	pub message_annotation: String,
	pub priority_annotation: String,
	pub default_priority: i64,
	/// render alerts as html with colorized status, start time and source link
	pub extended_details: bool,
	pub metrics_namespace: String,
	pub metrics_path: String,
	pub metrics_auth_username: String,
	pub metrics_auth_password: String,
	/// log inbound requests and outbound payloads
	pub debug: bool,
	pub log_level: String,
}

impl Settings {
	pub fn global() -> &'static Self {
		SETTINGS.get_or_init(|| {
			match Self::load().context("failed to load config and command line arguments") {
				Ok(settings) => settings,
				Err(err) => {
					// tracing wasn't setup yet
					panic!("{:#?}", err);
				}
			}
		})
	}

	fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args(&[
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
				Arg::new("debug")
					.help("log inbound requests and outbound notifications")
					.long("debug"),
			])
			.get_matches();

		let config_path = opts.value_of("config").unwrap_or("./config.yaml");

		let builder = Self::defaults()?
			.add_source(File::with_name(config_path).required(false))
			.add_source(Environment::default().try_parsing(true));

		let conf = legacy_environment(builder, |name| std::env::var(name).ok())?
			.build()
			.context("can't load config")?;

		let mut settings: Settings = conf.try_deserialize().context("can't load config")?;

		if let Some(level) = opts.value_of("level") {
			settings.log_level = level.to_string();
		}
		if opts.is_present("debug") {
			settings.debug = true;
		}

		settings.validate()?;

		Ok(settings)
	}

	/// builder preloaded with the default value of every key except the gotify
	/// token, which has to be provided
	fn defaults() -> Result<ConfigBuilder<DefaultState>> {
		Config::builder()
			.set_default("gotify_endpoint", "http://127.0.0.1:80/message")?
			.set_default("bind_address", "0.0.0.0")?
			.set_default("port", 8080)?
			.set_default("webhook_path", "/gotify_webhook")?
			.set_default("timeout", 5.0)?
			.set_default("title_annotation", "description")?
			.set_default("message_annotation", "summary")?
			.set_default("priority_annotation", "priority")?
			.set_default("default_priority", 5)?
			.set_default("extended_details", false)?
			.set_default("metrics_namespace", "alertmanager_gotify_bridge")?
			.set_default("metrics_path", "/metrics")?
			.set_default("metrics_auth_username", "")?
			.set_default("metrics_auth_password", "")?
			.set_default("debug", false)?
			.set_default("log_level", "info")
			.context("invalid default settings")
	}

	/// checks the token and normalizes the gotify endpoint
	fn validate(&mut self) -> Result<()> {
		if self.gotify_token.is_empty() {
			bail!("the token for the gotify api must be set (GOTIFY_TOKEN)");
		}

		self.gotify_endpoint = normalize_endpoint(&self.gotify_endpoint);
		self.endpoint_url()?;

		Ok(())
	}

	/// the parsed gotify message endpoint
	pub fn endpoint_url(&self) -> Result<Url> {
		Url::parse(&self.gotify_endpoint)
			.with_context(|| format!("invalid gotify endpoint {}", self.gotify_endpoint))
	}

	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}

	/// credentials protecting the metrics endpoint, only if both are set
	pub fn metrics_credentials(&self) -> Option<(String, String)> {
		if self.metrics_auth_username.is_empty() || self.metrics_auth_password.is_empty() {
			return None;
		}

		Some((self.metrics_auth_username.clone(), self.metrics_auth_password.clone()))
	}
}

/// Sets keys from legacy environment variables. A key whose current variable
/// (the upper case key) is set keeps that value.
fn legacy_environment(
	mut builder: ConfigBuilder<DefaultState>,
	var: impl Fn(&str) -> Option<String>,
) -> Result<ConfigBuilder<DefaultState>> {
	for (legacy, key) in LEGACY_ENVIRONMENT {
		if var(&key.to_uppercase()).is_some() {
			continue;
		}

		if let Some(value) = var(legacy) {
			builder = builder.set_override(*key, value)?;
		}
	}

	Ok(builder)
}

/// appends `/message` to an endpoint that doesn't end with it
fn normalize_endpoint(endpoint: &str) -> String {
	if endpoint.ends_with(MESSAGE_SUFFIX) {
		return endpoint.to_owned();
	}

	let normalized = match endpoint.strip_suffix('/') {
		Some(base) => format!("{base}{MESSAGE_SUFFIX}"),
		None => format!("{endpoint}{MESSAGE_SUFFIX}"),
	};

	// tracing isn't setup yet
	eprintln!(
		"WARNING: {MESSAGE_SUFFIX} not at the end of the gotify endpoint ({endpoint}), using {normalized}"
	);

	normalized
}
