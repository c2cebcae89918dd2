use std::str::FromStr;

use anyhow::{Context, Result};
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

use crate::settings::Settings;

/// the effective log level, `debug` forces at least debug output
fn level(settings: &Settings) -> Result<tracing::Level> {
	if settings.debug {
		return Ok(tracing::Level::DEBUG);
	}

	tracing::Level::from_str(settings.log_level.as_str())
		.with_context(|| format!("invalid log level {}", settings.log_level))
}

pub fn setup_logging(settings: &Settings) -> Result<()> {
	let level = level(settings)?;

	let fmt_layer = fmt::layer();

	let filter_layer = EnvFilter::default()
		.add_directive(LevelFilter::from_level(level).into())
		.add_directive("hyper=warn".parse()?)
		.add_directive("reqwest=warn".parse()?);

	let registry = tracing_subscriber::registry().with(filter_layer).with(fmt_layer);

	#[cfg(feature = "console")]
	let registry = registry.with(console_subscriber::spawn());

	registry.init();

	Ok(())
}
