//! data structures for deserializing incoming alerts
use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
/// alert group posted by the alertmanager webhook. Everything but the alerts
/// is ignored.
pub struct Batch {
	#[serde(deserialize_with = "null_as_default")]
	pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Alert {
	#[serde(deserialize_with = "null_as_default")]
	pub annotations: HashMap<String, String>,
	/// usually `firing` or `resolved`
	#[serde(deserialize_with = "null_as_default")]
	pub status: String,
	#[serde(rename = "generatorURL", deserialize_with = "null_as_default")]
	pub generator_url: String,
	/// kept as sent, it is only displayed
	#[serde(deserialize_with = "null_as_default")]
	pub starts_at: String,
}

/// the request body isn't a valid alert group
#[derive(Error, Debug)]
#[error("{0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Decodes a webhook request body. An empty body isn't an error and yields
/// `None`, `null` anywhere stands for an empty value.
pub fn decode(body: &[u8]) -> Result<Option<Batch>, DecodeError> {
	if body.is_empty() {
		return Ok(None);
	}

	let batch: Option<Batch> = serde_json::from_slice(body)?;

	Ok(Some(batch.unwrap_or_default()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
