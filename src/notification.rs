//! Translates alerts into gotify messages.
//!
//! In extended mode the message is html with a colorized status, a link to the
//! alert's generator and its start time. The html rendering and the click url
//! are announced to gotify clients through the message extras.

use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::{alert::Alert, settings::Settings};

/// number of leading characters of `startsAt` shown in extended mode
const TIMESTAMP_LEN: usize = 19;

/// body of a `POST /message` request to gotify
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
	pub title: String,
	pub message: String,
	pub priority: i64,
	pub extras: Map<String, Value>,
}

/// alert lacks annotations needed for title or message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing annotation: {}", .0.join(", "))]
pub struct MissingAnnotations(pub Vec<String>);

/// Which annotations an alert is translated from and how it is rendered.
#[derive(Debug, Clone)]
pub struct Translator {
	pub title_annotation: String,
	pub message_annotation: String,
	pub priority_annotation: String,
	pub default_priority: i64,
	pub extended_details: bool,
}

impl Translator {
	pub fn new(settings: &Settings) -> Self {
		Self {
			title_annotation: settings.title_annotation.clone(),
			message_annotation: settings.message_annotation.clone(),
			priority_annotation: settings.priority_annotation.clone(),
			default_priority: settings.default_priority,
			extended_details: settings.extended_details,
		}
	}

	/// Builds the gotify message for an alert. Fails if the title or the
	/// message annotation is missing, naming every missing one.
	pub fn translate(&self, alert: &Alert) -> Result<Notification, MissingAnnotations> {
		let mut notification = Notification {
			title: String::new(),
			message: String::new(),
			priority: self.priority(alert),
			extras: Map::new(),
		};

		if self.extended_details {
			notification.extras.insert(
				"client::display".to_owned(),
				json!({ "contentType": "text/html" }),
			);

			match alert.status.as_str() {
				"firing" => {
					notification.message.push_str(
						"<font style='color: #b31e00;' data-mx-color='#b31e00'>FIRING</font><br/> ",
					);
					notification.title.push_str("[FIR] ");
				}
				"resolved" => {
					notification.message.push_str(
						"<font style='color: #00b339;' data-mx-color='#00b339'>RESOLVED</font><br/> ",
					);
					notification.title.push_str("[RES] ");
				}
				_ => {}
			}
		}

		let title = alert.annotations.get(&self.title_annotation);
		let message = alert.annotations.get(&self.message_annotation);

		let (title, message) = match (title, message) {
			(Some(title), Some(message)) => (title, message),
			(title, message) => {
				let missing = [(title, &self.title_annotation), (message, &self.message_annotation)]
					.into_iter()
					.filter(|(value, _)| value.is_none())
					.map(|(_, name)| name.clone())
					.collect();

				return Err(MissingAnnotations(missing));
			}
		};

		tracing::debug!("title: {title}, message: {message}, priority: {}", notification.priority);

		notification.title.push_str(title);
		notification.message.push_str(message);

		if self.extended_details {
			if alert.generator_url.starts_with("http") {
				notification
					.message
					.push_str(&format!("<br/><a href='{}'>go to source</a>", alert.generator_url));
				notification.extras.insert(
					"client::notification".to_owned(),
					json!({ "click": { "url": alert.generator_url } }),
				);
			}

			if !alert.starts_at.is_empty() {
				let created: String = alert.starts_at.chars().take(TIMESTAMP_LEN).collect();
				notification.message.push_str(&format!(
					"<br/><br/><i><font style='color: #999999;' data-mx-color='#999999'> alert created at: {created}</font></i><br/>"
				));
			}
		}

		Ok(notification)
	}

	/// the priority annotation if it is an integer, the default otherwise
	fn priority(&self, alert: &Alert) -> i64 {
		alert
			.annotations
			.get(&self.priority_annotation)
			.and_then(|priority| priority.parse().ok())
			.unwrap_or(self.default_priority)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	pub(crate) fn translator(extended_details: bool) -> Translator {
		Translator {
			title_annotation: "description".to_owned(),
			message_annotation: "summary".to_owned(),
			priority_annotation: "priority".to_owned(),
			default_priority: 5,
			extended_details,
		}
	}

	pub(crate) fn alert(annotations: &[(&str, &str)]) -> Alert {
		Alert {
			annotations: annotations
				.iter()
				.map(|(key, value)| (key.to_string(), value.to_string()))
				.collect(),
			status: "firing".to_owned(),
			generator_url: "http://prometheus:9090/graph?g0.expr=up".to_owned(),
			starts_at: "2022-06-01T12:30:45.123456789Z".to_owned(),
		}
	}

	#[test]
	fn plain() {
		let notification = translator(false)
			.translate(&alert(&[("description", "DiskFull"), ("summary", "/ at 99%")]))
			.unwrap();

		assert_eq!(
			notification,
			Notification {
				title: "DiskFull".to_owned(),
				message: "/ at 99%".to_owned(),
				priority: 5,
				extras: Map::new(),
			}
		);
	}

	#[test]
	fn priority_annotation() {
		let translator = translator(false);
		let priority = |value: &str| {
			translator
				.translate(&alert(&[("description", "t"), ("summary", "m"), ("priority", value)]))
				.unwrap()
				.priority
		};

		assert_eq!(priority("8"), 8);
		assert_eq!(priority("-2"), -2);
		assert_eq!(priority("high"), 5);
		assert_eq!(priority(" 8"), 5);
		assert_eq!(priority(""), 5);
	}

	#[test]
	fn missing_annotations() {
		let translator = translator(false);

		let err = translator.translate(&alert(&[("summary", "m")])).unwrap_err();
		assert_eq!(err.to_string(), "Missing annotation: description");

		let err = translator.translate(&alert(&[("description", "t")])).unwrap_err();
		assert_eq!(err.to_string(), "Missing annotation: summary");

		let err = translator.translate(&alert(&[("priority", "1")])).unwrap_err();
		assert_eq!(err.to_string(), "Missing annotation: description, summary");
	}

	#[test]
	fn extended_resolved() {
		let mut alert = alert(&[("description", "DiskFull"), ("summary", "/ at 60%")]);
		alert.status = "resolved".to_owned();

		let notification = translator(true).translate(&alert).unwrap();

		assert_eq!(notification.title, "[RES] DiskFull");
		assert_eq!(
			notification.message,
			"<font style='color: #00b339;' data-mx-color='#00b339'>RESOLVED</font><br/> / at 60%\
			<br/><a href='http://prometheus:9090/graph?g0.expr=up'>go to source</a>\
			<br/><br/><i><font style='color: #999999;' data-mx-color='#999999'> alert created at: 2022-06-01T12:30:45</font></i><br/>"
		);
		assert_eq!(notification.extras["client::display"], json!({ "contentType": "text/html" }));
		assert_eq!(
			notification.extras["client::notification"],
			json!({ "click": { "url": "http://prometheus:9090/graph?g0.expr=up" } })
		);
	}

	#[test]
	fn extended_firing_without_link() {
		let mut alert = alert(&[("description", "DiskFull"), ("summary", "/ at 99%")]);
		alert.generator_url = "prometheus:9090/graph".to_owned();
		alert.starts_at = String::new();

		let notification = translator(true).translate(&alert).unwrap();

		assert_eq!(notification.title, "[FIR] DiskFull");
		assert_eq!(
			notification.message,
			"<font style='color: #b31e00;' data-mx-color='#b31e00'>FIRING</font><br/> / at 99%"
		);
		assert!(!notification.extras.contains_key("client::notification"));
	}

	#[test]
	fn extended_unknown_status() {
		let mut alert = alert(&[("description", "DiskFull"), ("summary", "/ at 99%")]);
		alert.status = "pending".to_owned();
		alert.starts_at = "2022-06-01".to_owned();

		let notification = translator(true).translate(&alert).unwrap();

		assert_eq!(notification.title, "DiskFull");
		assert!(notification.message.starts_with("/ at 99%<br/><a href="));
		assert!(notification.message.contains("alert created at: 2022-06-01</font>"));
	}

	#[test]
	fn serialized_payload() {
		let notification = translator(true)
			.translate(&alert(&[("description", "t"), ("summary", "m"), ("priority", "2")]))
			.unwrap();

		let value = serde_json::to_value(&notification).unwrap();
		assert_eq!(value["title"], "[FIR] t");
		assert_eq!(value["priority"], 2);
		assert_eq!(value["extras"]["client::display"]["contentType"], "text/html");
	}
}
