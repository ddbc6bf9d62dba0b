//! Outbound mail through an HTTP relay that accepts `{from, to, subject, text, html}` JSON.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct RelayBody<'a> {
	from: &'a str,
	to: [&'a str; 1],
	subject: &'a str,
	text: &'a str,
	#[serde(skip_serializing_if = "Option::is_none")]
	html: Option<&'a str>,
}

pub async fn send(
	cfg: &docent_config::Notification,
	to: &str,
	subject: &str,
	text_body: &str,
	html_body: Option<&str>,
) -> Result<()> {
	if cfg.api_base.is_empty() {
		return Err(Error::InvalidConfig {
			message: "Mail relay api_base is not configured.".to_string(),
		});
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = RelayBody { from: &cfg.from, to: [to], subject, text: text_body, html: html_body };

	client
		.post(url)
		.headers(crate::build_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}
