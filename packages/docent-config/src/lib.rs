mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, Conversation, EmbeddingProviderConfig, LlmProviderConfig, Notification,
	Postgres, Providers, Qdrant, Search, Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.collaborator_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "service.collaborator_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if !cfg.providers.completion.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.completion.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.completion.temperature) {
		return Err(Error::Validation {
			message: "providers.completion.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}
	if cfg.providers.completion.max_tokens == 0 {
		return Err(Error::Validation {
			message: "providers.completion.max_tokens must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("completion", &cfg.providers.completion.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !cfg.notification.api_base.is_empty() && cfg.notification.from.trim().is_empty() {
		return Err(Error::Validation {
			message: "notification.from must be non-empty when notification.api_base is set."
				.to_string(),
		});
	}
	if cfg.search.max_top_k == 0 {
		return Err(Error::Validation {
			message: "search.max_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_top_k == 0 || cfg.search.default_top_k > cfg.search.max_top_k {
		return Err(Error::Validation {
			message: "search.default_top_k must be between 1 and search.max_top_k.".to_string(),
		});
	}
	if cfg.search.max_context_chars == 0 {
		return Err(Error::Validation {
			message: "search.max_context_chars must be greater than zero.".to_string(),
		});
	}

	if let Some(turns) = cfg.conversation.max_history_turns
		&& turns == 0
	{
		return Err(Error::Validation {
			message: "conversation.max_history_turns must be greater than zero when set."
				.to_string(),
		});
	}

	if cfg.chunking.chunk_size == 0 {
		return Err(Error::Validation {
			message: "chunking.chunk_size must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.chunk_overlap >= cfg.chunking.chunk_size {
		return Err(Error::Validation {
			message: "chunking.chunk_overlap must be less than chunking.chunk_size.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.notification.api_base = cfg.notification.api_base.trim().to_string();

	if cfg.notification.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.notification.api_key = None;
	}
}
