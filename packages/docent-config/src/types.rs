use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub notification: Notification,
	pub search: Search,
	#[serde(default)]
	pub conversation: Conversation,
	pub chunking: Chunking,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Upper bound applied to every collaborator call made while answering a turn.
	#[serde(default = "default_collaborator_timeout_ms")]
	pub collaborator_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub completion: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

/// HTTP mail relay used for booking confirmations. An empty `api_base` disables delivery; sends
/// then fail with a "not configured" error that the booking flow reports inline.
#[derive(Debug, Deserialize)]
pub struct Notification {
	pub api_base: String,
	pub path: String,
	pub api_key: Option<String>,
	pub from: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub default_top_k: u32,
	pub max_top_k: u32,
	pub max_context_chars: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Conversation {
	/// When set, only the most recent N turns of a session are read back into the prompt.
	pub max_history_turns: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct Chunking {
	pub chunk_size: u32,
	pub chunk_overlap: u32,
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
}

fn default_collaborator_timeout_ms() -> u64 {
	30_000
}
