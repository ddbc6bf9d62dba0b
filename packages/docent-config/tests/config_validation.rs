use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use docent_config::{Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn sample_toml_with(section: &str, key: &str, value: Value) -> String {
	let mut root: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let mut table = root.as_table_mut().expect("Template config must be a table.");

	for part in section.split('.') {
		table = table
			.get_mut(part)
			.and_then(Value::as_table_mut)
			.unwrap_or_else(|| panic!("Template config must include [{section}]."));
	}

	table.insert(key.to_string(), value);

	toml::to_string(&root).expect("Failed to render template config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("docent_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_str(payload: String) -> docent_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = docent_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse test config.")
}

fn expect_validation(payload: String, needle: &str) {
	let err = load_str(payload).expect_err("Expected validation error.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");
	assert!(err.to_string().contains(needle), "Unexpected error message: {err}");
}

#[test]
fn sample_config_loads_and_normalizes() {
	let cfg = load_str(SAMPLE_CONFIG_TEMPLATE_TOML.to_string()).expect("Sample config must load.");

	assert_eq!(cfg.search.default_top_k, 5);
	assert_eq!(cfg.search.max_context_chars, 6_000);
	assert_eq!(cfg.conversation.max_history_turns, None);
	assert!(cfg.notification.api_base.is_empty());
	assert_eq!(cfg.notification.api_key, None);
}

#[test]
fn missing_file_reports_read_error() {
	let path = env::temp_dir().join("docent_config_test_missing_file.toml");
	let err = docent_config::load(&path).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	expect_validation(
		sample_toml_with("providers.embedding", "dimensions", Value::Integer(768)),
		"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
	);
}

#[test]
fn default_top_k_must_not_exceed_max() {
	expect_validation(
		sample_toml_with("search", "default_top_k", Value::Integer(51)),
		"search.default_top_k must be between 1 and search.max_top_k.",
	);
}

#[test]
fn chunk_overlap_must_be_smaller_than_chunk_size() {
	expect_validation(
		sample_toml_with("chunking", "chunk_overlap", Value::Integer(800)),
		"chunking.chunk_overlap must be less than chunking.chunk_size.",
	);
}

#[test]
fn history_window_must_be_positive_when_set() {
	expect_validation(
		sample_toml_with("conversation", "max_history_turns", Value::Integer(0)),
		"conversation.max_history_turns must be greater than zero when set.",
	);
}

#[test]
fn blank_completion_api_key_is_rejected() {
	expect_validation(
		sample_toml_with("providers.completion", "api_key", Value::String("  ".to_string())),
		"Provider completion api_key must be non-empty.",
	);
}

#[test]
fn context_budget_must_be_positive() {
	let mut cfg = base_config();

	cfg.search.max_context_chars = 0;

	let err = docent_config::validate(&cfg).expect_err("Expected budget validation error.");

	assert!(err.to_string().contains("search.max_context_chars must be greater than zero."));
}

#[test]
fn history_window_can_be_valid() {
	let mut cfg = base_config();

	cfg.conversation.max_history_turns = Some(20);

	assert!(docent_config::validate(&cfg).is_ok());
}
