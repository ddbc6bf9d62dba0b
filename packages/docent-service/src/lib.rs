//! Conversational query orchestration over ingested documents.
//!
//! [`DocentService`] routes each chat turn either to the booking dialog or to grounded Q&A
//! (retrieval fusion, context assembly, completion). Every external system it touches sits
//! behind one of the collaborator traits below so tests can swap in fakes.

pub mod ask;
pub mod booking;
pub mod context;
pub mod defaults;
pub mod ingest;
pub mod retrieval;

mod error;

pub use ask::{AskRequest, AskResponse, Citation};
pub use booking::EmailStatus;
pub use error::{Error, NotifyError, Result};
pub use ingest::{IngestRequest, IngestResponse};
pub use retrieval::{RetrievedHit, SourceDocument};

use std::{
	collections::HashMap, fmt, future::Future, pin::Pin, str::FromStr, sync::Arc, time::Duration,
};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use docent_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, Notification};
use docent_storage::{db::Db, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>>;
}

pub trait Notifier
where
	Self: Send + Sync,
{
	fn send<'a>(
		&'a self,
		cfg: &'a Notification,
		message: &'a EmailMessage,
	) -> BoxFuture<'a, Result<(), NotifyError>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		vector: Vec<f32>,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>>;
}

pub trait MetadataStore
where
	Self: Send + Sync,
{
	/// Resolves all ids in one batched lookup. Unknown ids are absent from the map.
	fn resolve<'a>(
		&'a self,
		vector_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, ChunkMetadata>>>;
}

pub trait BookingStore
where
	Self: Send + Sync,
{
	fn create<'a>(&'a self, booking: &'a NewBooking) -> BoxFuture<'a, Result<BookingRecord>>;
}

pub trait ConversationMemory
where
	Self: Send + Sync,
{
	fn append<'a>(
		&'a self,
		session_id: &'a str,
		role: Role,
		text: &'a str,
	) -> BoxFuture<'a, Result<()>>;

	/// Turns oldest first. `max_turns` keeps only the most recent N.
	fn read<'a>(
		&'a self,
		session_id: &'a str,
		max_turns: Option<u32>,
	) -> BoxFuture<'a, Result<Vec<ConversationTurn>>>;
}

pub trait DocumentStore
where
	Self: Send + Sync,
{
	fn exists<'a>(&'a self, filename: &'a str) -> BoxFuture<'a, Result<bool>>;

	/// Indexes the chunk vectors and persists the document with its chunks.
	fn store<'a>(&'a self, document: &'a NewDocument) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}
}
impl FromStr for Role {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw {
			"user" => Ok(Self::User),
			"assistant" => Ok(Self::Assistant),
			other =>
				Err(Error::Storage { message: format!("Unknown conversation role {other:?}.") }),
		}
	}
}
impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
	pub role: Role,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
	pub id: String,
	pub score: f32,
}

#[derive(Debug, Clone)]
pub struct ChunkMetadata {
	pub document_id: Uuid,
	pub chunk_sequence: i32,
	pub text: String,
	pub length: i32,
	pub document: SourceDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
	pub to: String,
	pub subject: String,
	pub text_body: String,
	pub html_body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
	pub session_id: String,
	pub name: String,
	pub email: String,
	pub interview_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct BookingRecord {
	pub id: i64,
	pub session_id: String,
	pub name: String,
	pub email: String,
	pub interview_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
	pub document_id: Uuid,
	pub filename: String,
	pub file_type: String,
	pub file_size: i64,
	pub content_hash: String,
	pub chunking_strategy: String,
	pub embedding_model: String,
	pub chunks: Vec<NewChunk>,
}

#[derive(Debug, Clone)]
pub struct NewChunk {
	pub vector_id: Uuid,
	pub chunk_sequence: i32,
	pub text: String,
	pub vector: Vec<f32>,
}

#[derive(Clone)]
pub struct Collaborators {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub notifier: Arc<dyn Notifier>,
	pub vectors: Arc<dyn VectorIndex>,
	pub metadata: Arc<dyn MetadataStore>,
	pub bookings: Arc<dyn BookingStore>,
	pub memory: Arc<dyn ConversationMemory>,
	pub documents: Arc<dyn DocumentStore>,
}
impl Collaborators {
	/// HTTP providers plus Postgres and Qdrant backed stores.
	pub fn from_stores(db: Db, qdrant: QdrantStore) -> Self {
		let providers = Arc::new(defaults::HttpProviders);
		let qdrant = Arc::new(qdrant);

		Self {
			embedding: providers.clone(),
			completion: providers.clone(),
			notifier: providers,
			vectors: qdrant.clone(),
			metadata: Arc::new(db.clone()),
			bookings: Arc::new(db.clone()),
			memory: Arc::new(db.clone()),
			documents: Arc::new(defaults::IndexStores { db, qdrant }),
		}
	}
}

pub struct DocentService {
	pub cfg: Config,
	pub collaborators: Collaborators,
}
impl DocentService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		Self::with_collaborators(cfg, Collaborators::from_stores(db, qdrant))
	}

	pub fn with_collaborators(cfg: Config, collaborators: Collaborators) -> Self {
		Self { cfg, collaborators }
	}

	fn collaborator_timeout(&self) -> Duration {
		Duration::from_millis(self.cfg.service.collaborator_timeout_ms)
	}

	/// Runs one collaborator call under the configured timeout.
	async fn bounded<T, F>(&self, collaborator: &'static str, call: F) -> Result<T>
	where
		F: Future<Output = Result<T>>,
	{
		match tokio::time::timeout(self.collaborator_timeout(), call).await {
			Ok(result) => result,
			Err(_) => {
				tracing::error!(collaborator, "Collaborator call timed out.");

				Err(Error::Timeout { collaborator })
			},
		}
	}

	async fn remember(&self, session_id: &str, role: Role, text: &str) -> Result<()> {
		let append = self.collaborators.memory.append(session_id, role, text);

		self.bounded("conversation_memory", append).await
	}
}
