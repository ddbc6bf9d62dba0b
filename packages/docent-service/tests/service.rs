use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use serde_json::Value;
use time::{OffsetDateTime, macros::datetime};
use uuid::Uuid;

use docent_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, Notification};
use docent_service::{
	AskRequest, BookingRecord, BookingStore, BoxFuture, ChunkMetadata, Collaborators,
	CompletionProvider, ConversationMemory, ConversationTurn, DocentService, DocumentStore,
	EmailMessage, EmbeddingProvider, Error, IngestRequest, MetadataStore, NewBooking, NewDocument,
	Notifier, NotifyError, Result, Role, SourceDocument, VectorHit, VectorIndex,
	context::NOT_FOUND_SENTINEL,
};

const CONFIG_TOML: &str = include_str!("fixtures/service_config.toml");
const WORKED_EXAMPLE: &str =
	"Book interview, name Diwash, email diwash@gmail.com, 2 sep 2025 3:30 PM";

#[derive(Default)]
struct CountingEmbedding {
	calls: AtomicUsize,
}
impl EmbeddingProvider for CountingEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let vector = vec![0.25; cfg.dimensions as usize];

		Box::pin(async move { Ok(vec![vector; texts.len()]) })
	}
}

#[derive(Default)]
struct RecordingCompletion {
	prompts: Mutex<Vec<Vec<Value>>>,
	delay: Option<Duration>,
}
impl CompletionProvider for RecordingCompletion {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		self.prompts.lock().unwrap().push(messages.to_vec());

		Box::pin(async move {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			Ok("Refunds are accepted within 30 days [policy.txt#0].".to_string())
		})
	}
}

#[derive(Default)]
struct RecordingNotifier {
	sent: Mutex<Vec<EmailMessage>>,
	failure: Option<String>,
}
impl Notifier for RecordingNotifier {
	fn send<'a>(
		&'a self,
		_cfg: &'a Notification,
		message: &'a EmailMessage,
	) -> BoxFuture<'a, Result<(), NotifyError>> {
		Box::pin(async move {
			if let Some(reason) = &self.failure {
				return Err(NotifyError(reason.clone()));
			}

			self.sent.lock().unwrap().push(message.clone());

			Ok(())
		})
	}
}

#[derive(Default)]
struct FixedVectors {
	hits: Vec<VectorHit>,
	calls: AtomicUsize,
}
impl VectorIndex for FixedVectors {
	fn search<'a>(
		&'a self,
		_vector: Vec<f32>,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let hits = self.hits.iter().take(top_k as usize).cloned().collect();

		Box::pin(async move { Ok(hits) })
	}
}

#[derive(Default)]
struct MapMetadata {
	rows: HashMap<String, ChunkMetadata>,
	unavailable: bool,
}
impl MetadataStore for MapMetadata {
	fn resolve<'a>(
		&'a self,
		vector_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, ChunkMetadata>>> {
		Box::pin(async move {
			if self.unavailable {
				return Err(Error::Storage { message: "connection refused".to_string() });
			}

			Ok(vector_ids
				.iter()
				.filter_map(|id| self.rows.get(id).map(|row| (id.clone(), row.clone())))
				.collect())
		})
	}
}

#[derive(Default)]
struct MemoryBookings {
	records: Mutex<Vec<BookingRecord>>,
}
impl BookingStore for MemoryBookings {
	fn create<'a>(&'a self, booking: &'a NewBooking) -> BoxFuture<'a, Result<BookingRecord>> {
		let mut records = self.records.lock().unwrap();
		let now = OffsetDateTime::now_utc();
		let record = BookingRecord {
			id: records.len() as i64 + 1,
			session_id: booking.session_id.clone(),
			name: booking.name.clone(),
			email: booking.email.clone(),
			interview_at: booking.interview_at,
			created_at: now,
			updated_at: now,
		};

		records.push(record.clone());

		Box::pin(async move { Ok(record) })
	}
}

#[derive(Default)]
struct MemoryTurns {
	sessions: Mutex<HashMap<String, Vec<ConversationTurn>>>,
	unavailable: bool,
}
impl MemoryTurns {
	fn turns(&self, session_id: &str) -> Vec<(Role, String)> {
		self.sessions
			.lock()
			.unwrap()
			.get(session_id)
			.map(|turns| turns.iter().map(|turn| (turn.role, turn.text.clone())).collect())
			.unwrap_or_default()
	}
}
impl ConversationMemory for MemoryTurns {
	fn append<'a>(
		&'a self,
		session_id: &'a str,
		role: Role,
		text: &'a str,
	) -> BoxFuture<'a, Result<()>> {
		if self.unavailable {
			let failure: Result<()> =
				Err(Error::Storage { message: "connection reset".to_string() });

			return Box::pin(async move { failure });
		}

		self.sessions
			.lock()
			.unwrap()
			.entry(session_id.to_string())
			.or_default()
			.push(ConversationTurn { role, text: text.to_string() });

		Box::pin(async { Ok(()) })
	}

	fn read<'a>(
		&'a self,
		session_id: &'a str,
		max_turns: Option<u32>,
	) -> BoxFuture<'a, Result<Vec<ConversationTurn>>> {
		let turns = self.sessions.lock().unwrap().get(session_id).cloned().unwrap_or_default();
		let skip = max_turns.map(|max| turns.len().saturating_sub(max as usize)).unwrap_or(0);

		Box::pin(async move { Ok(turns.into_iter().skip(skip).collect()) })
	}
}

#[derive(Default)]
struct MemoryDocuments {
	stored: Mutex<Vec<NewDocument>>,
}
impl DocumentStore for MemoryDocuments {
	fn exists<'a>(&'a self, filename: &'a str) -> BoxFuture<'a, Result<bool>> {
		let exists = self.stored.lock().unwrap().iter().any(|doc| doc.filename == filename);

		Box::pin(async move { Ok(exists) })
	}

	fn store<'a>(&'a self, document: &'a NewDocument) -> BoxFuture<'a, Result<()>> {
		self.stored.lock().unwrap().push(document.clone());

		Box::pin(async { Ok(()) })
	}
}

#[derive(Default)]
struct Fakes {
	embedding: Arc<CountingEmbedding>,
	completion: Arc<RecordingCompletion>,
	notifier: Arc<RecordingNotifier>,
	vectors: Arc<FixedVectors>,
	metadata: Arc<MapMetadata>,
	bookings: Arc<MemoryBookings>,
	memory: Arc<MemoryTurns>,
	documents: Arc<MemoryDocuments>,
}
impl Fakes {
	fn service(&self) -> DocentService {
		self.service_with(test_config())
	}

	fn service_with(&self, cfg: Config) -> DocentService {
		DocentService::with_collaborators(
			cfg,
			Collaborators {
				embedding: self.embedding.clone(),
				completion: self.completion.clone(),
				notifier: self.notifier.clone(),
				vectors: self.vectors.clone(),
				metadata: self.metadata.clone(),
				bookings: self.bookings.clone(),
				memory: self.memory.clone(),
				documents: self.documents.clone(),
			},
		)
	}

	fn last_prompt(&self) -> Vec<Value> {
		let prompts = self.completion.prompts.lock().unwrap();

		prompts.last().cloned().expect("Completion was not called.")
	}
}

fn test_config() -> Config {
	toml::from_str(CONFIG_TOML).expect("Failed to parse test config.")
}

fn ask(session_id: &str, query: &str, top_k: Option<u32>) -> AskRequest {
	AskRequest { session_id: session_id.to_string(), query: query.to_string(), top_k }
}

fn hit(idx: usize) -> VectorHit {
	VectorHit { id: format!("v-{idx}"), score: 1.0 - idx as f32 * 0.1 }
}

fn metadata(filename: &str, sequence: i32, text: &str) -> ChunkMetadata {
	let document_id = Uuid::new_v4();

	ChunkMetadata {
		document_id,
		chunk_sequence: sequence,
		text: text.to_string(),
		length: text.chars().count() as i32,
		document: SourceDocument {
			id: document_id,
			filename: filename.to_string(),
			file_type: "txt".to_string(),
			chunking_strategy: "fixed".to_string(),
			embedding_model: "test-embed".to_string(),
		},
	}
}

fn user_content(prompt: &[Value]) -> &str {
	prompt.last().and_then(|message| message["content"].as_str()).unwrap_or_default()
}

#[tokio::test]
async fn citations_match_hit_count_for_every_k() {
	for count in 0..=5 {
		let vectors = FixedVectors { hits: (0..count).map(hit).collect(), ..Default::default() };
		let fakes = Fakes { vectors: Arc::new(vectors), ..Default::default() };
		let response = fakes
			.service()
			.ask(ask("s1", "What is the refund policy?", Some(5)))
			.await
			.expect("Ask failed.");

		assert_eq!(response.citations.len(), count, "Citation count for {count} hits.");
		assert!(!response.context_found);
	}
}

#[tokio::test]
async fn grounded_answer_cites_resolved_chunks_and_records_history() {
	let mut rows = HashMap::new();

	rows.insert("v-0".to_string(), metadata("policy.txt", 0, "Refunds within 30 days."));
	rows.insert("v-1".to_string(), metadata("faq.md", 4, "Digital goods are final sale."));

	let fakes = Fakes {
		vectors: Arc::new(FixedVectors { hits: (0..3).map(hit).collect(), ..Default::default() }),
		metadata: Arc::new(MapMetadata { rows, unavailable: false }),
		..Default::default()
	};
	let response = fakes
		.service()
		.ask(ask("s1", "  What is the refund policy?  ", None))
		.await
		.expect("Ask failed.");

	assert!(response.context_found);
	assert_eq!(response.query, "  What is the refund policy?  ");
	assert_eq!(response.answer, "Refunds are accepted within 30 days [policy.txt#0].");

	let cited: Vec<(&str, i32, &str)> = response
		.citations
		.iter()
		.map(|citation| {
			(citation.filename.as_str(), citation.chunk_sequence, citation.vector_id.as_str())
		})
		.collect();

	assert_eq!(cited, vec![("policy.txt", 0, "v-0"), ("faq.md", 4, "v-1"), ("Unknown", 0, "v-2")]);

	let prompt = fakes.last_prompt();

	assert_eq!(prompt.len(), 2);
	assert_eq!(
		user_content(&prompt),
		"Question:\nWhat is the refund policy?\n\nContext:\n[policy.txt#0] Refunds within 30 days.\n\n[faq.md#4] Digital goods are final sale.\n\nPlease answer the question using both the conversation history and context."
	);
	assert_eq!(
		fakes.memory.turns("s1"),
		vec![
			(Role::User, "What is the refund policy?".to_string()),
			(Role::Assistant, response.answer.clone()),
		]
	);
}

#[tokio::test]
async fn sentinel_and_missing_texts_do_not_count_as_context() {
	let mut rows = HashMap::new();

	rows.insert("v-0".to_string(), metadata("gone.txt", 0, NOT_FOUND_SENTINEL));

	let fakes = Fakes {
		vectors: Arc::new(FixedVectors { hits: (0..2).map(hit).collect(), ..Default::default() }),
		metadata: Arc::new(MapMetadata { rows, unavailable: false }),
		..Default::default()
	};
	let response =
		fakes.service().ask(ask("s1", "Anything on refunds?", None)).await.expect("Ask failed.");

	assert!(!response.context_found);
	assert_eq!(response.citations.len(), 2);
	assert!(user_content(&fakes.last_prompt()).contains("Context:\nNo relevant context found."));
}

#[tokio::test]
async fn history_window_limits_prompt_turns() {
	let fakes = Fakes::default();

	for (role, text) in [
		(Role::User, "first"),
		(Role::Assistant, "second"),
		(Role::User, "third"),
		(Role::Assistant, "fourth"),
	] {
		fakes.memory.append("s1", role, text).await.expect("Seeding history failed.");
	}

	let mut cfg = test_config();

	cfg.conversation.max_history_turns = Some(2);

	fakes.service_with(cfg).ask(ask("s1", "And then?", None)).await.expect("Ask failed.");

	let prompt = fakes.last_prompt();
	let roles: Vec<&str> =
		prompt.iter().filter_map(|message| message["role"].as_str()).collect();

	assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
	assert_eq!(prompt[1]["content"], "third");
	assert_eq!(prompt[2]["content"], "fourth");
}

#[tokio::test]
async fn worked_example_books_interview_without_retrieval() {
	let fakes = Fakes::default();
	let response =
		fakes.service().ask(ask("s1", WORKED_EXAMPLE, None)).await.expect("Booking failed.");

	assert!(response.answer.starts_with("Booked interview (ID 1 for Diwash on"));
	assert!(response.answer.contains("Tuesday, 02 September 2025 at 03:30 PM"));
	assert!(response.answer.contains("Confirmation: email_sent."));
	assert!(response.citations.is_empty());
	assert!(!response.context_found);
	assert_eq!(fakes.embedding.calls.load(Ordering::SeqCst), 0);
	assert_eq!(fakes.vectors.calls.load(Ordering::SeqCst), 0);

	let records = fakes.bookings.records.lock().unwrap().clone();

	assert_eq!(records.len(), 1);
	assert_eq!(records[0].name, "Diwash");
	assert_eq!(records[0].email, "diwash@gmail.com");
	assert_eq!(records[0].interview_at, datetime!(2025-09-02 15:30 UTC));

	let sent = fakes.notifier.sent.lock().unwrap().clone();

	assert_eq!(sent.len(), 1);
	assert_eq!(sent[0].to, "diwash@gmail.com");
	assert_eq!(
		fakes.memory.turns("s1"),
		vec![(Role::User, WORKED_EXAMPLE.to_string()), (Role::Assistant, response.answer)]
	);
}

#[tokio::test]
async fn incomplete_booking_reprompts_and_stores_only_the_reply() {
	let fakes = Fakes::default();
	let response = fakes
		.service()
		.ask(ask("s1", "Please schedule an interview for Ana on 3 sep 2025 at 10am", None))
		.await
		.expect("Booking turn failed.");

	assert!(
		response.answer.starts_with(
			"I can help you book an interview. Please provide the following: name, email."
		),
		"Unexpected reprompt: {}",
		response.answer
	);
	assert!(fakes.bookings.records.lock().unwrap().is_empty());
	assert!(fakes.notifier.sent.lock().unwrap().is_empty());
	assert_eq!(fakes.memory.turns("s1"), vec![(Role::Assistant, response.answer)]);
}

#[tokio::test]
async fn email_failure_is_reported_inline() {
	let fakes = Fakes {
		notifier: Arc::new(RecordingNotifier {
			failure: Some("relay refused".to_string()),
			..Default::default()
		}),
		..Default::default()
	};
	let response =
		fakes.service().ask(ask("s1", WORKED_EXAMPLE, None)).await.expect("Booking failed.");

	assert!(response.answer.ends_with("Confirmation: email_failed: relay refused.)"));
	assert_eq!(fakes.bookings.records.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn committed_booking_survives_memory_outage() {
	let fakes = Fakes {
		memory: Arc::new(MemoryTurns { unavailable: true, ..Default::default() }),
		..Default::default()
	};
	let response = fakes
		.service()
		.ask(ask("s1", WORKED_EXAMPLE, None))
		.await
		.expect("Booking must be confirmed once the record is committed.");

	assert!(response.answer.starts_with("Booked interview (ID 1 for Diwash on"));
	assert_eq!(fakes.bookings.records.lock().unwrap().len(), 1);
	assert_eq!(fakes.notifier.sent.lock().unwrap().len(), 1);
	assert!(fakes.memory.turns("s1").is_empty());
}

#[tokio::test]
async fn metadata_outage_degrades_to_unresolved_hits() {
	let fakes = Fakes {
		vectors: Arc::new(FixedVectors { hits: (0..2).map(hit).collect(), ..Default::default() }),
		metadata: Arc::new(MapMetadata { rows: HashMap::new(), unavailable: true }),
		..Default::default()
	};
	let response = fakes
		.service()
		.ask(ask("s1", "What is the refund policy?", None))
		.await
		.expect("Ask failed.");

	assert!(!response.context_found);
	assert!(response.citations.iter().all(|citation| citation.filename == "Unknown"));
	assert_eq!(response.citations.len(), 2);
}

#[tokio::test]
async fn slow_completion_times_out_without_recording_history() {
	let fakes = Fakes {
		completion: Arc::new(RecordingCompletion {
			delay: Some(Duration::from_secs(5)),
			..Default::default()
		}),
		..Default::default()
	};
	let err = fakes
		.service()
		.ask(ask("s1", "What is the refund policy?", None))
		.await
		.expect_err("Expected a timeout.");

	assert!(matches!(err, Error::Timeout { collaborator: "completion" }), "Got {err:?}.");
	assert!(fakes.memory.turns("s1").is_empty());
}

#[tokio::test]
async fn invalid_requests_fail_before_any_collaborator_call() {
	let fakes = Fakes::default();
	let service = fakes.service();

	for req in [
		ask("  ", "What is the refund policy?", None),
		ask("s1", " \n ", None),
		ask("s1", "What is the refund policy?", Some(0)),
		ask("s1", "What is the refund policy?", Some(51)),
	] {
		let err = service.ask(req).await.expect_err("Expected a validation error.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "Got {err:?}.");
	}

	assert_eq!(fakes.embedding.calls.load(Ordering::SeqCst), 0);
	assert!(fakes.memory.turns("s1").is_empty());
}

fn ingest_request(filename: &str, content: &str, strategy: &str) -> IngestRequest {
	IngestRequest {
		filename: filename.to_string(),
		content: content.to_string(),
		chunking_strategy: strategy.to_string(),
	}
}

#[tokio::test]
async fn ingest_stores_one_vector_per_chunk() {
	let fakes = Fakes::default();
	let content = "\
Refunds are accepted within 30 days.
Digital goods are final sale.
Shipping is free over $50.";
	let response = fakes
		.service()
		.ingest(ingest_request("policy.TXT", content, "Fixed"))
		.await
		.expect("Ingest failed.");
	let stored = fakes.documents.stored.lock().unwrap().clone();

	assert_eq!(stored.len(), 1);

	let document = &stored[0];

	assert_eq!(response.document_id, document.document_id);
	assert_eq!(response.total_chunks, document.chunks.len());
	assert_eq!(response.chunking_strategy, "fixed");
	assert_eq!(document.file_type, "txt");
	assert_eq!(document.file_size, content.len() as i64);
	assert_eq!(document.embedding_model, "test-embed");
	assert_eq!(document.content_hash, blake3::hash(content.as_bytes()).to_hex().to_string());
	assert!(document.chunks.len() >= 2);

	for (idx, chunk) in document.chunks.iter().enumerate() {
		assert_eq!(chunk.chunk_sequence, idx as i32);
		assert_eq!(chunk.vector.len(), 4);
		assert!(chunk.text.chars().count() <= 40);
	}
}

#[tokio::test]
async fn ingest_rejects_duplicates_and_bad_input() {
	let fakes = Fakes::default();
	let service = fakes.service();

	service
		.ingest(ingest_request("notes.md", "# Notes\n\nShort.", "recursive"))
		.await
		.expect("First ingest failed.");

	let embeds_after_first = fakes.embedding.calls.load(Ordering::SeqCst);
	let duplicate = service
		.ingest(ingest_request("notes.md", "# Other", "recursive"))
		.await
		.expect_err("Expected a conflict.");

	assert!(matches!(duplicate, Error::Conflict { .. }), "Got {duplicate:?}.");
	assert_eq!(fakes.embedding.calls.load(Ordering::SeqCst), embeds_after_first);

	for req in [
		ingest_request("report.pdf", "text", "fixed"),
		ingest_request("notes.txt", "text", "semantic"),
		ingest_request("blank.txt", " \n\n ", "fixed"),
	] {
		let err = service.ingest(req).await.expect_err("Expected a validation error.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "Got {err:?}.");
	}
}
