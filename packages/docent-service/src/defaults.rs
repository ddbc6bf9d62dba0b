//! Production collaborators: OpenAI-compatible HTTP providers, the mail relay, Qdrant and Postgres.

use std::{collections::HashMap, str::FromStr, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use docent_config::{EmbeddingProviderConfig, LlmProviderConfig, Notification};
use docent_providers::{completion, embedding, mail};
use docent_storage::{
	db::Db,
	models::{Document, DocumentChunk},
	qdrant::{ChunkPoint, QdrantStore},
	queries,
};

use crate::{
	BookingRecord, BookingStore, BoxFuture, ChunkMetadata, CompletionProvider, ConversationMemory,
	ConversationTurn, DocumentStore, EmailMessage, EmbeddingProvider, Error, MetadataStore,
	NewBooking, NewDocument, Notifier, NotifyError, Result, Role, SourceDocument, VectorHit,
	VectorIndex,
};

pub struct HttpProviders;

impl EmbeddingProvider for HttpProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}

impl CompletionProvider for HttpProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(completion::complete(cfg, messages).await?) })
	}
}

impl Notifier for HttpProviders {
	fn send<'a>(
		&'a self,
		cfg: &'a Notification,
		message: &'a EmailMessage,
	) -> BoxFuture<'a, Result<(), NotifyError>> {
		Box::pin(async move {
			mail::send(
				cfg,
				&message.to,
				&message.subject,
				&message.text_body,
				message.html_body.as_deref(),
			)
			.await
			.map_err(|err| NotifyError(err.to_string()))
		})
	}
}

impl VectorIndex for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: Vec<f32>,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		Box::pin(async move {
			let scored = QdrantStore::search(self, vector, top_k).await?;

			Ok(scored.into_iter().map(|hit| VectorHit { id: hit.id, score: hit.score }).collect())
		})
	}
}

impl MetadataStore for Db {
	fn resolve<'a>(
		&'a self,
		vector_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashMap<String, ChunkMetadata>>> {
		Box::pin(async move {
			// Ids that are not UUIDs cannot have a chunk row.
			let by_uuid: HashMap<Uuid, &String> = vector_ids
				.iter()
				.filter_map(|id| Uuid::parse_str(id).ok().map(|uuid| (uuid, id)))
				.collect();
			let uuids: Vec<Uuid> = by_uuid.keys().copied().collect();
			let rows = queries::chunks_by_vector_ids(&self.pool, &uuids).await?;
			let mut resolved = HashMap::with_capacity(rows.len());

			for row in rows {
				let Some(id) = by_uuid.get(&row.vector_id) else {
					continue;
				};

				resolved.insert(
					(*id).clone(),
					ChunkMetadata {
						document_id: row.document_id,
						chunk_sequence: row.chunk_sequence,
						text: row.text_content,
						length: row.chunk_length,
						document: SourceDocument {
							id: row.document_id,
							filename: row.filename,
							file_type: row.file_type,
							chunking_strategy: row.chunking_strategy,
							embedding_model: row.embedding_model,
						},
					},
				);
			}

			Ok(resolved)
		})
	}
}

impl BookingStore for Db {
	fn create<'a>(&'a self, booking: &'a NewBooking) -> BoxFuture<'a, Result<BookingRecord>> {
		Box::pin(async move {
			let row = queries::insert_interview_booking(
				&self.pool,
				&booking.session_id,
				&booking.name,
				&booking.email,
				booking.interview_at,
			)
			.await?;

			Ok(BookingRecord {
				id: row.booking_id,
				session_id: row.session_id,
				name: row.name,
				email: row.email,
				interview_at: row.interview_at,
				created_at: row.created_at,
				updated_at: row.updated_at,
			})
		})
	}
}

impl ConversationMemory for Db {
	fn append<'a>(
		&'a self,
		session_id: &'a str,
		role: Role,
		text: &'a str,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			queries::append_chat_turn(&self.pool, session_id, role.as_str(), text).await?;

			Ok(())
		})
	}

	fn read<'a>(
		&'a self,
		session_id: &'a str,
		max_turns: Option<u32>,
	) -> BoxFuture<'a, Result<Vec<ConversationTurn>>> {
		Box::pin(async move {
			let rows =
				queries::list_chat_turns(&self.pool, session_id, max_turns.map(i64::from)).await?;

			rows.into_iter()
				.map(|row| -> Result<ConversationTurn> {
					Ok(ConversationTurn { role: Role::from_str(&row.role)?, text: row.text })
				})
				.collect()
		})
	}
}

/// Document persistence spanning both stores: vectors go to Qdrant, rows to Postgres.
pub struct IndexStores {
	pub db: Db,
	pub qdrant: Arc<QdrantStore>,
}
impl IndexStores {
	async fn insert_rows(&self, document: &NewDocument) -> docent_storage::Result<()> {
		let now = OffsetDateTime::now_utc();
		let mut tx = self.db.pool.begin().await?;

		queries::insert_document(
			&mut *tx,
			&Document {
				document_id: document.document_id,
				filename: document.filename.clone(),
				file_type: document.file_type.clone(),
				file_size: document.file_size,
				content_hash: document.content_hash.clone(),
				chunking_strategy: document.chunking_strategy.clone(),
				total_chunks: document.chunks.len() as i32,
				embedding_model: document.embedding_model.clone(),
				created_at: now,
			},
		)
		.await?;

		for chunk in &document.chunks {
			queries::insert_document_chunk(
				&mut *tx,
				&DocumentChunk {
					chunk_row_id: Uuid::new_v4(),
					document_id: document.document_id,
					chunk_sequence: chunk.chunk_sequence,
					vector_id: chunk.vector_id,
					text_content: chunk.text.clone(),
					chunk_length: chunk.text.chars().count() as i32,
					created_at: now,
				},
			)
			.await?;
		}

		tx.commit().await?;

		Ok(())
	}
}

impl DocumentStore for IndexStores {
	fn exists<'a>(&'a self, filename: &'a str) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move { Ok(queries::document_exists(&self.db.pool, filename).await?) })
	}

	fn store<'a>(&'a self, document: &'a NewDocument) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.qdrant.ensure_collection().await?;

			let points = document
				.chunks
				.iter()
				.map(|chunk| ChunkPoint {
					vector_id: chunk.vector_id,
					vector: chunk.vector.clone(),
					filename: document.filename.clone(),
					chunk_sequence: chunk.chunk_sequence,
					text: chunk.text.clone(),
				})
				.collect();

			self.qdrant.upsert_chunks(points).await?;

			let Err(err) = self.insert_rows(document).await else {
				return Ok(());
			};
			let vector_ids: Vec<Uuid> =
				document.chunks.iter().map(|chunk| chunk.vector_id).collect();

			// Rows never landed, so the freshly written points would be orphans.
			if let Err(cleanup) = self.qdrant.delete_points(&vector_ids).await {
				tracing::error!(
					error = %cleanup,
					document_id = %document.document_id,
					"Failed to remove points after a failed document insert."
				);
			}

			Err(classify_insert_error(err, &document.filename))
		})
	}
}

/// Maps a concurrent insert of the same filename to a conflict instead of a storage failure.
fn classify_insert_error(err: docent_storage::Error, filename: &str) -> Error {
	match err {
		docent_storage::Error::Sqlx(sqlx::Error::Database(ref db_err))
			if db_err.is_unique_violation() =>
			Error::Conflict { message: format!("Document {filename:?} has already been ingested.") },
		other => Error::from(other),
	}
}
