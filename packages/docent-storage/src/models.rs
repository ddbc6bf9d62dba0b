use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct Document {
	pub document_id: Uuid,
	pub filename: String,
	pub file_type: String,
	pub file_size: i64,
	pub content_hash: String,
	pub chunking_strategy: String,
	pub total_chunks: i32,
	pub embedding_model: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct DocumentChunk {
	pub chunk_row_id: Uuid,
	pub document_id: Uuid,
	pub chunk_sequence: i32,
	pub vector_id: Uuid,
	pub text_content: String,
	pub chunk_length: i32,
	pub created_at: OffsetDateTime,
}

/// A chunk joined with its owning document, keyed by the chunk's vector id.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChunkWithDocument {
	pub vector_id: Uuid,
	pub chunk_sequence: i32,
	pub text_content: String,
	pub chunk_length: i32,
	pub document_id: Uuid,
	pub filename: String,
	pub file_type: String,
	pub chunking_strategy: String,
	pub embedding_model: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatTurn {
	pub turn_id: i64,
	pub session_id: String,
	pub role: String,
	pub text: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InterviewBooking {
	pub booking_id: i64,
	pub session_id: String,
	pub name: String,
	pub email: String,
	pub interview_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
