use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{ChatTurn, ChunkWithDocument, Document, DocumentChunk, InterviewBooking},
};

pub async fn document_exists<'e, E>(executor: E, filename: &str) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let exists: bool =
		sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM documents WHERE filename = $1)")
			.bind(filename)
			.fetch_one(executor)
			.await?;

	Ok(exists)
}

pub async fn insert_document<'e, E>(executor: E, doc: &Document) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO documents (
\tdocument_id,
\tfilename,
\tfile_type,
\tfile_size,
\tcontent_hash,
\tchunking_strategy,
\ttotal_chunks,
\tembedding_model,
\tcreated_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)",
	)
	.bind(doc.document_id)
	.bind(doc.filename.as_str())
	.bind(doc.file_type.as_str())
	.bind(doc.file_size)
	.bind(doc.content_hash.as_str())
	.bind(doc.chunking_strategy.as_str())
	.bind(doc.total_chunks)
	.bind(doc.embedding_model.as_str())
	.bind(doc.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn insert_document_chunk<'e, E>(executor: E, chunk: &DocumentChunk) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO document_chunks (
\tchunk_row_id,
\tdocument_id,
\tchunk_sequence,
\tvector_id,
\ttext_content,
\tchunk_length,
\tcreated_at
)
VALUES ($1,$2,$3,$4,$5,$6,$7)",
	)
	.bind(chunk.chunk_row_id)
	.bind(chunk.document_id)
	.bind(chunk.chunk_sequence)
	.bind(chunk.vector_id)
	.bind(chunk.text_content.as_str())
	.bind(chunk.chunk_length)
	.bind(chunk.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

/// Resolves many vector ids in one round trip. Ids without a chunk row are simply absent from
/// the result.
pub async fn chunks_by_vector_ids<'e, E>(
	executor: E,
	vector_ids: &[Uuid],
) -> Result<Vec<ChunkWithDocument>>
where
	E: PgExecutor<'e>,
{
	if vector_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, ChunkWithDocument>(
		"\
SELECT
\tc.vector_id,
\tc.chunk_sequence,
\tc.text_content,
\tc.chunk_length,
\td.document_id,
\td.filename,
\td.file_type,
\td.chunking_strategy,
\td.embedding_model
FROM document_chunks c
JOIN documents d ON d.document_id = c.document_id
WHERE c.vector_id = ANY($1)",
	)
	.bind(vector_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn append_chat_turn<'e, E>(
	executor: E,
	session_id: &str,
	role: &str,
	text: &str,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query("INSERT INTO chat_turns (session_id, role, text) VALUES ($1,$2,$3)")
		.bind(session_id)
		.bind(role)
		.bind(text)
		.execute(executor)
		.await?;

	Ok(())
}

/// Returns a session's turns oldest first. With `limit`, only the most recent `limit` turns are
/// returned, still oldest first.
pub async fn list_chat_turns<'e, E>(
	executor: E,
	session_id: &str,
	limit: Option<i64>,
) -> Result<Vec<ChatTurn>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, ChatTurn>(
		"\
SELECT turn_id, session_id, role, text, created_at
FROM (
\tSELECT turn_id, session_id, role, text, created_at
\tFROM chat_turns
\tWHERE session_id = $1
\tORDER BY turn_id DESC
\tLIMIT $2
) recent
ORDER BY turn_id ASC",
	)
	.bind(session_id)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn insert_interview_booking<'e, E>(
	executor: E,
	session_id: &str,
	name: &str,
	email: &str,
	interview_at: OffsetDateTime,
) -> Result<InterviewBooking>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, InterviewBooking>(
		"\
INSERT INTO interview_bookings (session_id, name, email, interview_at)
VALUES ($1,$2,$3,$4)
RETURNING booking_id, session_id, name, email, interview_at, created_at, updated_at",
	)
	.bind(session_id)
	.bind(name)
	.bind(email)
	.bind(interview_at)
	.fetch_one(executor)
	.await?;

	Ok(row)
}
