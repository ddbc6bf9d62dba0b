use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docent_chunking::{ChunkingConfig, ChunkingStrategy};

use crate::{DocentService, Error, NewChunk, NewDocument, Result};

const SUPPORTED_EXTENSIONS: [&str; 2] = ["txt", "md"];

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
	pub filename: String,
	pub content: String,
	pub chunking_strategy: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
	pub document_id: Uuid,
	pub filename: String,
	pub total_chunks: usize,
	pub chunking_strategy: String,
}

impl DocentService {
	pub async fn ingest(&self, req: IngestRequest) -> Result<IngestResponse> {
		let filename = req.filename.trim();
		let file_type = file_type(filename)?;
		let strategy: ChunkingStrategy = req
			.chunking_strategy
			.parse()
			.map_err(|err: docent_chunking::UnknownStrategy| Error::InvalidRequest { message: err.to_string() })?;
		let chunking = ChunkingConfig {
			chunk_size: self.cfg.chunking.chunk_size as usize,
			chunk_overlap: self.cfg.chunking.chunk_overlap as usize,
		};
		let chunks = docent_chunking::split_text(&req.content, strategy, &chunking);

		if chunks.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Document content produced no chunks.".to_string(),
			});
		}
		if self.collaborators.documents.exists(filename).await? {
			return Err(Error::Conflict {
				message: format!("Document {filename:?} has already been ingested."),
			});
		}

		let embedding_cfg = &self.cfg.providers.embedding;
		let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
		let vectors = self.collaborators.embedding.embed(embedding_cfg, &texts).await?;

		if vectors.len() != chunks.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding count mismatch. Expected {}, got {}.",
					chunks.len(),
					vectors.len()
				),
			});
		}

		let expected_dim = self.cfg.storage.qdrant.vector_dim as usize;

		if let Some(vector) = vectors.iter().find(|vector| vector.len() != expected_dim) {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch. Expected {expected_dim}, got {}.",
					vector.len()
				),
			});
		}

		let document = NewDocument {
			document_id: Uuid::new_v4(),
			filename: filename.to_string(),
			file_type,
			file_size: req.content.len() as i64,
			content_hash: blake3::hash(req.content.as_bytes()).to_hex().to_string(),
			chunking_strategy: strategy.as_str().to_string(),
			embedding_model: embedding_cfg.model.clone(),
			chunks: chunks
				.into_iter()
				.zip(vectors)
				.map(|(chunk, vector)| NewChunk {
					vector_id: Uuid::new_v4(),
					chunk_sequence: chunk.chunk_index,
					text: chunk.text,
					vector,
				})
				.collect(),
		};

		self.collaborators.documents.store(&document).await?;

		tracing::info!(
			document_id = %document.document_id,
			filename,
			total_chunks = document.chunks.len(),
			chunking_strategy = %strategy,
			"Document ingested."
		);

		Ok(IngestResponse {
			document_id: document.document_id,
			filename: document.filename,
			total_chunks: document.chunks.len(),
			chunking_strategy: document.chunking_strategy,
		})
	}
}

/// Lowercased extension of a supported document.
fn file_type(filename: &str) -> Result<String> {
	if filename.is_empty() {
		return Err(Error::InvalidRequest { message: "filename must be non-empty.".to_string() });
	}

	let extension = Path::new(filename)
		.extension()
		.and_then(|ext| ext.to_str())
		.map(str::to_ascii_lowercase)
		.unwrap_or_default();

	if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
		return Err(Error::InvalidRequest {
			message: format!(
				"Unsupported file type {extension:?}. Supported: {}.",
				SUPPORTED_EXTENSIONS.join(", ")
			),
		});
	}

	Ok(extension)
}
