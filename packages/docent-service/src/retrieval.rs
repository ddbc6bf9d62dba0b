use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{ChunkMetadata, DocentService, Error, Result, VectorHit, context::NOT_FOUND_SENTINEL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDocument {
	pub id: Uuid,
	pub filename: String,
	pub file_type: String,
	pub chunking_strategy: String,
	pub embedding_model: String,
}

/// A similarity hit fused with its metadata row. `text` and `source_document` are `None` when the
/// vector id could not be resolved, which is an expected state rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedHit {
	pub similarity_score: f32,
	pub vector_id: String,
	pub text: Option<String>,
	pub chunk_sequence: Option<i32>,
	pub chunk_length: Option<i32>,
	pub source_document: Option<SourceDocument>,
}
impl RetrievedHit {
	pub fn unresolved(hit: VectorHit) -> Self {
		Self {
			similarity_score: hit.score,
			vector_id: hit.id,
			text: None,
			chunk_sequence: None,
			chunk_length: None,
			source_document: None,
		}
	}

	pub fn resolved(hit: VectorHit, metadata: ChunkMetadata) -> Self {
		Self {
			similarity_score: hit.score,
			vector_id: hit.id,
			text: Some(metadata.text),
			chunk_sequence: Some(metadata.chunk_sequence),
			chunk_length: Some(metadata.length),
			source_document: Some(metadata.document),
		}
	}

	/// Text usable as prompt context: present and not the not-found placeholder.
	pub fn context_text(&self) -> Option<&str> {
		self.text.as_deref().filter(|text| *text != NOT_FOUND_SENTINEL)
	}

	pub fn has_context(&self) -> bool {
		self.context_text().is_some()
	}

	pub fn filename(&self) -> Option<&str> {
		self.source_document.as_ref().map(|document| document.filename.as_str())
	}
}

impl DocentService {
	/// Embeds the query, searches the vector index and resolves every hit in one metadata lookup.
	/// Hits keep vector-index order. A failed lookup degrades to unresolved hits.
	pub async fn fuse(&self, query: &str, top_k: u32) -> Result<Vec<RetrievedHit>> {
		let cfg = &self.cfg.providers.embedding;
		let texts = [query.to_string()];
		let vector = self
			.bounded("embedding", self.collaborators.embedding.embed(cfg, &texts))
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			})?;
		let expected_dim = self.cfg.storage.qdrant.vector_dim as usize;

		if vector.len() != expected_dim {
			return Err(Error::Provider {
				message: format!(
					"Embedding dimension mismatch. Expected {expected_dim}, got {}.",
					vector.len()
				),
			});
		}

		let scored =
			self.bounded("vector_index", self.collaborators.vectors.search(vector, top_k)).await?;

		if scored.is_empty() {
			return Ok(Vec::new());
		}

		let ids: Vec<String> = scored.iter().map(|hit| hit.id.clone()).collect();
		let resolved =
			match self.bounded("metadata_store", self.collaborators.metadata.resolve(&ids)).await {
				Ok(resolved) => resolved,
				Err(err) => {
					tracing::warn!(
						error = %err,
						hit_count = ids.len(),
						"Metadata lookup failed. Returning unresolved hits."
					);

					HashMap::new()
				},
			};
		let hits: Vec<RetrievedHit> = scored
			.into_iter()
			.map(|hit| match resolved.get(&hit.id).cloned() {
				Some(metadata) => RetrievedHit::resolved(hit, metadata),
				None => RetrievedHit::unresolved(hit),
			})
			.collect();

		tracing::debug!(
			hit_count = hits.len(),
			resolved_count = hits.iter().filter(|hit| hit.source_document.is_some()).count(),
			"Fused retrieval hits."
		);

		Ok(hits)
	}
}
