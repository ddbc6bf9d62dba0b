use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{
		CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct,
		PointsIdsList, Query, QueryPointsBuilder, ScoredPoint, UpsertPointsBuilder, Value,
		Vector, VectorParamsBuilder, VectorsConfigBuilder, point_id::PointIdOptions,
		vectors_config,
	},
};
use uuid::Uuid;

use crate::{Error, Result};

pub const DENSE_VECTOR_NAME: &str = "dense";

/// One chunk ready to be indexed. The id doubles as the `document_chunks.vector_id`.
#[derive(Debug, Clone)]
pub struct ChunkPoint {
	pub vector_id: Uuid,
	pub vector: Vec<f32>,
	pub filename: String,
	pub chunk_sequence: i32,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredVector {
	pub id: String,
	pub score: f32,
}

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &docent_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection when missing; otherwise checks that its dense vector size matches.
	pub async fn ensure_collection(&self) -> Result<()> {
		if !self.client.collection_exists(&self.collection).await? {
			let mut vectors_config = VectorsConfigBuilder::default();

			vectors_config.add_named_vector_params(
				DENSE_VECTOR_NAME,
				VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
			);

			self.client
				.create_collection(
					CreateCollectionBuilder::new(self.collection.clone())
						.vectors_config(vectors_config),
				)
				.await?;

			return Ok(());
		}

		let info = self.client.collection_info(&self.collection).await?;
		let size = info
			.result
			.and_then(|info| info.config)
			.and_then(|config| config.params)
			.and_then(|params| params.vectors_config)
			.and_then(|vectors| vectors.config)
			.and_then(|config| match config {
				vectors_config::Config::ParamsMap(params) =>
					params.map.get(DENSE_VECTOR_NAME).map(|params| params.size),
				vectors_config::Config::Params(_) => None,
			});

		match size {
			Some(size) if size == u64::from(self.vector_dim) => Ok(()),
			Some(size) => Err(Error::InvalidArgument(format!(
				"Qdrant collection {} has vector size {size}, expected {}.",
				self.collection, self.vector_dim
			))),
			None => Err(Error::InvalidArgument(format!(
				"Qdrant collection {} has no {DENSE_VECTOR_NAME:?} vector.",
				self.collection
			))),
		}
	}

	pub async fn search(&self, vector: Vec<f32>, top_k: u32) -> Result<Vec<ScoredVector>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.with_payload(false)
			.limit(u64::from(top_k));
		let response = self.client.query(search).await?;

		Ok(scored_vectors(response.result))
	}

	pub async fn upsert_chunks(&self, chunks: Vec<ChunkPoint>) -> Result<()> {
		if chunks.is_empty() {
			return Ok(());
		}

		let points = chunks
			.into_iter()
			.map(|chunk| {
				let mut payload = Payload::new();

				payload.insert("filename", chunk.filename);
				payload.insert("chunk_sequence", Value::from(i64::from(chunk.chunk_sequence)));
				payload.insert("text", chunk.text);

				let mut vectors = HashMap::new();

				vectors.insert(DENSE_VECTOR_NAME.to_string(), Vector::from(chunk.vector));

				PointStruct::new(chunk.vector_id.to_string(), vectors, payload)
			})
			.collect::<Vec<_>>();

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), points).wait(true))
			.await?;

		Ok(())
	}

	pub async fn delete_points(&self, vector_ids: &[Uuid]) -> Result<()> {
		if vector_ids.is_empty() {
			return Ok(());
		}

		let ids: Vec<PointId> = vector_ids.iter().map(|id| PointId::from(id.to_string())).collect();
		let delete = DeletePointsBuilder::new(self.collection.clone())
			.points(PointsIdsList { ids })
			.wait(true);

		self.client.delete_points(delete).await?;

		Ok(())
	}
}

/// Keeps index order. Points without a usable id cannot be resolved and are counted in a warning.
fn scored_vectors(points: Vec<ScoredPoint>) -> Vec<ScoredVector> {
	let total = points.len();
	let vectors: Vec<ScoredVector> = points
		.into_iter()
		.filter_map(|point| {
			let id = point_id_to_string(point.id.as_ref()?)?;

			Some(ScoredVector { id, score: point.score })
		})
		.collect();
	let dropped = total - vectors.len();

	if dropped > 0 {
		tracing::warn!(dropped, total, "Qdrant returned points without ids.");
	}

	vectors
}

fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match point_id.point_id_options.as_ref()? {
		PointIdOptions::Uuid(id) => Some(id.clone()),
		PointIdOptions::Num(id) => Some(id.to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn point_ids_render_as_strings() {
		let uuid = Uuid::new_v4();

		assert_eq!(point_id_to_string(&PointId::from(uuid.to_string())), Some(uuid.to_string()));
		assert_eq!(point_id_to_string(&PointId::from(42_u64)), Some("42".to_string()));
		assert_eq!(point_id_to_string(&PointId { point_id_options: None }), None);
	}

	#[test]
	fn scored_vectors_skip_points_without_ids_and_keep_order() {
		let first = Uuid::new_v4().to_string();
		let point =
			|id: Option<PointId>, score: f32| ScoredPoint { id, score, ..Default::default() };
		let points = vec![
			point(Some(PointId::from(first.clone())), 0.9),
			point(None, 0.8),
			point(Some(PointId::from(7_u64)), 0.7),
		];
		let vectors = scored_vectors(points);

		assert_eq!(
			vectors.iter().map(|vector| (vector.id.as_str(), vector.score)).collect::<Vec<_>>(),
			vec![(first.as_str(), 0.9), ("7", 0.7)]
		);
	}
}
