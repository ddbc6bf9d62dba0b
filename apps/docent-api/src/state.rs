use std::sync::Arc;

use docent_service::DocentService;
use docent_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<DocentService>,
}
impl AppState {
	/// Connects both stores, bootstraps the relational schema and checks the vector collection.
	pub async fn new(config: docent_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		qdrant.ensure_collection().await?;

		Ok(Self::from_service(DocentService::new(config, db, qdrant)))
	}

	pub fn from_service(service: DocentService) -> Self {
		Self { service: Arc::new(service) }
	}
}
