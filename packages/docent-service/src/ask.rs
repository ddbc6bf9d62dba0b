use serde::{Deserialize, Serialize};

use docent_domain::intent::{self, Intent};

use crate::{
	DocentService, Error, Result, Role,
	context::{self, UNKNOWN_FILENAME},
	retrieval::RetrievedHit,
};

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
	pub session_id: String,
	pub query: String,
	/// Falls back to `search.default_top_k`.
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
	pub answer: String,
	pub citations: Vec<Citation>,
	pub context_found: bool,
	pub query: String,
}
impl AskResponse {
	pub(crate) fn without_context(query: &str, answer: String) -> Self {
		Self { answer, citations: Vec::new(), context_found: false, query: query.to_string() }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
	pub filename: String,
	pub chunk_sequence: i32,
	pub score: f32,
	pub vector_id: String,
}
impl From<&RetrievedHit> for Citation {
	fn from(hit: &RetrievedHit) -> Self {
		Self {
			filename: hit.filename().unwrap_or(UNKNOWN_FILENAME).to_string(),
			chunk_sequence: hit.chunk_sequence.unwrap_or(0),
			score: hit.similarity_score,
			vector_id: hit.vector_id.clone(),
		}
	}
}

impl DocentService {
	/// Answers one chat turn. Booking turns never touch retrieval.
	pub async fn ask(&self, req: AskRequest) -> Result<AskResponse> {
		let session_id = req.session_id.trim();
		let query = req.query.trim();
		let top_k = req.top_k.unwrap_or(self.cfg.search.default_top_k);

		validate_ask(session_id, query, top_k, self.cfg.search.max_top_k)?;

		if intent::classify(query) == Intent::Booking {
			return self.handle_booking(session_id, query, &req.query).await;
		}

		let hits = self.fuse(query, top_k).await?;
		let history = self
			.bounded(
				"conversation_memory",
				self.collaborators.memory.read(session_id, self.cfg.conversation.max_history_turns),
			)
			.await?;
		let prompt =
			context::assemble(&history, query, &hits, self.cfg.search.max_context_chars as usize);
		let messages = prompt.to_json_messages();
		let answer = self
			.bounded(
				"completion",
				self.collaborators.completion.complete(&self.cfg.providers.completion, &messages),
			)
			.await?;

		self.remember(session_id, Role::User, query).await?;
		self.remember(session_id, Role::Assistant, &answer).await?;

		let citations: Vec<Citation> = hits.iter().map(Citation::from).collect();
		let context_found = hits.iter().any(RetrievedHit::has_context);

		tracing::info!(
			session_id,
			hit_count = hits.len(),
			included_hits = prompt.included_hits,
			history_turns = history.len(),
			context_found,
			"Answered grounded question."
		);

		Ok(AskResponse { answer, citations, context_found, query: req.query })
	}
}

fn validate_ask(session_id: &str, query: &str, top_k: u32, max_top_k: u32) -> Result<()> {
	if session_id.is_empty() {
		return Err(Error::InvalidRequest { message: "session_id must be non-empty.".to_string() });
	}
	if query.is_empty() {
		return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
	}
	if top_k == 0 || top_k > max_top_k {
		return Err(Error::InvalidRequest {
			message: format!("top_k must be between 1 and {max_top_k}."),
		});
	}

	Ok(())
}
