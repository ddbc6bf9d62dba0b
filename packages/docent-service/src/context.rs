//! Prompt assembly for grounded answers.
//!
//! The context block is budgeted in characters and filled greedily in retrieval order. A hit is
//! included whole or not at all, and filling stops at the first hit that does not fit even when a
//! later, shorter hit would.

use serde::Serialize;
use serde_json::Value;

use crate::{ConversationTurn, Role, retrieval::RetrievedHit};

pub const SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant that answers questions based on provided context and conversation history.

Instructions:
- Use BOTH the provided context (retrieved documents) and conversation history (previous user and assistant messages) to answer questions.
- If the answer is in history but not in the context, you may still use history.
- If the answer is not in either context or history, clearly state \"I don't have enough information to answer this question.\"
- Cite your sources using the format [filename#chunk_id] when referencing specific information
- Be concise and accurate
- If multiple sources support your answer, cite all relevant sources";
/// Placeholder text some stores return for chunks they cannot find. Treated as absent.
pub const NOT_FOUND_SENTINEL: &str = "Content not found in database";
pub const NO_CONTEXT_MARKER: &str = "No relevant context found.";
pub const UNKNOWN_FILENAME: &str = "Unknown";
pub const MAX_PIECE_CHARS: usize = 1_000;

const PIECE_SEPARATOR: &str = "\n\n";
const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptRole {
	System,
	User,
	Assistant,
}
impl From<Role> for PromptRole {
	fn from(role: Role) -> Self {
		match role {
			Role::User => Self::User,
			Role::Assistant => Self::Assistant,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
	pub role: PromptRole,
	pub content: String,
}

#[derive(Debug, Clone)]
pub struct AssembledPrompt {
	pub messages: Vec<PromptMessage>,
	pub context_block: String,
	/// Hits that made it into the context block.
	pub included_hits: usize,
}
impl AssembledPrompt {
	pub fn to_json_messages(&self) -> Vec<Value> {
		self.messages
			.iter()
			.map(|message| {
				serde_json::json!({
					"role": message.role,
					"content": message.content,
				})
			})
			.collect()
	}
}

pub fn assemble(
	history: &[ConversationTurn],
	query: &str,
	hits: &[RetrievedHit],
	char_budget: usize,
) -> AssembledPrompt {
	let (context_block, included_hits) = build_context_block(hits, char_budget);
	let mut messages = Vec::with_capacity(history.len() + 2);

	messages.push(PromptMessage { role: PromptRole::System, content: SYSTEM_PROMPT.to_string() });
	messages.extend(
		history
			.iter()
			.map(|turn| PromptMessage { role: turn.role.into(), content: turn.text.clone() }),
	);
	messages
		.push(PromptMessage { role: PromptRole::User, content: user_message(query, &context_block) });

	AssembledPrompt { messages, context_block, included_hits }
}

/// Returns the joined block and how many hits it holds. The block, separators included, never
/// exceeds `char_budget` characters; an empty selection yields [`NO_CONTEXT_MARKER`].
pub fn build_context_block(hits: &[RetrievedHit], char_budget: usize) -> (String, usize) {
	let separator_chars = PIECE_SEPARATOR.chars().count();
	let mut pieces = Vec::new();
	let mut used = 0_usize;

	for hit in hits {
		let Some(text) = hit.context_text() else {
			continue;
		};
		let piece = format!(
			"[{}#{}] {}",
			hit.filename().unwrap_or(UNKNOWN_FILENAME),
			hit.chunk_sequence.unwrap_or(0),
			display_text(text)
		);
		let piece_chars = piece.chars().count();
		let needed = if pieces.is_empty() { piece_chars } else { piece_chars + separator_chars };

		if used + needed > char_budget {
			break;
		}

		used += needed;

		pieces.push(piece);
	}

	if pieces.is_empty() {
		return (NO_CONTEXT_MARKER.to_string(), 0);
	}

	let count = pieces.len();

	(pieces.join(PIECE_SEPARATOR), count)
}

fn display_text(text: &str) -> String {
	let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

	if collapsed.chars().count() <= MAX_PIECE_CHARS {
		return collapsed;
	}

	let mut capped: String = collapsed.chars().take(MAX_PIECE_CHARS).collect();

	capped.push_str(ELLIPSIS);

	capped
}

fn user_message(query: &str, context_block: &str) -> String {
	format!(
		"Question:\n{query}\n\nContext:\n{context_block}\n\nPlease answer the question using both the conversation history and context."
	)
}
