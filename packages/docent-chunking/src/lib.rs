use std::{collections::VecDeque, fmt, str::FromStr};

use unicode_segmentation::UnicodeSegmentation;

const FIXED_SEPARATOR: &str = "\n";
const RECURSIVE_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, thiserror::Error)]
#[error("Unsupported chunking strategy {0:?}. Use fixed or recursive.")]
pub struct UnknownStrategy(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkingStrategy {
	Fixed,
	Recursive,
}
impl ChunkingStrategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fixed => "fixed",
			Self::Recursive => "recursive",
		}
	}
}
impl FromStr for ChunkingStrategy {
	type Err = UnknownStrategy;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"fixed" => Ok(Self::Fixed),
			"recursive" => Ok(Self::Recursive),
			_ => Err(UnknownStrategy(raw.to_string())),
		}
	}
}
impl fmt::Display for ChunkingStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Sizes are measured in characters.
#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub chunk_size: usize,
	pub chunk_overlap: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
	pub chunk_index: i32,
	pub text: String,
}

pub fn split_text(text: &str, strategy: ChunkingStrategy, cfg: &ChunkingConfig) -> Vec<Chunk> {
	let pieces = match strategy {
		ChunkingStrategy::Fixed => {
			let splits: Vec<&str> =
				text.split(FIXED_SEPARATOR).filter(|split| !split.is_empty()).collect();

			merge_splits(&splits, FIXED_SEPARATOR, cfg)
		},
		ChunkingStrategy::Recursive => split_recursive(text, &RECURSIVE_SEPARATORS, cfg),
	};

	pieces
		.into_iter()
		.enumerate()
		.map(|(idx, text)| Chunk { chunk_index: idx as i32, text })
		.collect()
}

fn split_recursive(text: &str, separators: &[&str], cfg: &ChunkingConfig) -> Vec<String> {
	let position = separators
		.iter()
		.position(|separator| separator.is_empty() || text.contains(separator))
		.unwrap_or(separators.len().saturating_sub(1));
	let separator = separators.get(position).copied().unwrap_or_default();
	let remaining = separators.get(position + 1..).unwrap_or_default();
	let splits: Vec<&str> = if separator.is_empty() {
		text.graphemes(true).collect()
	} else {
		text.split(separator).filter(|split| !split.is_empty()).collect()
	};
	let mut chunks = Vec::new();
	let mut fitting = Vec::new();

	for split in splits {
		if char_len(split) < cfg.chunk_size {
			fitting.push(split);

			continue;
		}
		if !fitting.is_empty() {
			chunks.extend(merge_splits(&fitting, separator, cfg));
			fitting.clear();
		}

		if remaining.is_empty() {
			chunks.push(split.trim().to_string());
		} else {
			chunks.extend(split_recursive(split, remaining, cfg));
		}
	}

	if !fitting.is_empty() {
		chunks.extend(merge_splits(&fitting, separator, cfg));
	}

	chunks.retain(|chunk| !chunk.is_empty());

	chunks
}

/// Greedily joins splits into chunks of at most `chunk_size` characters. When a chunk is
/// emitted, its trailing splits totalling at most `chunk_overlap` characters seed the next one.
fn merge_splits(splits: &[&str], separator: &str, cfg: &ChunkingConfig) -> Vec<String> {
	let separator_len = char_len(separator);
	let mut chunks = Vec::new();
	let mut current: VecDeque<&str> = VecDeque::new();
	let mut total = 0_usize;

	for &split in splits {
		let len = char_len(split);
		let joined_len = |current: &VecDeque<&str>, total: usize| {
			total + len + if current.is_empty() { 0 } else { separator_len }
		};

		if joined_len(&current, total) > cfg.chunk_size {
			if total > cfg.chunk_size {
				tracing::warn!(
					chunk_chars = total,
					chunk_size = cfg.chunk_size,
					"Created a chunk longer than the configured size."
				);
			}
			if !current.is_empty() {
				push_joined(&mut chunks, &current, separator);

				while total > cfg.chunk_overlap
					|| (total > 0 && joined_len(&current, total) > cfg.chunk_size)
				{
					let Some(front) = current.pop_front() else {
						break;
					};
					let dropped_separator = if current.is_empty() { 0 } else { separator_len };

					total = total.saturating_sub(char_len(front) + dropped_separator);
				}
			}
		}

		if !current.is_empty() {
			total += separator_len;
		}

		current.push_back(split);

		total += len;
	}

	push_joined(&mut chunks, &current, separator);

	chunks
}

fn push_joined(chunks: &mut Vec<String>, current: &VecDeque<&str>, separator: &str) {
	let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
	let trimmed = joined.trim();

	if !trimmed.is_empty() {
		chunks.push(trimmed.to_string());
	}
}

fn char_len(text: &str) -> usize {
	text.chars().count()
}
