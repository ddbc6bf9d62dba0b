//! Booking slot extraction.
//!
//! Every extractor is a heuristic. Names come from an ordered pattern table where the first match
//! wins, emails from a single permissive token pattern, and date and time from
//! [`crate::datetime`].

use std::sync::LazyLock;

use regex::Regex;
use time::{Date, Time};

use crate::datetime;

pub const FIELD_NAME: &str = "name";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_DATE: &str = "date";
pub const FIELD_TIME: &str = "time";

const NAME_CANDIDATE: &str = r"([A-Za-z][A-Za-z\s.'-]{1,60})";

static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		format!(r"(?i)\b(?:my name is|i am|i'm)\s+{NAME_CANDIDATE}"),
		format!(r"(?i)\bname\s*[:\-]\s*{NAME_CANDIDATE}"),
		format!(r"(?i)\bname\s+(?:(?:is|of)\s+)?{NAME_CANDIDATE}"),
	]
	.iter()
	.map(|pattern| Regex::new(pattern).expect("Invalid name pattern regex."))
	.collect()
});
// A candidate opening with one of these is a phrase fragment, not a name.
const LINKING_WORDS: [&str; 2] = ["is", "of"];

static NAME_TERMINATOR: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(?:and|email)\b").expect("Invalid name terminator regex.")
});
static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("Invalid email regex.")
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingSlots {
	pub name: Option<String>,
	pub email: Option<String>,
	pub date: Option<Date>,
	pub time: Option<Time>,
}
impl BookingSlots {
	/// Missing field names, always in the order name, email, date, time.
	pub fn missing_fields(&self) -> Vec<&'static str> {
		let mut missing = Vec::new();

		if self.name.is_none() {
			missing.push(FIELD_NAME);
		}
		if self.email.is_none() {
			missing.push(FIELD_EMAIL);
		}
		if self.date.is_none() {
			missing.push(FIELD_DATE);
		}
		if self.time.is_none() {
			missing.push(FIELD_TIME);
		}

		missing
	}

	pub fn is_complete(&self) -> bool {
		self.missing_fields().is_empty()
	}

	pub fn into_complete(self) -> Result<CompleteSlots, Vec<&'static str>> {
		match self {
			Self { name: Some(name), email: Some(email), date: Some(date), time: Some(time) } =>
				Ok(CompleteSlots { name, email, date, time }),
			partial => Err(partial.missing_fields()),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteSlots {
	pub name: String,
	pub email: String,
	pub date: Date,
	pub time: Time,
}

pub fn extract(text: &str) -> BookingSlots {
	let (date, time) = datetime::parse_date_and_time(text);

	BookingSlots { name: extract_name(text), email: extract_email(text), date, time }
}

pub fn extract_name(text: &str) -> Option<String> {
	NAME_PATTERNS.iter().find_map(|pattern| {
		let candidate = pattern.captures(text)?.get(1)?;
		let name = NAME_TERMINATOR.split(candidate.as_str()).next().unwrap_or_default().trim();
		let leading = name.split_whitespace().next()?;

		if LINKING_WORDS.iter().any(|word| leading.eq_ignore_ascii_case(word)) {
			return None;
		}

		Some(name.to_string())
	})
}

pub fn extract_email(text: &str) -> Option<String> {
	EMAIL.find(text).map(|found| found.as_str().to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn self_introduction_beats_labelled_name() {
		assert_eq!(
			extract_name("name: Someone Else, but my name is Priya Shah").as_deref(),
			Some("Priya Shah")
		);
	}

	#[test]
	fn labelled_name_accepts_colon_or_hyphen() {
		assert_eq!(extract_name("Name: O'Neil").as_deref(), Some("O'Neil"));
		assert_eq!(extract_name("name - Anne-Marie").as_deref(), Some("Anne-Marie"));
	}

	#[test]
	fn plain_name_label_skips_linking_words() {
		assert_eq!(
			extract_name("Book an interview, name is Diwash, email diwash@gmail.com").as_deref(),
			Some("Diwash")
		);
		assert_eq!(
			extract_name("Please book it under the name of Priya, email priya@x.io").as_deref(),
			Some("Priya")
		);
		assert_eq!(extract_name("name Diwash email diwash@gmail.com").as_deref(), Some("Diwash"));
		assert_eq!(extract_name("the name is"), None);
	}

	#[test]
	fn name_stops_at_and_or_email() {
		assert_eq!(
			extract_name("I'm Jo Park and my email is jo@park.dev").as_deref(),
			Some("Jo Park")
		);
		assert_eq!(extract_name("i am Lee email lee@x.io").as_deref(), Some("Lee"));
		assert_eq!(extract_name("I am Alexander Sandberg").as_deref(), Some("Alexander Sandberg"));
	}

	#[test]
	fn name_requires_a_leading_letter() {
		assert_eq!(extract_name("Name: 42"), None);
		assert_eq!(extract_name("no introductions here"), None);
	}

	#[test]
	fn name_truncated_to_nothing_is_absent() {
		assert_eq!(extract_name("I am and done"), None);
	}

	#[test]
	fn email_takes_first_token() {
		assert_eq!(
			extract_email("write a.b+c@mail.example.org or x@y.io").as_deref(),
			Some("a.b+c@mail.example.org")
		);
		assert_eq!(extract_email("user@localhost"), None);
		assert_eq!(extract_email("user@host.c"), None);
	}

	#[test]
	fn missing_fields_keep_fixed_order() {
		let slots = BookingSlots { email: Some("a@b.co".to_string()), ..Default::default() };

		assert_eq!(slots.missing_fields(), vec!["name", "date", "time"]);
		assert_eq!(BookingSlots::default().missing_fields(), vec!["name", "email", "date", "time"]);
		assert!(!slots.is_complete());
		assert_eq!(slots.into_complete(), Err(vec!["name", "date", "time"]));
	}
}
