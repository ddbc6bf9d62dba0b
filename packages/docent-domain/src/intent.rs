use std::sync::LazyLock;

use regex::Regex;

static SCHEDULING_VERB: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(?:book|schedule|set\s+up|reserve|arrange)\b")
		.expect("Invalid scheduling verb regex.")
});
static EVENT_NOUN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)\b(?:interview|meeting)\b").expect("Invalid event noun regex.")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	Booking,
	Qna,
}

/// A message is a booking request when a scheduling verb and an event noun both occur, in either
/// order and at any distance.
pub fn classify(text: &str) -> Intent {
	if SCHEDULING_VERB.is_match(text) && EVENT_NOUN.is_match(text) {
		Intent::Booking
	} else {
		Intent::Qna
	}
}

pub fn is_booking_intent(text: &str) -> bool {
	classify(text) == Intent::Booking
}
