//! Fuzzy date and time recognition for free-form chat messages.
//!
//! Parsing is seeded with a sentinel instant: any component the message does not state keeps the
//! sentinel value, and a component equal to the sentinel is reported as absent. A message that
//! literally asks for January 1st 2025, or for midnight, is therefore indistinguishable from one
//! that gives no date or no time. This is a known limitation of the approach.

use std::{ops::Range, sync::LazyLock};

use regex::{Captures, Regex};
use time::{Date, Month, PrimitiveDateTime, Time, macros::date};

pub const SENTINEL_DATE: Date = date!(2025 - 01 - 01);
pub const SENTINEL_TIME: Time = Time::MIDNIGHT;

const MONTH_NAMES: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

type DateExtractor = fn(&Captures<'_>) -> Option<DateParts>;
type TimeExtractor = fn(&Captures<'_>) -> Option<TimeParts>;

static DATE_PATTERNS: LazyLock<Vec<(Regex, DateExtractor)>> = LazyLock::new(|| {
	let table: [(String, DateExtractor); 5] = [
		(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b".to_string(), iso_date),
		(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4}|\d{2})\b".to_string(), month_first_numeric),
		(
			format!(
				r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?({MONTH_NAMES})\b\.?(?:,?\s+(\d{{4}})\b)?"
			),
			day_then_month_name,
		),
		(
			format!(
				r"(?i)\b({MONTH_NAMES})\b\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}})\b)?"
			),
			month_name_then_day,
		),
		(format!(r"(?i)\b({MONTH_NAMES})\b\.?,?\s+(\d{{4}})\b"), month_name_then_year),
	];

	table
		.into_iter()
		.map(|(pattern, extract)| {
			(Regex::new(&pattern).expect("Invalid date pattern regex."), extract)
		})
		.collect()
});
static TIME_PATTERNS: LazyLock<Vec<(Regex, TimeExtractor)>> = LazyLock::new(|| {
	let table: [(&str, TimeExtractor); 3] = [
		(r"(?i)\b(\d{1,2}):(\d{2})(?::(\d{2}))?(?:\s*([ap])\.?m\b\.?)?", clock_time),
		(r"(?i)\b(\d{1,2})\s*([ap])\.?m\b\.?", hour_with_meridiem),
		(r"(?i)\b(noon|midnight)\b", named_time),
	];

	table
		.into_iter()
		.map(|(pattern, extract)| {
			(Regex::new(pattern).expect("Invalid time pattern regex."), extract)
		})
		.collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DateParts {
	year: Option<i32>,
	month: u8,
	day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimeParts {
	hour: u8,
	minute: u8,
	second: u8,
}

/// Returns the explicitly stated date and time, each independently. Malformed or absent
/// date-like text yields `(None, None)`.
pub fn parse_date_and_time(text: &str) -> (Option<Date>, Option<Time>) {
	let Some(parsed) = parse_fuzzy(text) else {
		return (None, None);
	};
	let has_date = parsed.date() != SENTINEL_DATE;
	let has_time =
		parsed.hour() != SENTINEL_TIME.hour() || parsed.minute() != SENTINEL_TIME.minute();
	let date = has_date.then(|| parsed.date());
	let time = if has_time { Time::from_hms(parsed.hour(), parsed.minute(), 0).ok() } else { None };

	(date, time)
}

fn parse_fuzzy(text: &str) -> Option<PrimitiveDateTime> {
	let date = first_valid(DATE_PATTERNS.as_slice(), text, resolve_date);
	let time = first_valid(TIME_PATTERNS.as_slice(), text, resolve_time);

	if date.is_none() && time.is_none() {
		return None;
	}

	let date = match date {
		Some(Some(date)) => date,
		Some(None) => return None,
		None => SENTINEL_DATE,
	};
	let time = match time {
		Some(Some(time)) => time,
		Some(None) => return None,
		None => SENTINEL_TIME,
	};

	Some(PrimitiveDateTime::new(date, time))
}

/// Scans the table in order and returns the first match that resolves. A match that fails to
/// resolve rejects its span, so later patterns cannot reinterpret part of the same token.
///
/// `None` when nothing matches; `Some(None)` when every match fails to resolve.
fn first_valid<P, T>(
	table: &[(Regex, fn(&Captures<'_>) -> Option<P>)],
	text: &str,
	resolve: fn(P) -> Option<T>,
) -> Option<Option<T>> {
	let mut rejected: Vec<Range<usize>> = Vec::new();

	for (regex, extract) in table {
		for caps in regex.captures_iter(text) {
			let Some(span) = caps.get(0).map(|found| found.range()) else {
				continue;
			};

			if rejected.iter().any(|seen| span.start < seen.end && seen.start < span.end) {
				continue;
			}

			match extract(&caps).and_then(resolve) {
				Some(value) => return Some(Some(value)),
				None => rejected.push(span),
			}
		}
	}

	if rejected.is_empty() { None } else { Some(None) }
}

fn resolve_date(parts: DateParts) -> Option<Date> {
	let month = Month::try_from(parts.month).ok()?;

	Date::from_calendar_date(parts.year.unwrap_or(SENTINEL_DATE.year()), month, parts.day).ok()
}

fn resolve_time(parts: TimeParts) -> Option<Time> {
	Time::from_hms(parts.hour, parts.minute, parts.second).ok()
}

fn iso_date(caps: &Captures<'_>) -> Option<DateParts> {
	Some(DateParts {
		year: Some(number(caps, 1)?),
		month: number(caps, 2)?,
		day: number(caps, 3)?,
	})
}

fn month_first_numeric(caps: &Captures<'_>) -> Option<DateParts> {
	let raw_year = caps.get(3)?.as_str();
	let year: i32 = raw_year.parse().ok()?;
	let year = if raw_year.len() == 2 { 2000 + year } else { year };

	Some(DateParts { year: Some(year), month: number(caps, 1)?, day: number(caps, 2)? })
}

fn day_then_month_name(caps: &Captures<'_>) -> Option<DateParts> {
	Some(DateParts {
		year: optional_number(caps, 3)?,
		month: month_number(caps.get(2)?.as_str())?,
		day: number(caps, 1)?,
	})
}

fn month_name_then_day(caps: &Captures<'_>) -> Option<DateParts> {
	Some(DateParts {
		year: optional_number(caps, 3)?,
		month: month_number(caps.get(1)?.as_str())?,
		day: number(caps, 2)?,
	})
}

fn month_name_then_year(caps: &Captures<'_>) -> Option<DateParts> {
	Some(DateParts {
		year: Some(number(caps, 2)?),
		month: month_number(caps.get(1)?.as_str())?,
		day: 1,
	})
}

fn clock_time(caps: &Captures<'_>) -> Option<TimeParts> {
	let hour: u8 = number(caps, 1)?;
	let minute: u8 = number(caps, 2)?;
	let second: u8 = optional_number(caps, 3)?.unwrap_or(0);
	let hour = match caps.get(4) {
		Some(meridiem) => to_24_hour(hour, meridiem.as_str())?,
		None => hour,
	};

	Some(TimeParts { hour, minute, second })
}

fn hour_with_meridiem(caps: &Captures<'_>) -> Option<TimeParts> {
	let hour = to_24_hour(number(caps, 1)?, caps.get(2)?.as_str())?;

	Some(TimeParts { hour, minute: 0, second: 0 })
}

fn named_time(caps: &Captures<'_>) -> Option<TimeParts> {
	let hour = if caps.get(1)?.as_str().eq_ignore_ascii_case("noon") { 12 } else { 0 };

	Some(TimeParts { hour, minute: 0, second: 0 })
}

fn to_24_hour(hour: u8, meridiem: &str) -> Option<u8> {
	if !(1..=12).contains(&hour) {
		return None;
	}

	let is_pm = meridiem.eq_ignore_ascii_case("p");

	Some(match (is_pm, hour) {
		(false, 12) => 0,
		(false, hour) => hour,
		(true, 12) => 12,
		(true, hour) => hour + 12,
	})
}

fn month_number(name: &str) -> Option<u8> {
	let prefix = name.get(..3)?.to_ascii_lowercase();
	let month = match prefix.as_str() {
		"jan" => 1,
		"feb" => 2,
		"mar" => 3,
		"apr" => 4,
		"may" => 5,
		"jun" => 6,
		"jul" => 7,
		"aug" => 8,
		"sep" => 9,
		"oct" => 10,
		"nov" => 11,
		"dec" => 12,
		_ => return None,
	};

	Some(month)
}

fn number<T>(caps: &Captures<'_>, index: usize) -> Option<T>
where
	T: std::str::FromStr,
{
	caps.get(index)?.as_str().parse().ok()
}

/// Outer `None` means the group matched but did not parse.
fn optional_number<T>(caps: &Captures<'_>, index: usize) -> Option<Option<T>>
where
	T: std::str::FromStr,
{
	match caps.get(index) {
		Some(raw) => raw.as_str().parse().ok().map(Some),
		None => Some(None),
	}
}
