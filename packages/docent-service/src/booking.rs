//! Booking dialog controller.
//!
//! Booking is stateless per turn: slots are extracted from the current message only. A message
//! missing any slot gets a re-prompt and nothing is stored besides that re-prompt. A complete
//! message creates exactly one record; the confirmation email is best effort and its outcome is
//! reported inside the answer text.

use std::fmt;

use time::{OffsetDateTime, PrimitiveDateTime, macros::format_description};

use docent_domain::slots::{self, CompleteSlots};

use crate::{AskResponse, BookingRecord, DocentService, EmailMessage, NewBooking, Result, Role};

pub const EXAMPLE_REQUEST: &str =
	"Book interview, name Diwash, email diwash@gmail.com, 2 sep 2025 3:30 PM";
pub const CONFIRMATION_SUBJECT: &str = "Interview Booking Confirmation";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailStatus {
	Sent,
	Failed(String),
}
impl fmt::Display for EmailStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Sent => f.write_str("email_sent"),
			Self::Failed(reason) => write!(f, "email_failed: {reason}"),
		}
	}
}

pub fn reprompt(missing: &[&str]) -> String {
	format!(
		"I can help you book an interview. Please provide the following: {}. Example: '{EXAMPLE_REQUEST}'",
		missing.join(", ")
	)
}

/// Renders e.g. `Tuesday, 02 September 2025 at 03:30 PM`.
pub fn format_interview_time(at: OffsetDateTime) -> String {
	let format = format_description!(
		"[weekday], [day] [month repr:long] [year] at [hour repr:12]:[minute] [period]"
	);

	at.format(&format).unwrap_or_else(|_| at.to_string())
}

pub fn confirmation_email(to: &str, name: &str, human_time: &str) -> EmailMessage {
	EmailMessage {
		to: to.to_string(),
		subject: CONFIRMATION_SUBJECT.to_string(),
		text_body: format!(
			"Hi {name},\n\nYour interview is confirmed for {human_time}.\n\nIf you need to reschedule, reply to this email.\n\nThanks!"
		),
		html_body: Some(format!(
			"<p>Hi {name},</p><p>Your interview is <strong>confirmed</strong> for <strong>{human_time}</strong>.</p><p>If you need to reschedule, reply to this email.</p><p>Thanks!</p>"
		)),
	}
}

pub fn booked_answer(record: &BookingRecord, human_time: &str, status: &EmailStatus) -> String {
	format!(
		"Booked interview (ID {} for {} on {human_time}. Confirmation: {status}.)",
		record.id, record.name
	)
}

impl DocentService {
	pub(crate) async fn handle_booking(
		&self,
		session_id: &str,
		message: &str,
		echoed_query: &str,
	) -> Result<AskResponse> {
		match slots::extract(message).into_complete() {
			Err(missing) => {
				let answer = reprompt(&missing);

				tracing::info!(session_id, missing = ?missing, "Booking request is missing slots.");

				self.remember(session_id, Role::Assistant, &answer).await?;

				Ok(AskResponse::without_context(echoed_query, answer))
			},
			Ok(slots) => {
				let answer = self.commit_booking(session_id, slots).await?;

				// The record is already committed, so history failures are logged, not returned.
				if let Err(err) = self.remember_exchange(session_id, message, &answer).await {
					tracing::warn!(
						session_id,
						error = %err,
						"Failed to record booking turn in conversation memory."
					);
				}

				Ok(AskResponse::without_context(echoed_query, answer))
			},
		}
	}

	async fn commit_booking(&self, session_id: &str, slots: CompleteSlots) -> Result<String> {
		let booking = NewBooking {
			session_id: session_id.to_string(),
			name: slots.name,
			email: slots.email,
			interview_at: PrimitiveDateTime::new(slots.date, slots.time).assume_utc(),
		};
		let record =
			self.bounded("booking_store", self.collaborators.bookings.create(&booking)).await?;
		let human_time = format_interview_time(record.interview_at);
		let email = confirmation_email(&record.email, &record.name, &human_time);
		let status = self.send_confirmation(&email).await;

		tracing::info!(
			session_id,
			booking_id = record.id,
			email_status = %status,
			"Interview booked."
		);

		Ok(booked_answer(&record, &human_time, &status))
	}

	async fn remember_exchange(&self, session_id: &str, message: &str, answer: &str) -> Result<()> {
		self.remember(session_id, Role::User, message).await?;
		self.remember(session_id, Role::Assistant, answer).await
	}

	async fn send_confirmation(&self, email: &EmailMessage) -> EmailStatus {
		let send = self.collaborators.notifier.send(&self.cfg.notification, email);

		match tokio::time::timeout(self.collaborator_timeout(), send).await {
			Ok(Ok(())) => EmailStatus::Sent,
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Booking confirmation email failed.");

				EmailStatus::Failed(err.to_string())
			},
			Err(_) => {
				tracing::warn!("Booking confirmation email timed out.");

				EmailStatus::Failed("timed out".to_string())
			},
		}
	}
}
