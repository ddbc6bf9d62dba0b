pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("Timed out waiting for {collaborator}.")]
	Timeout { collaborator: &'static str },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<docent_storage::Error> for Error {
	fn from(err: docent_storage::Error) -> Self {
		match err {
			docent_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			// Only raised for misconfigured backing stores, never for caller input.
			docent_storage::Error::InvalidArgument(message) => Self::Storage { message },
			docent_storage::Error::NotFound(message) => Self::NotFound { message },
			docent_storage::Error::Conflict(message) => Self::Conflict { message },
			docent_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}

impl From<docent_providers::Error> for Error {
	fn from(err: docent_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

/// Failure to deliver a notification. Callers report it inline instead of failing the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct NotifyError(pub String);
