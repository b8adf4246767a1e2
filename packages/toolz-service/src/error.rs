pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Message returned for every storage failure. The underlying error is logged, never returned.
pub const STORE_UNAVAILABLE: &str = "The context store is unavailable.";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	Validation { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Store unavailable: {message}")]
	StoreUnavailable { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
}
impl Error {
	pub(crate) fn validation(message: impl Into<String>) -> Self {
		Self::Validation { message: message.into() }
	}

	/// The caller-facing message, without the variant prefix.
	pub fn message(&self) -> &str {
		match self {
			Self::Validation { message }
			| Self::NotFound { message }
			| Self::Conflict { message }
			| Self::StoreUnavailable { message }
			| Self::Provider { message } => message,
		}
	}
}

impl From<toolz_storage::Error> for Error {
	fn from(err: toolz_storage::Error) -> Self {
		match err {
			toolz_storage::Error::InvalidArgument(message) => Self::Validation { message },
			toolz_storage::Error::NotFound(message) => Self::NotFound { message },
			toolz_storage::Error::Conflict(message) => Self::Conflict { message },
			err => {
				tracing::error!(error = %err, "Context store operation failed.");

				Self::StoreUnavailable { message: STORE_UNAVAILABLE.to_string() }
			},
		}
	}
}

impl From<toolz_domain::Error> for Error {
	fn from(err: toolz_domain::Error) -> Self {
		Self::Validation { message: err.to_string() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn storage_failures_hide_their_detail() {
		let err = Error::from(toolz_storage::Error::Io(std::io::Error::other("disk on fire")));

		assert!(matches!(&err, Error::StoreUnavailable { .. }));
		assert_eq!(err.message(), STORE_UNAVAILABLE);
	}

	#[test]
	fn storage_lookups_keep_their_kind() {
		let err = Error::from(toolz_storage::Error::NotFound("context 1".to_string()));

		assert!(matches!(err, Error::NotFound { message } if message == "context 1"));
	}
}
