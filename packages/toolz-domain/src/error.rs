pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Invalid {field}: {message}")]
	Validation { field: String, message: String },
	#[error("Unknown {what}: {value:?}.")]
	UnknownVariant { what: &'static str, value: String },
}
impl Error {
	pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::Validation { field: field.into(), message: message.into() }
	}
}
