pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Tokenizer error: {message}")]
	Tokenizer { message: String },
}
impl From<medrag_storage::Error> for Error {
	fn from(err: medrag_storage::Error) -> Self {
		match err {
			medrag_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			medrag_storage::Error::NotFound(message) => Self::NotFound { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
impl From<medrag_providers::Error> for Error {
	fn from(err: medrag_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<medrag_chunking::Error> for Error {
	fn from(err: medrag_chunking::Error) -> Self {
		Self::Tokenizer { message: err.to_string() }
	}
}
