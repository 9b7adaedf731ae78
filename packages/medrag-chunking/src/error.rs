pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(
		"Tokenizer is unavailable: {reason}. Set tokenizer.allow_fallback = true to allow whitespace token counts."
	)]
	TokenizerUnavailable { reason: String },
	#[error("Operator rejected the whitespace token fallback: {reason}.")]
	FallbackRejected { reason: String },
	#[error("Tokenizer failed: {message}")]
	Tokenizer { message: String },
	#[error("Invalid recommendation pattern: {message}")]
	Pattern { message: String },
	#[error("Invalid JSON record at line {line}.")]
	Record { line: usize, source: serde_json::Error },
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
}
