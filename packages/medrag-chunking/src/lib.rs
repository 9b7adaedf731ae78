pub mod chunker;
pub mod records;
pub mod tokenizer;

mod error;

pub use chunker::{ChunkStream, Chunker, ChunkingConfig};
pub use error::{Error, Result};
pub use records::{read_chunks, read_paragraphs, write_chunks};
pub use tokenizer::{
	DenyFallback, FallbackApproval, FallbackDecision, TerminalApproval, TokenCounter,
	load_token_counter,
};
