use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub paths: Paths,
	pub tokenizer: Tokenizer,
	#[serde(default)]
	pub chunking: Chunking,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub evidence: Evidence,
	#[serde(default)]
	pub answer: Answer,
	pub storage: Storage,
	pub providers: Providers,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Paths {
	/// JSON Lines file of parsed paragraphs produced by the document parser.
	pub parsed_docs: PathBuf,
	/// JSON Lines file of chunk records; the contract between chunking and indexing.
	pub chunks: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct Tokenizer {
	/// Hugging Face repository of the preferred subword tokenizer.
	pub repo: Option<String>,
	/// Local `tokenizer.json`. Takes precedence over `repo` when set.
	pub path: Option<PathBuf>,
	/// Operator opt-in for whitespace token counts when the tokenizer cannot be loaded.
	#[serde(default)]
	pub allow_fallback: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Chunking {
	pub target_tokens: u32,
	pub max_tokens: u32,
	pub overlap_paragraphs: u32,
}
impl Default for Chunking {
	fn default() -> Self {
		Self { target_tokens: 320, max_tokens: 420, overlap_paragraphs: 1 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k_sparse: u32,
	pub top_k_dense: u32,
	pub top_k_final: u32,
	pub rrf_k: u32,
	pub rerank_top_k: u32,
	/// Dense search payload filter on `lang`. Empty disables the filter.
	pub language: String,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			top_k_sparse: 32,
			top_k_dense: 32,
			top_k_final: 20,
			rrf_k: 50,
			rerank_top_k: 10,
			language: "en".to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Evidence {
	pub max_blocks: u32,
	pub max_tokens: u32,
}
impl Default for Evidence {
	fn default() -> Self {
		Self { max_blocks: 6, max_tokens: 3_000 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Answer {
	pub medical_disclaimer: String,
}
impl Default for Answer {
	fn default() -> Self {
		Self {
			medical_disclaimer: "This information is for educational purposes only and is not a \
				substitute for professional medical advice. Always consult qualified clinicians"
				.to_string(),
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub llm: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	#[serde(default = "default_max_output_tokens")]
	pub max_output_tokens: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_max_output_tokens() -> u32 {
	800
}
