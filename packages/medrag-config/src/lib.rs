mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Answer, Chunking, Config, EmbeddingProviderConfig, Evidence, LlmProviderConfig, Paths,
	ProviderConfig, Providers, Qdrant, Retrieval, Service, Storage, Tokenizer,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.tokenizer.repo.is_none() && cfg.tokenizer.path.is_none() {
		return Err(Error::validation("tokenizer.repo or tokenizer.path must be set."));
	}
	if cfg.chunking.max_tokens == 0 {
		return Err(Error::validation("chunking.max_tokens must be greater than zero."));
	}
	if cfg.chunking.target_tokens == 0 {
		return Err(Error::validation("chunking.target_tokens must be greater than zero."));
	}
	if cfg.chunking.target_tokens > cfg.chunking.max_tokens {
		return Err(Error::validation(
			"chunking.target_tokens must be less than or equal to chunking.max_tokens.",
		));
	}

	for (label, value) in [
		("retrieval.top_k_sparse", cfg.retrieval.top_k_sparse),
		("retrieval.top_k_dense", cfg.retrieval.top_k_dense),
		("retrieval.top_k_final", cfg.retrieval.top_k_final),
		("retrieval.rrf_k", cfg.retrieval.rrf_k),
		("retrieval.rerank_top_k", cfg.retrieval.rerank_top_k),
		("evidence.max_blocks", cfg.evidence.max_blocks),
	] {
		if value == 0 {
			return Err(Error::validation(format!("{label} must be greater than zero.")));
		}
	}

	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::validation("storage.qdrant.collection must be non-empty."));
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::validation(
			"providers.embedding.dimensions must be greater than zero.",
		));
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::validation(
			"providers.embedding.dimensions must match storage.qdrant.vector_dim.",
		));
	}
	if !cfg.providers.llm.temperature.is_finite() {
		return Err(Error::validation("providers.llm.temperature must be a finite number."));
	}
	if cfg.providers.llm.max_output_tokens == 0 {
		return Err(Error::validation(
			"providers.llm.max_output_tokens must be greater than zero.",
		));
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("llm", &cfg.providers.llm.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::validation(format!("Provider {label} api_key must be non-empty.")));
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.tokenizer.repo.as_deref().map(|repo| repo.trim().is_empty()).unwrap_or(false) {
		cfg.tokenizer.repo = None;
	}
	if cfg.tokenizer.path.as_deref().map(|path| path.as_os_str().is_empty()).unwrap_or(false) {
		cfg.tokenizer.path = None;
	}

	cfg.retrieval.language = cfg.retrieval.language.trim().to_string();
}
