pub mod evidence;
pub mod fusion;
pub mod prompts;
pub mod query;

mod error;

pub use error::{Error, Result};
pub use evidence::EvidenceLimits;
pub use query::{AskOutcome, EvidenceResponse, RetrieveRequest};

use std::{future::Future, pin::Pin, sync::Arc};

use medrag_chunking::TokenCounter;
use medrag_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use medrag_domain::RetrievedChunk;
use medrag_providers::{completion, embedding, rerank};
use medrag_storage::QdrantStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Keyword search returning chunks with `sparse_score` set, best first.
pub trait SparseSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		query: &'a str,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>>;
}

/// Vector search returning chunks with `dense_score` set, best first.
pub trait DenseSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		vector: Vec<f32>,
		top_k: u32,
		lang: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, Result<String>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub completion: Arc<dyn CompletionProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		completion: Arc<dyn CompletionProvider>,
	) -> Self {
		Self { embedding, rerank, completion }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), completion: provider }
	}
}

#[derive(Clone)]
pub struct SearchBackends {
	pub sparse: Arc<dyn SparseSearch>,
	pub dense: Arc<dyn DenseSearch>,
}
impl SearchBackends {
	pub fn new(sparse: Arc<dyn SparseSearch>, dense: Arc<dyn DenseSearch>) -> Self {
		Self { sparse, dense }
	}

	/// Both sides served by one Qdrant collection: BM25 for sparse, the named dense vector
	/// for dense.
	pub fn qdrant(store: Arc<QdrantStore>) -> Self {
		Self { sparse: store.clone(), dense: store }
	}
}

pub struct MedragService {
	pub cfg: Config,
	pub backends: SearchBackends,
	pub providers: Providers,
	pub tokens: Arc<TokenCounter>,
}
impl MedragService {
	pub fn new(cfg: Config, backends: SearchBackends, tokens: Arc<TokenCounter>) -> Self {
		Self { cfg, backends, providers: Providers::default(), tokens }
	}

	pub fn with_providers(
		cfg: Config,
		backends: SearchBackends,
		providers: Providers,
		tokens: Arc<TokenCounter>,
	) -> Self {
		Self { cfg, backends, providers, tokens }
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank::rerank(cfg, query, docs).await?) })
	}
}
impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(completion::complete(cfg, system, user).await?) })
	}
}

impl SparseSearch for QdrantStore {
	fn search<'a>(
		&'a self,
		query: &'a str,
		top_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>> {
		Box::pin(async move { Ok(self.search_sparse(query, top_k).await?) })
	}
}
impl DenseSearch for QdrantStore {
	fn search<'a>(
		&'a self,
		vector: Vec<f32>,
		top_k: u32,
		lang: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>> {
		Box::pin(async move { Ok(self.search_dense(vector, top_k, lang).await?) })
	}
}
