use std::{
	collections::HashMap,
	path::PathBuf,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::Map;

use medrag_chunking::TokenCounter;
use medrag_config::{
	Answer, Chunking, Config, EmbeddingProviderConfig, Evidence, LlmProviderConfig, Paths,
	ProviderConfig, Qdrant, Retrieval, Service, Storage, Tokenizer,
};
use medrag_domain::{Chunk, RetrievedChunk};
use medrag_service::{
	AskOutcome, BoxFuture, CompletionProvider, DenseSearch, EmbeddingProvider, Error,
	MedragService, Providers, RerankProvider, Result, RetrieveRequest, SearchBackends,
	SparseSearch,
};

const VECTOR_DIM: u32 = 4;

fn chunk(id: &str, text: &str) -> Chunk {
	Chunk {
		chunk_id: id.to_string(),
		guideline_id: "aha-hf-2022".to_string(),
		guideline_title: "AHA Heart Failure".to_string(),
		year: Some(2022),
		organization: Some("AHA".to_string()),
		section_id: Some(id.to_string()),
		section_title: Some(format!("Section {id}")),
		page_range: None,
		lang: "en".to_string(),
		text: text.to_string(),
		rec_class_list: Vec::new(),
		loe_list: Vec::new(),
		metadata: Map::new(),
	}
}

fn sparse(ids: &[&str]) -> Vec<RetrievedChunk> {
	ids.iter()
		.enumerate()
		.map(|(idx, id)| RetrievedChunk::sparse(chunk(id, id), 10.0 - idx as f32))
		.collect()
}

fn dense(ids: &[&str]) -> Vec<RetrievedChunk> {
	ids.iter()
		.enumerate()
		.map(|(idx, id)| RetrievedChunk::dense(chunk(id, id), 0.9 - idx as f32 / 10.0))
		.collect()
}

struct StubSparse(Option<Vec<RetrievedChunk>>);
impl SparseSearch for StubSparse {
	fn search<'a>(
		&'a self,
		_query: &'a str,
		_top_k: u32,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>> {
		let hits = self.0.clone().ok_or_else(|| Error::Storage { message: "index offline".into() });

		Box::pin(async move { hits })
	}
}

struct SpyDense {
	hits: Option<Vec<RetrievedChunk>>,
	langs: Mutex<Vec<Option<String>>>,
}
impl SpyDense {
	fn new(hits: Option<Vec<RetrievedChunk>>) -> Self {
		Self { hits, langs: Mutex::new(Vec::new()) }
	}
}
impl DenseSearch for SpyDense {
	fn search<'a>(
		&'a self,
		_vector: Vec<f32>,
		_top_k: u32,
		lang: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<RetrievedChunk>>> {
		self.langs.lock().expect("lock").push(lang.map(str::to_string));

		let hits =
			self.hits.clone().ok_or_else(|| Error::Storage { message: "vectors offline".into() });

		Box::pin(async move { hits })
	}
}

struct DummyEmbedding {
	dim: usize,
}
impl EmbeddingProvider for DummyEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vec = vec![0.0; self.dim];

		Box::pin(async move { Ok(vec![vec; texts.len()]) })
	}
}

/// Scores documents by a fixed table keyed on text; fails when the table is absent.
struct TableRerank(Option<HashMap<String, f32>>);
impl RerankProvider for TableRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		let scores = match &self.0 {
			Some(table) =>
				Ok(docs.iter().map(|doc| table.get(doc).copied().unwrap_or(0.0)).collect()),
			None => Err(Error::Provider { message: "reranker timed out".into() }),
		};

		Box::pin(async move { scores })
	}
}

struct SpyCompletion {
	calls: Arc<AtomicUsize>,
	reply: String,
}
impl SpyCompletion {
	fn new(reply: &str) -> Self {
		Self { calls: Arc::new(AtomicUsize::new(0)), reply: reply.to_string() }
	}
}
impl CompletionProvider for SpyCompletion {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		system: &'a str,
		user: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		assert!(!system.is_empty());
		assert!(user.contains("[Doc 1]"));

		let reply = self.reply.clone();

		Box::pin(async move { Ok(reply) })
	}
}

fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		paths: Paths {
			parsed_docs: PathBuf::from("data/parsed.jsonl"),
			chunks: PathBuf::from("data/chunks.jsonl"),
		},
		tokenizer: Tokenizer {
			repo: Some("Xenova/gpt-4".to_string()),
			path: None,
			allow_fallback: true,
		},
		chunking: Chunking::default(),
		retrieval: Retrieval::default(),
		evidence: Evidence::default(),
		answer: Answer { medical_disclaimer: "Consult a qualified clinician".to_string() },
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "guideline_chunks_test".to_string(),
				vector_dim: VECTOR_DIM,
			},
		},
		providers: medrag_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "key".to_string(),
				path: "/embeddings".to_string(),
				model: "embed".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "key".to_string(),
				path: "/rerank".to_string(),
				model: "rerank".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "key".to_string(),
				path: "/chat/completions".to_string(),
				model: "chat".to_string(),
				temperature: 0.1,
				max_output_tokens: 800,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
	}
}

struct Harness {
	service: MedragService,
	dense: Arc<SpyDense>,
	completion: Arc<SpyCompletion>,
}

fn harness(
	sparse_hits: Option<Vec<RetrievedChunk>>,
	dense_hits: Option<Vec<RetrievedChunk>>,
	rerank: TableRerank,
	embedding_dim: usize,
) -> Harness {
	let dense = Arc::new(SpyDense::new(dense_hits));
	let completion = Arc::new(SpyCompletion::new("Start guideline-directed therapy [Doc 1]."));
	let backends = SearchBackends::new(Arc::new(StubSparse(sparse_hits)), dense.clone());
	let providers = Providers::new(
		Arc::new(DummyEmbedding { dim: embedding_dim }),
		Arc::new(rerank),
		completion.clone(),
	);
	let service = MedragService::with_providers(
		test_config(),
		backends,
		providers,
		Arc::new(TokenCounter::Whitespace),
	);

	Harness { service, dense, completion }
}

fn request(question: &str) -> RetrieveRequest {
	RetrieveRequest::new(question, &Retrieval::default())
}

fn ids(hits: &[RetrievedChunk]) -> Vec<&str> {
	hits.iter().map(RetrievedChunk::chunk_id).collect()
}

fn assert_close(actual: Option<f32>, expected: f64) {
	let actual = actual.expect("Missing fused score.");

	assert!((f64::from(actual) - expected).abs() < 1e-6, "{actual} != {expected}");
}

#[tokio::test]
async fn fuses_sparse_and_dense_by_reciprocal_rank() {
	let h = harness(
		Some(sparse(&["A", "B"])),
		Some(dense(&["B", "C"])),
		TableRerank(None),
		VECTOR_DIM as usize,
	);
	let fused = h.service.retrieve(&request("beta blockers")).await.expect("retrieve");

	assert_eq!(ids(&fused), vec!["B", "A", "C"]);
	assert_close(fused[0].fused_score(), 1.0 / 52.0 + 1.0 / 51.0);
	assert_close(fused[1].fused_score(), 1.0 / 51.0);
	assert_close(fused[2].fused_score(), 1.0 / 52.0);
	assert_eq!(fused[0].sparse_score(), Some(9.0));
	assert_eq!(fused[0].dense_score(), Some(0.9));
	assert_eq!(fused[1].dense_score(), None);
	assert_eq!(h.dense.langs.lock().expect("lock").as_slice(), &[Some("en".to_string())]);
}

#[tokio::test]
async fn rank_one_in_both_lists_scores_twice() {
	let h = harness(
		Some(sparse(&["A", "B"])),
		Some(dense(&["A"])),
		TableRerank(None),
		VECTOR_DIM as usize,
	);
	let fused = h.service.retrieve(&request("anticoagulation")).await.expect("retrieve");

	assert_close(fused[0].fused_score(), 2.0 / 51.0);
}

#[tokio::test]
async fn fusion_is_idempotent_and_truncates() {
	let h = harness(
		Some(sparse(&["A", "B", "C", "D"])),
		Some(dense(&["D", "C", "E"])),
		TableRerank(None),
		VECTOR_DIM as usize,
	);
	let mut req = request("statin intensity");

	req.top_k_final = 3;

	let first = h.service.retrieve(&req).await.expect("retrieve");
	let second = h.service.retrieve(&req).await.expect("retrieve");

	assert_eq!(first.len(), 3);
	assert_eq!(first, second);
}

#[tokio::test]
async fn failing_side_contributes_nothing() {
	let h = harness(None, Some(dense(&["B", "C"])), TableRerank(None), VECTOR_DIM as usize);
	let fused = h.service.retrieve(&request("ICD indications")).await.expect("retrieve");

	assert_eq!(ids(&fused), vec!["B", "C"]);
	assert_close(fused[0].fused_score(), 1.0 / 51.0);

	let h = harness(Some(sparse(&["A"])), None, TableRerank(None), VECTOR_DIM as usize);
	let fused = h.service.retrieve(&request("ICD indications")).await.expect("retrieve");

	assert_eq!(ids(&fused), vec!["A"]);
}

#[tokio::test]
async fn embedding_dimension_mismatch_disables_dense_side() {
	let h = harness(Some(sparse(&["A"])), Some(dense(&["Z"])), TableRerank(None), 2);
	let fused = h.service.retrieve(&request("ICD indications")).await.expect("retrieve");

	assert_eq!(ids(&fused), vec!["A"]);
	assert!(h.dense.langs.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn both_sides_failing_is_empty_not_an_error() {
	let h = harness(None, None, TableRerank(None), VECTOR_DIM as usize);
	let fused = h.service.retrieve(&request("ICD indications")).await.expect("retrieve");

	assert!(fused.is_empty());
}

#[tokio::test]
async fn short_questions_are_rejected() {
	let h = harness(Some(sparse(&["A"])), None, TableRerank(None), VECTOR_DIM as usize);
	let err = h.service.retrieve(&request("  hi ")).await.expect_err("Expected invalid request.");

	assert!(matches!(err, Error::InvalidRequest { .. }));

	let mut req = request("valid question");

	req.top_k_final = 0;

	assert!(matches!(h.service.retrieve(&req).await, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn rerank_resorts_and_truncates() {
	let table = HashMap::from([
		("A".to_string(), 0.1),
		("B".to_string(), 0.7),
		("C".to_string(), 0.9),
	]);
	let h = harness(
		Some(sparse(&["A", "B", "C"])),
		None,
		TableRerank(Some(table)),
		VECTOR_DIM as usize,
	);
	let fused = h.service.retrieve(&request("ARNI switch")).await.expect("retrieve");
	let reranked = h.service.rerank("ARNI switch", fused, 2).await;

	assert_eq!(ids(&reranked), vec!["C", "B"]);
	assert_eq!(reranked[0].rerank_score(), Some(0.9));
	assert!(reranked[0].fused_score().is_some());
}

#[tokio::test]
async fn rerank_failure_keeps_fused_order() {
	let h = harness(Some(sparse(&["A", "B", "C"])), None, TableRerank(None), VECTOR_DIM as usize);
	let fused = h.service.retrieve(&request("ARNI switch")).await.expect("retrieve");
	let reranked = h.service.rerank("ARNI switch", fused, 2).await;

	assert_eq!(ids(&reranked), vec!["A", "B"]);
	assert_eq!(reranked[0].rerank_score(), None);
}

#[tokio::test]
async fn ask_without_evidence_skips_generation() {
	let h = harness(Some(Vec::new()), None, TableRerank(None), VECTOR_DIM as usize);
	let outcome = h.service.ask("What is the target LDL?").await.expect("ask");

	assert!(matches!(outcome, AskOutcome::NoEvidence));
	assert_eq!(h.completion.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ask_answers_with_cited_evidence_and_disclaimer() {
	let h = harness(
		Some(sparse(&["A", "B"])),
		Some(dense(&["B"])),
		TableRerank(None),
		VECTOR_DIM as usize,
	);
	let outcome = h.service.ask("  Which patients need an ICD?  ").await.expect("ask");
	let AskOutcome::Answered { answer, evidences } = outcome else {
		panic!("Expected an answer.");
	};

	assert_eq!(
		answer,
		"Start guideline-directed therapy [Doc 1].\n\nConsult a qualified clinician."
	);
	assert_eq!(evidences.len(), 2);
	assert_eq!(evidences[0].id, "Doc 1");
	assert_eq!(evidences[0].chunk_ids, vec!["B"]);
	assert_eq!(evidences[1].id, "Doc 2");
	assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);

	let value = serde_json::to_value(AskOutcome::NoEvidence).expect("serialize");

	assert_eq!(value, serde_json::json!({ "status": "no_evidence" }));
}
