use serde::{Deserialize, Serialize};

use medrag_domain::{EvidenceBlock, RetrievedChunk};

use crate::{Error, MedragService, Result, evidence, fusion, prompts};

const MIN_QUESTION_CHARS: usize = 3;

#[derive(Clone, Debug, Deserialize)]
pub struct RetrieveRequest {
	pub question: String,
	pub top_k_sparse: u32,
	pub top_k_dense: u32,
	pub top_k_final: u32,
}
impl RetrieveRequest {
	/// A request using the configured list sizes.
	pub fn new(question: impl Into<String>, cfg: &medrag_config::Retrieval) -> Self {
		Self {
			question: question.into(),
			top_k_sparse: cfg.top_k_sparse,
			top_k_dense: cfg.top_k_dense,
			top_k_final: cfg.top_k_final,
		}
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct EvidenceResponse {
	pub question: String,
	pub evidences: Vec<EvidenceBlock>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
	Answered { answer: String, evidences: Vec<EvidenceBlock> },
	/// Retrieval found nothing to ground an answer in.
	NoEvidence,
}

impl MedragService {
	/// Hybrid retrieval: sparse and dense lookups run concurrently and are fused by RRF.
	///
	/// A failing side is logged and contributes no candidates.
	pub async fn retrieve(&self, req: &RetrieveRequest) -> Result<Vec<RetrievedChunk>> {
		let question = validate_question(&req.question)?;

		for (name, value) in [
			("top_k_sparse", req.top_k_sparse),
			("top_k_dense", req.top_k_dense),
			("top_k_final", req.top_k_final),
		] {
			if value == 0 {
				return Err(Error::InvalidRequest {
					message: format!("{name} must be greater than zero."),
				});
			}
		}

		let (sparse, dense) = tokio::join!(
			self.sparse_hits(question, req.top_k_sparse),
			self.dense_hits(question, req.top_k_dense)
		);
		let fused = fusion::fuse(
			&sparse,
			&dense,
			self.cfg.retrieval.rrf_k,
			req.top_k_final as usize,
		);

		tracing::debug!(
			sparse = sparse.len(),
			dense = dense.len(),
			fused = fused.len(),
			"Fused retrieval candidates."
		);

		Ok(fused)
	}

	/// Re-sorts candidates by reranker score and keeps the best `top_k`.
	///
	/// When the reranker fails the fused order is kept.
	pub async fn rerank(
		&self,
		question: &str,
		candidates: Vec<RetrievedChunk>,
		top_k: usize,
	) -> Vec<RetrievedChunk> {
		if candidates.is_empty() {
			return candidates;
		}

		let docs = candidates.iter().map(|hit| hit.chunk.text.clone()).collect::<Vec<_>>();
		let scores =
			match self.providers.rerank.rerank(&self.cfg.providers.rerank, question, &docs).await {
				Ok(scores) if scores.len() == candidates.len() => scores,
				Ok(scores) => {
					tracing::warn!(
						expected = candidates.len(),
						received = scores.len(),
						"Reranker returned misaligned scores; keeping fused order."
					);

					return truncated(candidates, top_k);
				},
				Err(err) => {
					tracing::warn!(error = %err, "Reranker failed; keeping fused order.");

					return truncated(candidates, top_k);
				},
			};
		let mut reranked = candidates
			.into_iter()
			.zip(scores)
			.map(|(hit, score)| hit.with_rerank_score(score))
			.collect::<Vec<_>>();

		reranked.sort_by(|left, right| sort_key(right).total_cmp(&sort_key(left)));
		reranked.truncate(top_k);

		reranked
	}

	/// Groups ranked chunks into evidence blocks under the block and token limits.
	pub fn assemble(
		&self,
		chunks: &[RetrievedChunk],
		limits: evidence::EvidenceLimits,
	) -> Result<Vec<EvidenceBlock>> {
		Ok(evidence::assemble(chunks, limits, &self.tokens)?)
	}

	/// Retrieval, reranking and assembly with the configured limits.
	pub async fn evidence(&self, question: &str) -> Result<EvidenceResponse> {
		let question = validate_question(question)?;
		let req = RetrieveRequest::new(question, &self.cfg.retrieval);
		let candidates = self.retrieve(&req).await?;
		let reranked =
			self.rerank(question, candidates, self.cfg.retrieval.rerank_top_k as usize).await;
		let evidences = self.assemble(&reranked, (&self.cfg.evidence).into())?;

		Ok(EvidenceResponse { question: question.to_string(), evidences })
	}

	/// Answers from the assembled evidence, or reports that there was none.
	pub async fn ask(&self, question: &str) -> Result<AskOutcome> {
		let EvidenceResponse { question, evidences } = self.evidence(question).await?;

		if evidences.is_empty() {
			tracing::info!("No evidence found for question.");

			return Ok(AskOutcome::NoEvidence);
		}

		let user = prompts::build_user_prompt(&question, &evidences);
		let raw = self
			.providers
			.completion
			.complete(&self.cfg.providers.llm, prompts::SYSTEM_PROMPT, &user)
			.await?;
		let answer = prompts::with_disclaimer(&raw, &self.cfg.answer.medical_disclaimer);

		Ok(AskOutcome::Answered { answer, evidences })
	}

	async fn sparse_hits(&self, question: &str, top_k: u32) -> Vec<RetrievedChunk> {
		match self.backends.sparse.search(question, top_k).await {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, "Sparse search failed; continuing without it.");

				Vec::new()
			},
		}
	}

	async fn dense_hits(&self, question: &str, top_k: u32) -> Vec<RetrievedChunk> {
		match self.dense_search(question, top_k).await {
			Ok(hits) => hits,
			Err(err) => {
				tracing::warn!(error = %err, "Dense search failed; continuing without it.");

				Vec::new()
			},
		}
	}

	async fn dense_search(&self, question: &str, top_k: u32) -> Result<Vec<RetrievedChunk>> {
		let embedded = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &[question.to_string()])
			.await?;
		let Some(vector) = embedded.into_iter().next() else {
			return Err(Error::Provider {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::Provider {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		let lang = Some(self.cfg.retrieval.language.as_str()).filter(|lang| !lang.is_empty());

		self.backends.dense.search(vector, top_k, lang).await
	}
}

fn validate_question(question: &str) -> Result<&str> {
	let trimmed = question.trim();

	if trimmed.chars().count() < MIN_QUESTION_CHARS {
		return Err(Error::InvalidRequest {
			message: format!("Question must be at least {MIN_QUESTION_CHARS} characters."),
		});
	}

	Ok(trimmed)
}

fn truncated(mut candidates: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
	candidates.truncate(top_k);

	candidates
}

// NaN scores sort last.
fn sort_key(hit: &RetrievedChunk) -> f32 {
	hit.rerank_score().filter(|score| !score.is_nan()).unwrap_or(f32::NEG_INFINITY)
}
