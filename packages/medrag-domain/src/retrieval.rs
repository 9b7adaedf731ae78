use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, PageRange};

/// A chunk as seen by one query, with the scores each pipeline stage attached.
///
/// Scores are only settable through the constructors that belong to each stage, so a
/// sparse hit never carries a dense score and only fusion produces `fused_score`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
	#[serde(flatten)]
	pub chunk: Chunk,
	#[serde(default)]
	sparse_score: Option<f32>,
	#[serde(default)]
	dense_score: Option<f32>,
	#[serde(default)]
	fused_score: Option<f32>,
	#[serde(default)]
	rerank_score: Option<f32>,
}
impl RetrievedChunk {
	pub fn sparse(chunk: Chunk, score: f32) -> Self {
		Self {
			chunk,
			sparse_score: Some(score),
			dense_score: None,
			fused_score: None,
			rerank_score: None,
		}
	}

	pub fn dense(chunk: Chunk, score: f32) -> Self {
		Self {
			chunk,
			sparse_score: None,
			dense_score: Some(score),
			fused_score: None,
			rerank_score: None,
		}
	}

	pub fn fused(
		chunk: Chunk,
		sparse_score: Option<f32>,
		dense_score: Option<f32>,
		fused_score: f32,
	) -> Self {
		Self { chunk, sparse_score, dense_score, fused_score: Some(fused_score), rerank_score: None }
	}

	pub fn with_rerank_score(self, score: f32) -> Self {
		Self { rerank_score: Some(score), ..self }
	}

	pub fn chunk_id(&self) -> &str {
		&self.chunk.chunk_id
	}

	pub fn sparse_score(&self) -> Option<f32> {
		self.sparse_score
	}

	pub fn dense_score(&self) -> Option<f32> {
		self.dense_score
	}

	pub fn fused_score(&self) -> Option<f32> {
		self.fused_score
	}

	pub fn rerank_score(&self) -> Option<f32> {
		self.rerank_score
	}
}

/// Citation unit handed to answer generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBlock {
	/// Display label, `Doc N`, assigned in final rank order.
	pub id: String,
	pub doc_id: String,
	pub guideline_id: String,
	pub guideline_title: String,
	pub year: Option<i32>,
	pub organization: Option<String>,
	pub section_id: Option<String>,
	pub section_title: Option<String>,
	pub page_range: Option<PageRange>,
	pub text: String,
	pub rec_class_list: Vec<String>,
	pub loe_list: Vec<String>,
	pub chunk_ids: Vec<String>,
}
