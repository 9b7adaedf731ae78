//! Reciprocal rank fusion of the sparse and dense candidate lists.

use std::collections::HashMap;

use medrag_domain::{Chunk, RetrievedChunk};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Source {
	Sparse,
	Dense,
}

struct Fused<'a> {
	chunk: &'a Chunk,
	sparse_score: Option<f32>,
	dense_score: Option<f32>,
	fused_score: f64,
}

/// Accumulates `1 / (k + rank)` per chunk id across ranked lists.
///
/// Every occurrence contributes, including a repeated id within one list; the side score is
/// taken from the latest occurrence.
///
/// Entries stay in discovery order, so the stable sort in [`RrfAccumulator::finish`] breaks
/// score ties by first appearance.
struct RrfAccumulator<'a> {
	k: f64,
	entries: Vec<Fused<'a>>,
	by_id: HashMap<&'a str, usize>,
}
impl<'a> RrfAccumulator<'a> {
	fn new(k: u32) -> Self {
		Self { k: f64::from(k), entries: Vec::new(), by_id: HashMap::new() }
	}

	fn add(&mut self, list: &'a [RetrievedChunk], source: Source) {
		for (idx, hit) in list.iter().enumerate() {
			let contribution = 1.0 / (self.k + (idx + 1) as f64);
			let slot = match self.by_id.get(hit.chunk_id()) {
				Some(slot) => *slot,
				None => {
					self.entries.push(Fused {
						chunk: &hit.chunk,
						sparse_score: None,
						dense_score: None,
						fused_score: 0.0,
					});
					self.by_id.insert(hit.chunk_id(), self.entries.len() - 1);

					self.entries.len() - 1
				},
			};
			let entry = &mut self.entries[slot];

			match source {
				Source::Sparse => entry.sparse_score = hit.sparse_score(),
				Source::Dense => entry.dense_score = hit.dense_score(),
			}

			entry.fused_score += contribution;
		}
	}

	fn finish(mut self, top_k: usize) -> Vec<RetrievedChunk> {
		self.entries.sort_by(|left, right| right.fused_score.total_cmp(&left.fused_score));
		self.entries.truncate(top_k);

		self.entries
			.into_iter()
			.map(|entry| {
				RetrievedChunk::fused(
					entry.chunk.clone(),
					entry.sparse_score,
					entry.dense_score,
					entry.fused_score as f32,
				)
			})
			.collect()
	}
}

/// Merges two best-first lists into at most `top_k` chunks ordered by fused score.
pub fn fuse(
	sparse: &[RetrievedChunk],
	dense: &[RetrievedChunk],
	rrf_k: u32,
	top_k: usize,
) -> Vec<RetrievedChunk> {
	let mut acc = RrfAccumulator::new(rrf_k);

	acc.add(sparse, Source::Sparse);
	acc.add(dense, Source::Dense);

	acc.finish(top_k)
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn chunk(id: &str) -> Chunk {
		Chunk {
			chunk_id: id.to_string(),
			guideline_id: "g".to_string(),
			guideline_title: "G".to_string(),
			year: None,
			organization: None,
			section_id: None,
			section_title: None,
			page_range: None,
			lang: "en".to_string(),
			text: id.to_string(),
			rec_class_list: Vec::new(),
			loe_list: Vec::new(),
			metadata: Map::new(),
		}
	}

	#[test]
	fn repeated_ids_in_one_list_add_every_rank() {
		let sparse = vec![
			RetrievedChunk::sparse(chunk("a"), 9.0),
			RetrievedChunk::sparse(chunk("a"), 1.0),
			RetrievedChunk::sparse(chunk("b"), 0.5),
		];
		let fused = fuse(&sparse, &[], 50, 10);
		let expected = (1.0 / 51.0 + 1.0 / 52.0) as f32;

		assert_eq!(fused.len(), 2);
		assert_eq!(fused[0].sparse_score(), Some(1.0));
		assert!((fused[0].fused_score().unwrap_or_default() - expected).abs() < 1e-7);
		assert!((fused[1].fused_score().unwrap_or_default() - 1.0 / 53.0).abs() < 1e-7);
	}

	#[test]
	fn ties_keep_discovery_order() {
		let sparse = vec![RetrievedChunk::sparse(chunk("s"), 1.0)];
		let dense = vec![RetrievedChunk::dense(chunk("d"), 1.0)];
		let fused = fuse(&sparse, &dense, 50, 10);
		let ids = fused.iter().map(RetrievedChunk::chunk_id).collect::<Vec<_>>();

		assert_eq!(ids, vec!["s", "d"]);
	}
}
