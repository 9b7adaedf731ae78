//! Grouping of ranked chunks into citation blocks and budgeted block selection.

use std::collections::HashMap;

use medrag_chunking::TokenCounter;
use medrag_domain::{EvidenceBlock, PageRange, RetrievedChunk, recommendation::union_labels};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvidenceLimits {
	pub max_blocks: usize,
	/// Total token ceiling across admitted blocks. The first block is admitted regardless.
	pub max_tokens: usize,
}
impl From<&medrag_config::Evidence> for EvidenceLimits {
	fn from(cfg: &medrag_config::Evidence) -> Self {
		Self { max_blocks: cfg.max_blocks as usize, max_tokens: cfg.max_tokens as usize }
	}
}

/// Groups chunks by `(guideline_id, section_id or chunk_id)` in first-occurrence order.
///
/// Blocks come back unlabeled; ids are assigned by [`select`].
pub fn group(chunks: &[RetrievedChunk]) -> Vec<EvidenceBlock> {
	let mut blocks: Vec<EvidenceBlock> = Vec::new();
	let mut by_key: HashMap<(&str, &str), usize> = HashMap::new();

	for hit in chunks {
		let chunk = &hit.chunk;

		if let Some(&idx) = by_key.get(&chunk.group_key()) {
			let block = &mut blocks[idx];

			block.text.push_str("\n\n");
			block.text.push_str(&chunk.text);
			block.page_range = PageRange::merge_options(block.page_range, chunk.page_range);
			block.rec_class_list = union_labels(&block.rec_class_list, &chunk.rec_class_list);
			block.loe_list = union_labels(&block.loe_list, &chunk.loe_list);
			block.chunk_ids.push(chunk.chunk_id.clone());

			continue;
		}

		by_key.insert(chunk.group_key(), blocks.len());
		blocks.push(EvidenceBlock {
			id: String::new(),
			doc_id: chunk.guideline_id.clone(),
			guideline_id: chunk.guideline_id.clone(),
			guideline_title: chunk.guideline_title.clone(),
			year: chunk.year,
			organization: chunk.organization.clone(),
			section_id: chunk.section_id.clone(),
			section_title: chunk.section_title.clone(),
			page_range: chunk.page_range,
			text: chunk.text.clone(),
			rec_class_list: union_labels(&chunk.rec_class_list, &[]),
			loe_list: union_labels(&chunk.loe_list, &[]),
			chunk_ids: vec![chunk.chunk_id.clone()],
		});
	}

	blocks
}

/// Admits blocks in rank order until the block count or token budget is exhausted.
///
/// Selection stops at the first block that does not fit; later, smaller blocks are never
/// pulled forward.
pub fn select(
	blocks: Vec<EvidenceBlock>,
	limits: EvidenceLimits,
	tokens: &TokenCounter,
) -> medrag_chunking::Result<Vec<EvidenceBlock>> {
	let mut selected = Vec::new();
	let mut remaining = limits.max_tokens;

	for mut block in blocks {
		if selected.len() >= limits.max_blocks {
			break;
		}

		let cost = tokens.count(&block.text)?;

		if cost > remaining && !selected.is_empty() {
			break;
		}

		remaining = remaining.saturating_sub(cost);
		block.id = format!("Doc {}", selected.len() + 1);

		selected.push(block);
	}

	Ok(selected)
}

pub fn assemble(
	chunks: &[RetrievedChunk],
	limits: EvidenceLimits,
	tokens: &TokenCounter,
) -> medrag_chunking::Result<Vec<EvidenceBlock>> {
	select(group(chunks), limits, tokens)
}
