use std::{
	collections::{HashMap, VecDeque},
	iter::Peekable,
	sync::Arc,
};

use serde_json::{Map, Value};

use medrag_domain::{
	Chunk, PageRange, Paragraph, RecommendationLabeler,
	chunk::{META_CARRIED_PARAGRAPHS, META_PARAGRAPH_COUNT, META_PARAGRAPH_IDS},
};

use crate::{Error, Result, TokenCounter};

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	/// A chunk is emitted as soon as its paragraphs reach this many tokens.
	pub target_tokens: usize,
	/// Ceiling checked before a paragraph joins a non-empty window.
	pub max_tokens: usize,
	/// Trailing paragraphs repeated at the start of the next chunk.
	pub overlap_paragraphs: usize,
}
impl From<&medrag_config::Chunking> for ChunkingConfig {
	fn from(cfg: &medrag_config::Chunking) -> Self {
		Self {
			target_tokens: cfg.target_tokens as usize,
			max_tokens: cfg.max_tokens as usize,
			overlap_paragraphs: cfg.overlap_paragraphs as usize,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FlushReason {
	WouldExceedMax,
	ReachedTarget,
	EndOfRun,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WindowState {
	Accumulating,
	Flushing(FlushReason),
}

struct Flush<'p> {
	reason: FlushReason,
	paragraphs: Vec<&'p Paragraph>,
	carried: usize,
}

/// Sliding paragraph window over one section run.
struct SectionWindow<'p> {
	buffer: Vec<(&'p Paragraph, usize)>,
	tokens: usize,
	/// Leading buffer entries that were already emitted by the previous chunk.
	carried: usize,
	state: WindowState,
}
impl<'p> SectionWindow<'p> {
	fn new() -> Self {
		Self { buffer: Vec::new(), tokens: 0, carried: 0, state: WindowState::Accumulating }
	}

	/// Enters the flushing state when `incoming` would push a non-empty window past the max.
	fn check_capacity(&mut self, incoming: usize, max_tokens: usize) -> bool {
		if !self.buffer.is_empty() && self.tokens + incoming > max_tokens {
			self.state = WindowState::Flushing(FlushReason::WouldExceedMax);

			return true;
		}

		false
	}

	fn append(&mut self, paragraph: &'p Paragraph, tokens: usize, target_tokens: usize) {
		self.buffer.push((paragraph, tokens));

		self.tokens += tokens;

		if self.tokens >= target_tokens {
			self.state = WindowState::Flushing(FlushReason::ReachedTarget);
		}
	}

	fn finish(&mut self) {
		self.state = WindowState::Flushing(FlushReason::EndOfRun);
	}

	/// Leaves the flushing state, keeping the overlap tail as the next seed.
	///
	/// Returns `None` for an empty window. A window holding only carried paragraphs is still
	/// emitted at the end of a run, but is dropped when the next paragraph does not fit.
	fn take_flush(&mut self, overlap: usize) -> Option<Flush<'p>> {
		let WindowState::Flushing(reason) = self.state else {
			return None;
		};

		self.state = WindowState::Accumulating;

		let carried_only = self.buffer.len() <= self.carried;

		if self.buffer.is_empty() || (carried_only && reason == FlushReason::WouldExceedMax) {
			self.buffer.clear();
			self.tokens = 0;
			self.carried = 0;

			return None;
		}

		let paragraphs = self.buffer.iter().map(|(paragraph, _)| *paragraph).collect();
		let carried = self.carried;
		let keep = if reason == FlushReason::EndOfRun { 0 } else { overlap.min(self.buffer.len()) };

		self.buffer.drain(..self.buffer.len() - keep);

		self.tokens = self.buffer.iter().map(|(_, tokens)| tokens).sum();
		self.carried = self.buffer.len();

		Some(Flush { reason, paragraphs, carried })
	}
}

/// Groups ordered paragraphs into token-bounded, overlapping chunks.
pub struct Chunker {
	cfg: ChunkingConfig,
	tokens: Arc<TokenCounter>,
	labeler: RecommendationLabeler,
}
impl Chunker {
	pub fn new(cfg: ChunkingConfig, tokens: Arc<TokenCounter>) -> Result<Self> {
		let labeler = RecommendationLabeler::new()
			.map_err(|err| Error::Pattern { message: err.to_string() })?;

		Ok(Self { cfg, tokens, labeler })
	}

	pub fn config(&self) -> &ChunkingConfig {
		&self.cfg
	}

	/// Lazily chunks an in-memory paragraph sequence.
	pub fn chunk<I>(&self, paragraphs: I) -> ChunkStream<'_, std::iter::Map<I::IntoIter, WrapOk>>
	where
		I: IntoIterator<Item = Paragraph>,
	{
		self.chunk_records(paragraphs.into_iter().map(Ok as WrapOk))
	}

	/// Lazily chunks paragraphs read from a fallible source such as a JSON Lines file.
	pub fn chunk_records<I>(&self, paragraphs: I) -> ChunkStream<'_, I::IntoIter>
	where
		I: IntoIterator<Item = Result<Paragraph>>,
	{
		ChunkStream {
			chunker: self,
			paragraphs: paragraphs.into_iter().peekable(),
			counters: HashMap::new(),
			pending: VecDeque::new(),
			failed: false,
		}
	}

	/// Chunks one contiguous `(guideline_id, section_id)` run.
	fn chunk_section(
		&self,
		run: &[Paragraph],
		counter: &mut u32,
		out: &mut VecDeque<Chunk>,
	) -> Result<()> {
		let mut window = SectionWindow::new();

		for paragraph in run {
			let tokens = self.tokens.count(&paragraph.text)?;

			// The carried seed alone may still leave no room, so re-check after each flush.
			while window.check_capacity(tokens, self.cfg.max_tokens) {
				self.drain(&mut window, counter, out);
			}

			window.append(paragraph, tokens, self.cfg.target_tokens);
			self.drain(&mut window, counter, out);
		}

		window.finish();
		self.drain(&mut window, counter, out);

		Ok(())
	}

	fn drain(&self, window: &mut SectionWindow<'_>, counter: &mut u32, out: &mut VecDeque<Chunk>) {
		let Some(flush) = window.take_flush(self.cfg.overlap_paragraphs) else {
			return;
		};

		*counter += 1;

		let chunk = self.build_chunk(&flush.paragraphs, flush.carried, *counter);

		tracing::debug!(
			chunk_id = %chunk.chunk_id,
			reason = ?flush.reason,
			paragraphs = flush.paragraphs.len(),
			"Emitted chunk."
		);

		out.push_back(chunk);
	}

	fn build_chunk(&self, paragraphs: &[&Paragraph], carried: usize, counter: u32) -> Chunk {
		let first = paragraphs[0];
		let text = paragraphs.iter().map(|paragraph| paragraph.text.as_str()).collect::<Vec<_>>();
		let text = text.join("\n\n");
		let labels = self.labeler.extract(&text);
		let mut metadata = Map::new();

		metadata.insert(
			META_PARAGRAPH_IDS.to_string(),
			Value::from(paragraphs.iter().map(|paragraph| paragraph.order).collect::<Vec<_>>()),
		);
		metadata.insert(META_PARAGRAPH_COUNT.to_string(), Value::from(paragraphs.len()));
		metadata.insert(META_CARRIED_PARAGRAPHS.to_string(), Value::from(carried));

		Chunk {
			chunk_id: Chunk::build_id(&first.guideline_id, first.section_id.as_deref(), counter),
			guideline_id: first.guideline_id.clone(),
			guideline_title: first.guideline_title.clone(),
			year: first.year,
			organization: first.organization.clone(),
			section_id: first.section_id.clone(),
			section_title: first.section_title.clone(),
			page_range: PageRange::spanning(paragraphs.iter().filter_map(|paragraph| paragraph.page)),
			lang: first.lang.clone(),
			text,
			rec_class_list: labels.rec_classes,
			loe_list: labels.loe,
			metadata,
		}
	}
}

pub type WrapOk = fn(Paragraph) -> Result<Paragraph>;

/// Iterator of chunks over a paragraph source. Stops after the first error.
pub struct ChunkStream<'a, I>
where
	I: Iterator<Item = Result<Paragraph>>,
{
	chunker: &'a Chunker,
	paragraphs: Peekable<I>,
	/// Chunk sequence per guideline, so section runs of one document never share an id.
	counters: HashMap<String, u32>,
	pending: VecDeque<Chunk>,
	failed: bool,
}
impl<I> ChunkStream<'_, I>
where
	I: Iterator<Item = Result<Paragraph>>,
{
	fn next_run(&mut self) -> Option<Result<Vec<Paragraph>>> {
		let first = match self.paragraphs.next()? {
			Ok(paragraph) => paragraph,
			Err(err) => return Some(Err(err)),
		};
		let guideline_id = first.guideline_id.clone();
		let section_id = first.section_id.clone();
		let mut run = vec![first];

		while let Some(Ok(paragraph)) = self.paragraphs.next_if(|item| {
			matches!(
				item,
				Ok(next) if next.guideline_id == guideline_id && next.section_id == section_id
			)
		}) {
			run.push(paragraph);
		}

		Some(Ok(run))
	}
}
impl<I> Iterator for ChunkStream<'_, I>
where
	I: Iterator<Item = Result<Paragraph>>,
{
	type Item = Result<Chunk>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			if let Some(chunk) = self.pending.pop_front() {
				return Some(Ok(chunk));
			}
			if self.failed {
				return None;
			}

			let run = match self.next_run()? {
				Ok(run) => run,
				Err(err) => {
					self.failed = true;

					return Some(Err(err));
				},
			};
			let counter = self.counters.entry(run[0].guideline_id.clone()).or_insert(0);

			if let Err(err) = self.chunker.chunk_section(&run, counter, &mut self.pending) {
				self.failed = true;

				return Some(Err(err));
			}
		}
	}
}
