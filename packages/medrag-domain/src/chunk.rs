use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::default_lang;

pub const META_PARAGRAPH_IDS: &str = "paragraph_ids";
pub const META_PARAGRAPH_COUNT: &str = "paragraph_count";
pub const META_CARRIED_PARAGRAPHS: &str = "carried_paragraphs";

/// Inclusive page span. `start <= end` holds for every constructed value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u32, u32)", into = "(u32, u32)")]
pub struct PageRange {
	start: u32,
	end: u32,
}
impl PageRange {
	pub fn new(start: u32, end: u32) -> Option<Self> {
		(start <= end).then_some(Self { start, end })
	}

	pub fn single(page: u32) -> Self {
		Self { start: page, end: page }
	}

	/// Smallest range covering every page, or `None` when there are no pages.
	pub fn spanning<I>(pages: I) -> Option<Self>
	where
		I: IntoIterator<Item = u32>,
	{
		pages.into_iter().map(Self::single).reduce(Self::merge)
	}

	pub fn start(self) -> u32 {
		self.start
	}

	pub fn end(self) -> u32 {
		self.end
	}

	pub fn merge(self, other: Self) -> Self {
		Self { start: self.start.min(other.start), end: self.end.max(other.end) }
	}

	pub fn merge_options(left: Option<Self>, right: Option<Self>) -> Option<Self> {
		match (left, right) {
			(Some(left), Some(right)) => Some(left.merge(right)),
			(left, None) => left,
			(None, right) => right,
		}
	}
}
impl TryFrom<(u32, u32)> for PageRange {
	type Error = String;

	fn try_from((start, end): (u32, u32)) -> Result<Self, Self::Error> {
		Self::new(start, end)
			.ok_or_else(|| format!("page_range start {start} is greater than end {end}"))
	}
}
impl From<PageRange> for (u32, u32) {
	fn from(range: PageRange) -> Self {
		(range.start, range.end)
	}
}

/// Retrieval unit produced at ingestion time and stored by the indexes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub chunk_id: String,
	pub guideline_id: String,
	pub guideline_title: String,
	#[serde(default)]
	pub year: Option<i32>,
	#[serde(default)]
	pub organization: Option<String>,
	#[serde(default)]
	pub section_id: Option<String>,
	#[serde(default)]
	pub section_title: Option<String>,
	#[serde(default)]
	pub page_range: Option<PageRange>,
	#[serde(default = "default_lang")]
	pub lang: String,
	pub text: String,
	#[serde(default)]
	pub rec_class_list: Vec<String>,
	#[serde(default)]
	pub loe_list: Vec<String>,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}
impl Chunk {
	pub fn build_id(guideline_id: &str, section_id: Option<&str>, counter: u32) -> String {
		let section = section_id.unwrap_or("section");

		format!("{guideline_id}-{section}-{counter:04}")
	}

	/// Evidence grouping key: chunks of one section share it, section-less chunks stand alone.
	pub fn group_key(&self) -> (&str, &str) {
		(self.guideline_id.as_str(), self.section_id.as_deref().unwrap_or(self.chunk_id.as_str()))
	}

	/// Order indices of the constituent paragraphs, carried-over ones included.
	pub fn paragraph_orders(&self) -> Vec<u64> {
		self.metadata
			.get(META_PARAGRAPH_IDS)
			.and_then(Value::as_array)
			.map(|ids| ids.iter().filter_map(Value::as_u64).collect())
			.unwrap_or_default()
	}

	/// Number of leading paragraphs repeated from the previous chunk of the section.
	pub fn carried_paragraphs(&self) -> usize {
		self.metadata.get(META_CARRIED_PARAGRAPHS).and_then(Value::as_u64).unwrap_or(0) as usize
	}
}
