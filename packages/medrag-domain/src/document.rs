use serde::{Deserialize, Serialize};

/// One parsed paragraph of a guideline document, as emitted by the document parser.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
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
	pub page: Option<u32>,
	/// Position within the document. Strictly increasing in parser output.
	pub order: u64,
	#[serde(default = "default_lang")]
	pub lang: String,
	pub text: String,
}
impl Paragraph {
	/// Key of the contiguous section run this paragraph belongs to.
	pub fn section_key(&self) -> (&str, Option<&str>) {
		(self.guideline_id.as_str(), self.section_id.as_deref())
	}
}

pub(crate) fn default_lang() -> String {
	"en".to_string()
}
