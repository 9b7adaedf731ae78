use medrag_domain::EvidenceBlock;

pub const SYSTEM_PROMPT: &str = "\
You are a clinical guideline assistant for cardiovascular care.
Answer clinician questions using only the evidence blocks provided.
Keep answers concise and actionable, and cite supporting evidence as [Doc N].
Name the relevant patient populations, classes of recommendation, and levels of evidence when the evidence states them.
Never invent data. When the evidence is insufficient, say so explicitly.";

/// Renders one block as `[Doc N] title (year) - section (pages a-b)`, its text, and an
/// optional recommendations line.
pub fn format_evidence_block(block: &EvidenceBlock) -> String {
	let mut out = format!("[{}] {}", block.id, block.guideline_title);

	if let Some(year) = block.year {
		out.push_str(&format!(" ({year})"));
	}

	out.push_str(" - ");
	out.push_str(block.section_title.as_deref().unwrap_or("General"));

	if let Some(range) = block.page_range {
		out.push_str(&format!(" (pages {}-{})", range.start(), range.end()));
	}

	out.push('\n');
	out.push_str(block.text.trim());

	if !block.rec_class_list.is_empty() || !block.loe_list.is_empty() {
		let labels = block.rec_class_list.iter().chain(&block.loe_list).cloned().collect::<Vec<_>>();

		out.push_str("\nRecommendations: ");
		out.push_str(&labels.join(", "));
	}

	out
}

pub fn build_user_prompt(question: &str, evidences: &[EvidenceBlock]) -> String {
	let evidence =
		evidences.iter().map(format_evidence_block).collect::<Vec<_>>().join("\n\n");

	format!(
		"Question:\n{}\n\nEvidence:\n{evidence}\n\nInstructions:\n\
- Answer in English.\n\
- Support every conclusion with a citation such as [Doc 1].\n\
- Mention recommendation class and level when available.\n\
- End with a brief safety disclaimer.",
		question.trim()
	)
}

/// Appends the disclaimer unless the answer already contains it (case-insensitive).
pub fn with_disclaimer(answer: &str, disclaimer: &str) -> String {
	let disclaimer = disclaimer.trim();

	if disclaimer.is_empty() || answer.to_lowercase().contains(&disclaimer.to_lowercase()) {
		return answer.trim().to_string();
	}

	let terminal = if disclaimer.ends_with(['.', '!', '?']) { "" } else { "." };

	format!("{}\n\n{disclaimer}{terminal}", answer.trim_end()).trim().to_string()
}
