use std::collections::BTreeSet;

use regex::Regex;

// Longer codes come first so `Class IIa` is not cut short at `II`.
const REC_CLASS_PATTERN: &str = r"(?i)\bclass\s+(?:iia|iib|iii|ii|iv|i|v)\b";
const LOE_PATTERN: &str = r"(?i)\blevel\s+[abc]\b";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecommendationLabels {
	pub rec_classes: Vec<String>,
	pub loe: Vec<String>,
}

/// Extracts class-of-recommendation and level-of-evidence labels from guideline text.
#[derive(Clone, Debug)]
pub struct RecommendationLabeler {
	rec_class: Regex,
	loe: Regex,
}
impl RecommendationLabeler {
	pub fn new() -> Result<Self, regex::Error> {
		Ok(Self { rec_class: Regex::new(REC_CLASS_PATTERN)?, loe: Regex::new(LOE_PATTERN)? })
	}

	pub fn extract(&self, text: &str) -> RecommendationLabels {
		RecommendationLabels {
			rec_classes: collect_labels(&self.rec_class, text),
			loe: collect_labels(&self.loe, text),
		}
	}
}

/// Sorted union of two label lists without duplicates.
pub fn union_labels(left: &[String], right: &[String]) -> Vec<String> {
	left.iter().chain(right).cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

fn collect_labels(pattern: &Regex, text: &str) -> Vec<String> {
	pattern
		.find_iter(text)
		.map(|found| normalize_label(found.as_str()))
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect()
}

fn normalize_label(raw: &str) -> String {
	let mut words = raw.split_whitespace();
	let Some(keyword) = words.next() else {
		return String::new();
	};
	let mut out = title_case(keyword);

	for word in words {
		out.push(' ');

		if word.chars().all(char::is_alphabetic) {
			out.push_str(&word.to_uppercase());
		} else {
			out.push_str(word);
		}
	}

	out
}

fn title_case(word: &str) -> String {
	let mut chars = word.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
		None => String::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_case_and_whitespace() {
		assert_eq!(normalize_label("CLASS   iia"), "Class IIA");
		assert_eq!(normalize_label("level\tb"), "Level B");
	}

	#[test]
	fn prefers_longest_class_code() {
		let labeler = RecommendationLabeler::new().expect("patterns compile");
		let labels = labeler.extract("Anticoagulation is reasonable (Class IIa, Level B-R).");

		assert_eq!(labels.rec_classes, vec!["Class IIA".to_string()]);
		assert_eq!(labels.loe, vec!["Level B".to_string()]);
	}

	#[test]
	fn ignores_words_that_only_start_with_a_code() {
		let labeler = RecommendationLabeler::new().expect("patterns compile");
		let labels = labeler.extract("Classification of NYHA class Ivory; level above normal.");

		assert!(labels.rec_classes.is_empty());
		assert!(labels.loe.is_empty());
	}
}
