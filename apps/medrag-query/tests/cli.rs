use clap::Parser;

use medrag_query::{Args, Command};

#[test]
fn retrieve_accepts_list_size_overrides() {
	let args = Args::try_parse_from([
		"medrag-query",
		"-c",
		"medrag.toml",
		"retrieve",
		"What is the LDL target after ACS?",
		"--top-k-final",
		"5",
	])
	.expect("Failed to parse args.");
	let Command::Retrieve { question, top_k_sparse, top_k_final, .. } = args.command else {
		panic!("Expected the retrieve command.");
	};

	assert_eq!(question, "What is the LDL target after ACS?");
	assert_eq!(top_k_sparse, None);
	assert_eq!(top_k_final, Some(5));
}

#[test]
fn ask_requires_a_question() {
	assert!(Args::try_parse_from(["medrag-query", "-c", "medrag.toml", "ask"]).is_err());
}
