use std::io::{self, BufRead, IsTerminal, Write};

use tokenizers::Tokenizer;

use crate::{Error, Result};

/// Token counting strategy shared by ingestion and evidence assembly.
pub enum TokenCounter {
	Subword(Box<Tokenizer>),
	/// Whitespace word count. Only reachable through an explicit operator decision.
	Whitespace,
}
impl TokenCounter {
	pub fn count(&self, text: &str) -> Result<usize> {
		match self {
			Self::Subword(tokenizer) => tokenizer
				.encode(text, false)
				.map(|encoding| encoding.len())
				.map_err(|err| Error::Tokenizer { message: err.to_string() }),
			Self::Whitespace => Ok(text.split_whitespace().count()),
		}
	}

	pub fn is_approximate(&self) -> bool {
		matches!(self, Self::Whitespace)
	}
}
impl std::fmt::Debug for TokenCounter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Subword(_) => f.write_str("TokenCounter::Subword"),
			Self::Whitespace => f.write_str("TokenCounter::Whitespace"),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackDecision {
	Approved,
	Rejected,
	/// No operator is available to ask.
	Unavailable,
}

pub trait FallbackApproval {
	fn decide(&self, reason: &str) -> FallbackDecision;
}

/// Asks on the controlling terminal; never approves when stdin is not a terminal.
pub struct TerminalApproval;
impl FallbackApproval for TerminalApproval {
	fn decide(&self, reason: &str) -> FallbackDecision {
		let stdin = io::stdin();

		if !stdin.is_terminal() {
			return FallbackDecision::Unavailable;
		}

		let mut stderr = io::stderr();
		let prompt = format!(
			"Failed to load the tokenizer: {reason}.\nType 'fallback' to continue with approximate whitespace token counts, or press Enter to abort: "
		);

		if stderr.write_all(prompt.as_bytes()).and_then(|_| stderr.flush()).is_err() {
			return FallbackDecision::Unavailable;
		}

		let mut answer = String::new();

		if stdin.lock().read_line(&mut answer).is_err() {
			return FallbackDecision::Unavailable;
		}

		if matches!(answer.trim().to_lowercase().as_str(), "fallback" | "f" | "y" | "yes") {
			FallbackDecision::Approved
		} else {
			FallbackDecision::Rejected
		}
	}
}

/// Non-interactive contexts such as tests and background jobs.
pub struct DenyFallback;
impl FallbackApproval for DenyFallback {
	fn decide(&self, _reason: &str) -> FallbackDecision {
		FallbackDecision::Unavailable
	}
}

/// Loads the configured subword tokenizer, failing closed when it is unavailable.
pub fn load_token_counter(
	cfg: &medrag_config::Tokenizer,
	approval: &dyn FallbackApproval,
) -> Result<TokenCounter> {
	let reason = match load_subword(cfg) {
		Ok(tokenizer) => return Ok(TokenCounter::Subword(Box::new(tokenizer))),
		Err(reason) => reason,
	};

	if cfg.allow_fallback {
		tracing::warn!(
			reason = %reason,
			"Tokenizer unavailable; using whitespace token counts because tokenizer.allow_fallback is set."
		);

		return Ok(TokenCounter::Whitespace);
	}

	match approval.decide(&reason) {
		FallbackDecision::Approved => {
			tracing::warn!(reason = %reason, "Operator approved whitespace token fallback.");

			Ok(TokenCounter::Whitespace)
		},
		FallbackDecision::Rejected => Err(Error::FallbackRejected { reason }),
		FallbackDecision::Unavailable => Err(Error::TokenizerUnavailable { reason }),
	}
}

fn load_subword(cfg: &medrag_config::Tokenizer) -> std::result::Result<Tokenizer, String> {
	if let Some(path) = cfg.path.as_ref() {
		return Tokenizer::from_file(path)
			.map_err(|err| format!("cannot load {}: {err}", path.display()));
	}
	if let Some(repo) = cfg.repo.as_deref() {
		return Tokenizer::from_pretrained(repo, None)
			.map_err(|err| format!("cannot load {repo}: {err}"));
	}

	Err("no tokenizer.repo or tokenizer.path configured".to_string())
}
