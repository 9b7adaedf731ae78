use serde_json::Value;

use crate::{Result, error::invalid_response};

/// Runs one chat completion and returns the assistant message text.
pub async fn complete(
	cfg: &medrag_config::LlmProviderConfig,
	system: &str,
	user: &str,
) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"max_tokens": cfg.max_output_tokens,
		"messages": [
			{ "role": "system", "content": system },
			{ "role": "user", "content": user },
		],
	});
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion_response(&json)
}

fn parse_completion_response(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| invalid_response("Completion response is missing message content."))?;

	Ok(content.trim().to_string())
}
