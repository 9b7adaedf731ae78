//! Conversion between chunk records and Qdrant point payloads.
//!
//! A point payload is the chunk record itself, so a search hit deserializes straight
//! back into a [`Chunk`].

use std::collections::HashMap;

use qdrant_client::{
	Payload,
	qdrant::{Value, value::Kind},
};
use serde_json::{Map, Number, Value as JsonValue};
use uuid::Uuid;

use medrag_domain::Chunk;

use crate::{Error, Result};

/// Deterministic point id for a chunk, so re-indexing overwrites instead of duplicating.
pub fn point_id(chunk_id: &str) -> String {
	Uuid::new_v5(&Uuid::NAMESPACE_DNS, chunk_id.as_bytes()).to_string()
}

pub fn chunk_payload(chunk: &Chunk) -> Result<Payload> {
	let JsonValue::Object(fields) = serde_json::to_value(chunk)? else {
		return Err(Error::Payload {
			point: chunk.chunk_id.clone(),
			message: "chunk did not serialize to an object".to_string(),
		});
	};
	let mut payload = Payload::new();

	for (key, value) in fields {
		payload.insert(key, Value::from(value));
	}

	Ok(payload)
}

pub fn chunk_from_payload(point: &str, payload: HashMap<String, Value>) -> Result<Chunk> {
	let object = payload.into_iter().map(|(key, value)| (key, to_json(value))).collect::<Map<_, _>>();

	serde_json::from_value(JsonValue::Object(object))
		.map_err(|err| Error::Payload { point: point.to_string(), message: err.to_string() })
}

fn to_json(value: Value) -> JsonValue {
	match value.kind {
		None | Some(Kind::NullValue(_)) => JsonValue::Null,
		Some(Kind::BoolValue(flag)) => JsonValue::Bool(flag),
		Some(Kind::IntegerValue(number)) => JsonValue::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map(JsonValue::Number).unwrap_or(JsonValue::Null),
		Some(Kind::StringValue(text)) => JsonValue::String(text),
		Some(Kind::ListValue(list)) => JsonValue::Array(list.values.into_iter().map(to_json).collect()),
		Some(Kind::StructValue(object)) => JsonValue::Object(
			object.fields.into_iter().map(|(key, value)| (key, to_json(value))).collect(),
		),
	}
}
