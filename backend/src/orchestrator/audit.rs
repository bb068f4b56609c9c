//! Audit digests
//!
//! Deterministic SHA-256 digests over canonical JSON. The configuration hash
//! ties a report to the rules that produced it; the payout digest lets the
//! persistence collaborator detect a second payout for the same cycle.

use crate::orchestrator::engine::PipelineError;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex SHA-256 of `value` rendered as key-sorted compact JSON.
pub fn compute_digest<T: Serialize>(value: &T) -> Result<String, PipelineError> {
    let tree = serde_json::to_value(value).map_err(digest_error)?;
    let canonical = serde_json::to_vec(&sort_keys(tree)).map_err(digest_error)?;

    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

/// Object keys in lexical order at every depth; arrays keep their order.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<(String, Value)> = fields.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, field)| (key, sort_keys(field)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        leaf => leaf,
    }
}

fn digest_error(err: serde_json::Error) -> PipelineError {
    PipelineError::Serialization(format!("digest input not serializable: {}", err))
}
