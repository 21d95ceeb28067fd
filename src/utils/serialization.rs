// Canonical JSON: compact, keys sorted at every nesting level.
// serde_json's Map is a BTreeMap unless `preserve_order` is enabled, so going
// through `Value` sorts every object regardless of struct field order.
use crate::error::{BlockchainError, Result};
use serde::Serialize;

pub fn canonical_json<T: Serialize>(data: &T) -> Result<String> {
    let value = serde_json::to_value(data)
        .map_err(|e| BlockchainError::Serialization(format!("Canonicalization failed: {e}")))?;
    serde_json::to_string(&value)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}
