use crate::error::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex SHA-256 of the compact JSON encoding of `value`.
///
/// Struct fields serialize in declaration order and maps are `BTreeMap`s, so equal
/// content always hashes the same.
pub fn integrity_hash<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}
