//! JSON and hashing helpers.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

use crate::error::DominionError;

/// SHA256 of a value's JSON encoding, as hex.
pub fn hash_json<T: Serialize>(value: &T) -> Result<String, DominionError> {
    let bytes = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn write_json_to_path<T: Serialize>(value: &T, path: &Path) -> Result<(), DominionError> {
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path, data)?;
    Ok(())
}

pub fn read_json_from_path<T: DeserializeOwned>(path: &Path) -> Result<T, DominionError> {
    let data = fs::read(path)?;
    Ok(serde_json::from_slice(&data)?)
}
