//! Content hashing
//!
//! A file's identity in the build cache is the SHA-256 of its bytes, as a
//! lowercase hex string.

use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn hash_string(content: &str) -> String {
    hash_bytes(content.as_bytes())
}

/// Hash the current contents of a file
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}
