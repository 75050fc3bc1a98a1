//! Compiled unit file format
//!
//! Layout: a 16-byte little-endian header (magic, format version, CRC-32 of
//! the payload, payload length) followed by the bincode payload.

use thiserror::Error;

use super::function::CompiledUnit;

/// Magic number for Sola bytecode files: "SOLA"
pub const MAGIC: [u8; 4] = *b"SOLA";

/// Current format version
pub const VERSION: u32 = 1;

/// Header size in bytes
pub const HEADER_LEN: usize = 16;

/// Encoding/decoding errors
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Input too short: {0} bytes")]
    Truncated(usize),

    #[error("Invalid magic number: expected SOLA, got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    #[error("Payload length mismatch: header says {expected}, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Serialize a compiled unit with its header
pub fn serialize_to_bytes(unit: &CompiledUnit) -> Result<Vec<u8>, EncodeError> {
    let payload = bincode::serialize(unit).map_err(|e| EncodeError::Serialization(e.to_string()))?;
    let length = u32::try_from(payload.len())
        .map_err(|_| EncodeError::Serialization("payload larger than 4 GiB".to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    bytes.extend_from_slice(&length.to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Check magic, version, length and checksum without decoding the payload
pub fn validate_header(bytes: &[u8]) -> Result<(), EncodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(EncodeError::Truncated(bytes.len()));
    }
    let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if magic != MAGIC {
        return Err(EncodeError::InvalidMagic(magic));
    }
    let version = read_u32(bytes, 4);
    if version != VERSION {
        return Err(EncodeError::UnsupportedVersion(version));
    }

    let payload = &bytes[HEADER_LEN..];
    let expected_len = read_u32(bytes, 12) as usize;
    if payload.len() != expected_len {
        return Err(EncodeError::LengthMismatch {
            expected: expected_len,
            actual: payload.len(),
        });
    }
    let stored = read_u32(bytes, 8);
    let actual = crc32fast::hash(payload);
    if stored != actual {
        return Err(EncodeError::ChecksumMismatch {
            expected: stored,
            actual,
        });
    }
    Ok(())
}

/// Validate the header and decode the unit
pub fn deserialize_from_bytes(bytes: &[u8]) -> Result<CompiledUnit, EncodeError> {
    validate_header(bytes)?;
    bincode::deserialize(&bytes[HEADER_LEN..]).map_err(|e| EncodeError::Serialization(e.to_string()))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
