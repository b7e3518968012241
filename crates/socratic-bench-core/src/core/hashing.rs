// crates/socratic-bench-core/src/core/hashing.rs
// ============================================================================
// Module: Socratic Bench Canonical Hashing
// Description: RFC 8785 canonical JSON serialization and digests.
// Purpose: Content-address manifests and curated artifacts deterministically.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Manifest identifiers and curated artifacts are content-addressed over the
//! RFC 8785 (JCS) canonical form of their JSON encoding: object keys sorted
//! lexicographically, arrays in declared order, normalized number rendering,
//! and no insignificant whitespace. The same canonical bytes are used for
//! hashing and for byte-identical curated blob writes, so duplicate
//! deliveries produce identical artifacts. Non-finite floats are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::fmt::Write as _;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default hash algorithm for content addressing.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

/// Maximum canonical payload size accepted for hashing, in bytes.
pub const MAX_CANONICAL_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Hash Model
// ============================================================================

/// Supported hash algorithms.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    #[default]
    Sha256,
}

impl HashAlgorithm {
    /// Returns the stable label for the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }
}

/// Hash digest with its producing algorithm.
///
/// # Invariants
/// - `hex` is the lowercase hexadecimal rendering of the digest bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashDigest {
    /// Algorithm that produced the digest.
    pub algorithm: HashAlgorithm,
    /// Lowercase hexadecimal digest value.
    pub hex: String,
}

impl HashDigest {
    /// Returns the hexadecimal digest value.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.hex)
    }
}

// ============================================================================
// SECTION: Hash Errors
// ============================================================================

/// Canonicalization and hashing errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HashError {
    /// Value could not be canonicalized (for example non-finite floats).
    #[error("canonicalization failure: {0}")]
    Canonicalization(String),
    /// Canonical payload exceeds the permitted size.
    #[error("canonical payload too large: {actual_bytes} > {max_bytes}")]
    SizeLimitExceeded {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual canonical payload size in bytes.
        actual_bytes: usize,
    },
}

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Serializes a value into RFC 8785 canonical JSON bytes.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when the value cannot be
/// canonicalized (for example NaN or infinite floats).
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Serializes a value into canonical JSON bytes, enforcing a size limit.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] on canonicalization failure and
/// [`HashError::SizeLimitExceeded`] when the canonical form exceeds `max_bytes`.
pub fn canonical_json_bytes_with_limit<T: Serialize>(
    value: &T,
    max_bytes: usize,
) -> Result<Vec<u8>, HashError> {
    let bytes = canonical_json_bytes(value)?;
    if bytes.len() > max_bytes {
        return Err(HashError::SizeLimitExceeded {
            max_bytes,
            actual_bytes: bytes.len(),
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Hashes raw bytes with the selected algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let digest = Sha256::digest(bytes);
            HashDigest {
                algorithm,
                hex: to_lower_hex(&digest),
            }
        }
    }
}

/// Hashes the canonical JSON form of a value.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn hash_canonical_json<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    hash_canonical_json_with_limit(algorithm, value, MAX_CANONICAL_BYTES)
}

/// Hashes the canonical JSON form of a value, enforcing a size limit.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails or the canonical form
/// exceeds `max_bytes`.
pub fn hash_canonical_json_with_limit<T: Serialize>(
    algorithm: HashAlgorithm,
    value: &T,
    max_bytes: usize,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes_with_limit(value, max_bytes)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Renders digest bytes as lowercase hexadecimal.
fn to_lower_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}
