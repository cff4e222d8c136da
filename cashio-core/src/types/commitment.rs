//! Note commitments.
//!
//! A commitment is the hiding value a depositor publishes for a private
//! note. It becomes a leaf of the commitment tree, so it must be a
//! canonical scalar field element, and it must not be zero because zero is
//! the value of an empty leaf.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::sha256;
use crate::error::CommitmentError;
use crate::field;

/// A 256-bit note commitment in big-endian form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// Validate and wrap raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CommitmentError> {
        if bytes == [0u8; 32] {
            return Err(CommitmentError::Zero);
        }
        if !field::is_canonical(&bytes) {
            return Err(CommitmentError::NotInField);
        }
        Ok(Self(bytes))
    }

    /// Validate a slice, checking its length first.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CommitmentError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CommitmentError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        })?;
        Self::from_bytes(arr)
    }

    /// Parse from a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, CommitmentError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| CommitmentError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Hash arbitrary bytes into the field.
    ///
    /// The SHA-256 digest is reduced modulo the field order. A zero result
    /// is mapped to one so the output is always a valid commitment.
    pub fn hash_to_field(data: &[u8]) -> Self {
        let mut reduced = field::reduce(&sha256(data));
        if reduced == [0u8; 32] {
            reduced[31] = 1;
        }
        Self(reduced)
    }

    /// The underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy out the underlying bytes.
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Lower-case hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self.to_hex())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl TryFrom<[u8; 32]> for Commitment {
    type Error = CommitmentError;

    fn try_from(bytes: [u8; 32]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
