//! Error types for the Cash.io core crate.

use std::fmt;

/// Top-level error type for cashio-core operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// A commitment failed field-element validation.
    Commitment(CommitmentError),
    /// Encryption, decryption or key derivation failed.
    Crypto(CryptoError),
    /// Serialization or deserialization failed.
    Serialization(SerializationError),
    /// Typed proof inputs failed validation.
    Input(InputError),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Commitment(e) => write!(f, "commitment error: {}", e),
            CoreError::Crypto(e) => write!(f, "crypto error: {}", e),
            CoreError::Serialization(e) => write!(f, "serialization error: {}", e),
            CoreError::Input(e) => write!(f, "proof input error: {}", e),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<CommitmentError> for CoreError {
    fn from(e: CommitmentError) -> Self {
        CoreError::Commitment(e)
    }
}

impl From<CryptoError> for CoreError {
    fn from(e: CryptoError) -> Self {
        CoreError::Crypto(e)
    }
}

impl From<SerializationError> for CoreError {
    fn from(e: SerializationError) -> Self {
        CoreError::Serialization(e)
    }
}

impl From<InputError> for CoreError {
    fn from(e: InputError) -> Self {
        CoreError::Input(e)
    }
}

/// Errors raised when parsing or validating a commitment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitmentError {
    /// The zero value is reserved for empty leaves.
    Zero,
    /// The value is not below the scalar field modulus.
    NotInField,
    /// Input had the wrong number of bytes.
    InvalidLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        actual: usize,
    },
    /// Input was not valid hex.
    InvalidHex(String),
}

impl fmt::Display for CommitmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitmentError::Zero => write!(f, "zero is reserved for empty leaves"),
            CommitmentError::NotInField => write!(f, "value is not a canonical field element"),
            CommitmentError::InvalidLength { expected, actual } => {
                write!(f, "expected {} bytes, got {}", expected, actual)
            }
            CommitmentError::InvalidHex(msg) => write!(f, "invalid hex: {}", msg),
        }
    }
}

impl std::error::Error for CommitmentError {}

/// Errors related to authenticated encryption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CryptoError {
    /// Deriving a key from the operator secret failed.
    KeyDerivationFailed,
    /// The AEAD refused to encrypt.
    EncryptionFailed,
    /// Authentication tag did not match (tampered data or wrong key).
    AuthenticationFailed,
    /// Sealed payload is shorter than nonce plus tag.
    Truncated {
        /// Length of the payload that was supplied.
        len: usize,
    },
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::KeyDerivationFailed => write!(f, "key derivation failed"),
            CryptoError::EncryptionFailed => write!(f, "encryption failed"),
            CryptoError::AuthenticationFailed => {
                write!(f, "authentication failed (tampered data or wrong key)")
            }
            CryptoError::Truncated { len } => {
                write!(f, "sealed payload too short: {} bytes", len)
            }
        }
    }
}

impl std::error::Error for CryptoError {}

/// Errors related to serialization and deserialization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerializationError {
    /// Failed to encode data to bytes.
    EncodeFailed(String),
    /// Failed to decode data from bytes.
    DecodeFailed(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::EncodeFailed(msg) => write!(f, "encode failed: {}", msg),
            SerializationError::DecodeFailed(msg) => write!(f, "decode failed: {}", msg),
        }
    }
}

impl std::error::Error for SerializationError {}

/// Errors raised while constructing typed proof inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InputError {
    /// Amount must be positive.
    ZeroAmount,
    /// Withdrawal recipient must be set.
    EmptyRecipient,
    /// A Merkle proof in the inputs does not verify.
    InvalidProof {
        /// Leaf index of the offending proof.
        leaf_index: u64,
    },
    /// A transfer needs at least one input note.
    NoInputs,
    /// A transfer needs at least one output commitment.
    NoOutputs,
    /// Every input note needs exactly one nullifier hash.
    NullifierCountMismatch {
        /// Number of input packages.
        inputs: usize,
        /// Number of nullifier hashes.
        nullifiers: usize,
    },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::ZeroAmount => write!(f, "amount must be greater than zero"),
            InputError::EmptyRecipient => write!(f, "recipient must not be empty"),
            InputError::InvalidProof { leaf_index } => {
                write!(f, "merkle proof for leaf {} does not verify", leaf_index)
            }
            InputError::NoInputs => write!(f, "transfer has no input notes"),
            InputError::NoOutputs => write!(f, "transfer has no output commitments"),
            InputError::NullifierCountMismatch { inputs, nullifiers } => write!(
                f,
                "{} input notes but {} nullifier hashes",
                inputs, nullifiers
            ),
        }
    }
}

impl std::error::Error for InputError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = CoreError::Commitment(CommitmentError::NotInField);
        assert!(e.to_string().contains("canonical field element"));

        let e = CoreError::Crypto(CryptoError::Truncated { len: 3 });
        assert!(e.to_string().contains("3 bytes"));

        let e = CoreError::Input(InputError::NullifierCountMismatch { inputs: 2, nullifiers: 1 });
        assert!(e.to_string().contains("2 input notes"));
    }

    #[test]
    fn test_error_conversion() {
        let err: CoreError = CryptoError::AuthenticationFailed.into();
        assert!(matches!(err, CoreError::Crypto(CryptoError::AuthenticationFailed)));

        let err: CoreError = InputError::ZeroAmount.into();
        assert!(matches!(err, CoreError::Input(InputError::ZeroAmount)));
    }
}
