//! Authenticated encryption for stored artifacts.
//!
//! # Sealed format
//!
//! | Field      | Size (bytes) | Description                           |
//! |------------|--------------|---------------------------------------|
//! | Nonce      | 12           | Random nonce for AES-256-GCM          |
//! | Ciphertext | n            | Encrypted artifact                    |
//! | Tag        | 16           | GCM authentication tag                |
//!
//! # Keys
//!
//! - `BlobCipher::from_secret` runs Argon2id over an operator secret with a
//!   fixed protocol salt, so the same secret yields the same key on every
//!   restart.
//! - `BlobCipher::ephemeral` draws a random key. Anything sealed with it is
//!   unreadable once the process exits; use it only for tests and throwaway
//!   deployments.

use std::fmt;

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use argon2::{Argon2, Params, Version};
use rand::RngCore;

use crate::error::CryptoError;

/// Nonce size in bytes (for AES-GCM).
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Bytes added to every plaintext by `seal`.
pub const SEALED_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Symmetric key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Salt for deriving the blob key from an operator secret.
const KEY_SALT: &[u8] = b"cashio/blob-store/v1";

/// Argon2id parameters (OWASP recommended for 2024+)
const ARGON2_M_COST: u32 = 19 * 1024; // 19 MiB memory
const ARGON2_T_COST: u32 = 2;
const ARGON2_P_COST: u32 = 1;

/// AES-256-GCM sealing with a key fixed for the lifetime of a store.
#[derive(Clone)]
pub struct BlobCipher {
    key: [u8; KEY_SIZE],
    ephemeral: bool,
}

impl BlobCipher {
    /// Derive the key from an operator-supplied secret.
    pub fn from_secret(secret: &[u8]) -> Result<Self, CryptoError> {
        let params = Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(KEY_SIZE))
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_SIZE];
        argon2
            .hash_password_into(secret, KEY_SALT, &mut key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        Ok(Self { key, ephemeral: false })
    }

    /// Use a raw 256-bit key.
    pub fn from_key(key: [u8; KEY_SIZE]) -> Self {
        Self { key, ephemeral: false }
    }

    /// Generate a random key that lives only as long as this process.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key, ephemeral: true }
    }

    /// Whether the key was generated randomly rather than derived.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    ///
    /// Returns `nonce || ciphertext || tag`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| CryptoError::EncryptionFailed)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        debug_assert_eq!(sealed.len(), plaintext.len() + SEALED_OVERHEAD);
        Ok(sealed)
    }

    /// Decrypt a payload produced by [`BlobCipher::seal`].
    ///
    /// Fails closed: any tag mismatch yields `AuthenticationFailed` and no
    /// plaintext.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if sealed.len() < SEALED_OVERHEAD {
            return Err(CryptoError::Truncated { len: sealed.len() });
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| CryptoError::AuthenticationFailed)?;
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

impl fmt::Debug for BlobCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobCipher")
            .field("key", &"<redacted>")
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_roundtrip() {
        let cipher = BlobCipher::ephemeral();
        let sealed = cipher.seal(b"proving input").unwrap();
        assert_eq!(sealed.len(), 13 + SEALED_OVERHEAD);
        assert_eq!(cipher.open(&sealed).unwrap(), b"proving input");
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = BlobCipher::from_key([7u8; KEY_SIZE]);
        let sealed = cipher.seal(b"").unwrap();
        assert_eq!(sealed.len(), SEALED_OVERHEAD);
        assert!(cipher.open(&sealed).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_call() {
        let cipher = BlobCipher::from_key([1u8; KEY_SIZE]);
        let a = cipher.seal(b"same").unwrap();
        let b = cipher.seal(b"same").unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_bit_flip_fails_closed() {
        let cipher = BlobCipher::from_key([2u8; KEY_SIZE]);
        let sealed = cipher.seal(b"witness bytes").unwrap();

        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert_eq!(cipher.open(&tampered), Err(CryptoError::AuthenticationFailed));
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = BlobCipher::from_key([3u8; KEY_SIZE]).seal(b"secret").unwrap();
        let other = BlobCipher::from_key([4u8; KEY_SIZE]);
        assert_eq!(other.open(&sealed), Err(CryptoError::AuthenticationFailed));
    }

    #[test]
    fn test_truncated_payload() {
        let cipher = BlobCipher::ephemeral();
        assert_eq!(cipher.open(&[0u8; 10]), Err(CryptoError::Truncated { len: 10 }));
    }

    #[test]
    fn test_secret_derivation_is_deterministic() {
        let a = BlobCipher::from_secret(b"operator secret").unwrap();
        let b = BlobCipher::from_secret(b"operator secret").unwrap();
        let sealed = a.seal(b"artifact").unwrap();
        assert_eq!(b.open(&sealed).unwrap(), b"artifact");
        assert!(!a.is_ephemeral());
    }

    #[test]
    fn test_debug_redacts_key() {
        let cipher = BlobCipher::from_key([0xAB; KEY_SIZE]);
        let rendered = format!("{:?}", cipher);
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains("171"));
    }
}
