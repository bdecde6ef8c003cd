//! Key derivation and message encryption using AES-256-GCM.
//!
//! [`seal_with_nonce`](CryptoScheme::seal_with_nonce) is pure: the caller
//! provides the nonce, which keeps known-answer tests deterministic.
//! [`encrypt`](CryptoScheme::encrypt) draws a fresh nonce from the OS RNG and
//! is what the transport uses.

use std::fmt;

use aes_gcm::{
    AesGcm, Nonce,
    aead::{Aead, KeyInit, consts::U16},
    aes::Aes256,
};
use pbkdf2::pbkdf2_hmac;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Nonce size prepended to every frame (16 bytes)
pub const NONCE_SIZE: usize = 16;

/// GCM authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Derived key size (32 bytes, AES-256)
pub const KEY_SIZE: usize = 32;

/// Salt size taken from the secret's digest (16 bytes)
pub const SALT_SIZE: usize = 16;

/// PBKDF2 rounds used unless both peers agree on something else.
pub const DEFAULT_KDF_ITERATIONS: u32 = 480_000;

/// AES-256-GCM with a 128-bit nonce.
type MessageCipher = AesGcm<Aes256, U16>;

/// Derived key material. Zeroized on drop.
pub type SchemeKey = Zeroizing<[u8; KEY_SIZE]>;

/// Derive the deterministic salt for a secret.
///
/// First 16 bytes of `SHA-256(secret)`. Peers never exchange a salt, so it has
/// to be a function of the secret alone.
pub fn derive_salt(secret: &[u8]) -> [u8; SALT_SIZE] {
    let digest = Sha256::digest(secret);

    let mut salt = [0u8; SALT_SIZE];
    salt.copy_from_slice(&digest[..SALT_SIZE]);
    salt
}

/// Derive a 32-byte key from a secret with PBKDF2-HMAC-SHA256.
///
/// An iteration count of zero is treated as one.
pub fn derive_key(secret: &[u8], iterations: u32) -> SchemeKey {
    let salt = derive_salt(secret);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(secret, &salt, iterations.max(1), &mut *key);
    key
}

/// Symmetric AEAD scheme bound to one shared secret.
///
/// Created once per connection. Frames produced by [`encrypt`] have the layout
/// `nonce (16) ∥ ciphertext ∥ tag (16)`.
///
/// [`encrypt`]: CryptoScheme::encrypt
#[derive(Clone)]
pub struct CryptoScheme {
    cipher: MessageCipher,
}

impl CryptoScheme {
    /// Derive a scheme from a secret using [`DEFAULT_KDF_ITERATIONS`].
    ///
    /// This takes a noticeable amount of CPU time. Call it from a blocking
    /// context, not from an async task.
    pub fn derive(secret: &str) -> Self {
        Self::derive_with_iterations(secret, DEFAULT_KDF_ITERATIONS)
    }

    /// Derive a scheme from a secret with an explicit PBKDF2 round count.
    pub fn derive_with_iterations(secret: &str, iterations: u32) -> Self {
        let key = derive_key(secret.as_bytes(), iterations);
        Self::from_key(&key)
    }

    /// Build a scheme from already-derived key material.
    pub fn from_key(key: &[u8; KEY_SIZE]) -> Self {
        Self { cipher: MessageCipher::new(key.into()) }
    }

    /// Encrypt a payload under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        self.seal_with_nonce(plaintext, nonce)
    }

    /// Encrypt a payload under a caller-provided nonce.
    ///
    /// # Security
    ///
    /// A nonce MUST NOT be reused with the same key. Production code calls
    /// [`encrypt`](CryptoScheme::encrypt), which never reuses one.
    pub fn seal_with_nonce(&self, plaintext: &[u8], nonce: [u8; NONCE_SIZE]) -> Vec<u8> {
        let Ok(ciphertext) = self.cipher.encrypt(Nonce::<U16>::from_slice(&nonce), plaintext)
        else {
            unreachable!("AES-GCM encryption cannot fail below the 64 GiB message limit");
        };

        let mut frame = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        frame.extend_from_slice(&nonce);
        frame.extend_from_slice(&ciphertext);
        frame
    }

    /// Verify and decrypt a frame produced by [`encrypt`].
    ///
    /// # Errors
    ///
    /// - `FrameTooShort`: frame cannot contain a nonce and a tag
    /// - `AuthenticationFailed`: wrong key or tampered frame
    ///
    /// [`encrypt`]: CryptoScheme::encrypt
    pub fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let min = NONCE_SIZE + TAG_SIZE;
        if frame.len() < min {
            return Err(CryptoError::FrameTooShort { len: frame.len(), min });
        }

        let (nonce, ciphertext) = frame.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::<U16>::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

impl fmt::Debug for CryptoScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoScheme").field("cipher", &"AES-256-GCM/128").finish_non_exhaustive()
    }
}
