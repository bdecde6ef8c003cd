//! Lineworks Cryptographic Primitives
//!
//! Key derivation from a shared secret and authenticated encryption of opaque
//! message payloads. The secret itself never leaves the process; both peers
//! derive identical key material from it independently.
//!
//! # Key Lifecycle
//!
//! ```text
//! Shared secret (password)
//!        │
//!        ├──> SHA-256 → first 16 bytes → salt
//!        ▼
//! PBKDF2-HMAC-SHA256 (480k rounds) → 32-byte key
//!        │
//!        ▼
//! AES-256-GCM (16-byte random nonce per message) → nonce ∥ ciphertext ∥ tag
//! ```
//!
//! Derivation is deliberately slow. Perform it once per connection and reuse
//! the resulting [`CryptoScheme`] for every message on that connection.
//!
//! # Security
//!
//! - The salt is derived from the secret because peers never exchange one.
//!   Two endpoints agree on key material iff they share the secret and the
//!   iteration count.
//! - Nonces come from the OS RNG on every call. There is no counter, so there
//!   is no state to desynchronize.
//! - A failed tag check is reported as [`CryptoError::AuthenticationFailed`],
//!   distinct from a frame too short to contain a nonce and tag.
//! - No replay protection: AEAD framing alone is the guarantee.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod scheme;

pub use error::CryptoError;
pub use scheme::{
    CryptoScheme, DEFAULT_KDF_ITERATIONS, KEY_SIZE, NONCE_SIZE, SALT_SIZE, SchemeKey, TAG_SIZE,
    derive_key, derive_salt,
};
