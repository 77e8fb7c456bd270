//! gk-crypto: hybrid envelope encryption for GophKeeper records.
//!
//! Every record field is sealed independently on the client:
//!
//! ```text
//! blob = RSA-OAEP-SHA256(pub, k) || nonce(12) || AES-256-GCM(k, nonce, pt) || tag(16)
//! ```
//!
//! A fresh content key `k` is drawn per field, so two encryptions of the
//! same plaintext are unrelated ciphertexts. The server only ever sees
//! `blob`; the RSA private key never leaves the client cache directory.

pub mod envelope;
pub mod keys;

pub use envelope::{decrypt, encrypt};
pub use keys::{
    generate_rsa_key, private_key_from_pkcs8_der, private_key_to_pkcs8_der, public_key_of,
};

use thiserror::Error;

/// Size of a content key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Blob shorter than the minimum `wrapped || nonce || tag` layout.
    #[error("ciphertext too short")]
    MalformedCiphertext,

    /// RSA-OAEP unwrap of the content key failed (wrong key or corrupt blob).
    #[error("failed to unwrap content key")]
    KeyUnwrapFailed,

    /// AES-GCM tag verification failed.
    #[error("ciphertext authentication failed")]
    AuthenticationFailed,

    #[error("crypto backend error: {0}")]
    Backend(#[from] openssl::error::ErrorStack),
}
