//! gk-certs: the GophKeeper certificate authority.
//!
//! A server instance owns one self-signed RSA root. Clients submit a JSON
//! [`CertRequest`] carrying a DER X.509 CertificateRequest signed with their
//! own key; the CA verifies the embedded signature and answers with a leaf
//! bound to the request's common name. The CN on that leaf is the sole
//! identity token for every later mTLS call.

pub mod files;
pub mod issue;
pub mod request;

pub use files::{cert_der_to_pem, key_pkcs8_der_to_pem, save_file};
pub use issue::{generate_root, issue_leaf, CaSigner};
pub use request::CertRequest;

use thiserror::Error;

/// Root certificate lifetime
pub const CA_VALIDITY_DAYS: u32 = 3650;

/// Leaf certificate lifetime (server and client)
pub const LEAF_VALIDITY_DAYS: u32 = 365;

pub type CertResult<T> = Result<T, CertError>;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("malformed certificate request: {0}")]
    BadRequest(#[from] serde_json::Error),

    #[error("certificate request carries no signed CSR")]
    MissingCsr,

    #[error("certificate request signature verification failed")]
    InvalidSignature,

    #[error("x509 backend error: {0}")]
    Backend(#[from] openssl::error::ErrorStack),

    #[error("key handling error: {0}")]
    Key(#[from] gk_crypto::CryptoError),

    #[error("certificate file I/O: {0}")]
    Io(#[from] std::io::Error),
}
