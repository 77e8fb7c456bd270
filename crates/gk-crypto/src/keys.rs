//! RSA keypair generation and PKCS#8 (de)serialisation.

use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::rsa::Rsa;

use crate::CryptoResult;

/// RSA modulus size used for every generated keypair.
pub const DEFAULT_KEY_BITS: u32 = 2048;

/// Generate a fresh RSA private key of `bits` modulus size.
pub fn generate_rsa_key(bits: u32) -> CryptoResult<PKey<Private>> {
    let rsa = Rsa::generate(bits)?;
    Ok(PKey::from_rsa(rsa)?)
}

/// Unencrypted PKCS#8 DER encoding of a private key.
pub fn private_key_to_pkcs8_der(key: &PKeyRef<Private>) -> CryptoResult<Vec<u8>> {
    Ok(key.private_key_to_pkcs8()?)
}

pub fn private_key_from_pkcs8_der(der: &[u8]) -> CryptoResult<PKey<Private>> {
    Ok(PKey::private_key_from_pkcs8(der)?)
}

/// Derive the public half of a private key.
pub fn public_key_of(private: &PKeyRef<Private>) -> CryptoResult<PKey<Public>> {
    let der = private.public_key_to_der()?;
    Ok(PKey::public_key_from_der(&der)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pkcs8_roundtrip() {
        let key = generate_rsa_key(2048).unwrap();
        let der = private_key_to_pkcs8_der(&key).unwrap();
        let restored = private_key_from_pkcs8_der(&der).unwrap();
        assert_eq!(
            key.public_key_to_der().unwrap(),
            restored.public_key_to_der().unwrap()
        );
    }

    #[test]
    fn public_key_matches_private() {
        let key = generate_rsa_key(2048).unwrap();
        let public = public_key_of(&key).unwrap();
        assert_eq!(
            public.public_key_to_der().unwrap(),
            key.public_key_to_der().unwrap()
        );
    }
}
