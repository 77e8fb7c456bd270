//! Seal/open a single field under an RSA public key.

use openssl::md::Md;
use openssl::pkey::{PKeyRef, Private, Public};
use openssl::pkey_ctx::PkeyCtx;
use openssl::rand::rand_bytes;
use openssl::rsa::Padding;
use openssl::symm::{decrypt_aead, encrypt_aead, Cipher};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under `public`.
///
/// Output layout: `wrapped_key || nonce || ciphertext || tag`, where
/// `wrapped_key` has the length of the RSA modulus.
pub fn encrypt(public: &PKeyRef<Public>, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    rand_bytes(&mut *key)?;

    let mut ctx = PkeyCtx::new(public)?;
    ctx.encrypt_init()?;
    ctx.set_rsa_padding(Padding::PKCS1_OAEP)?;
    ctx.set_rsa_oaep_md(Md::sha256())?;
    let mut wrapped = Vec::new();
    ctx.encrypt_to_vec(&*key, &mut wrapped)?;

    let mut nonce = [0u8; NONCE_SIZE];
    rand_bytes(&mut nonce)?;

    let mut tag = [0u8; TAG_SIZE];
    let body = encrypt_aead(
        Cipher::aes_256_gcm(),
        &*key,
        Some(&nonce),
        &[],
        plaintext,
        &mut tag,
    )?;

    let mut blob = Vec::with_capacity(wrapped.len() + NONCE_SIZE + body.len() + TAG_SIZE);
    blob.extend_from_slice(&wrapped);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&body);
    blob.extend_from_slice(&tag);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`] with the matching private key.
pub fn decrypt(private: &PKeyRef<Private>, blob: &[u8]) -> CryptoResult<Vec<u8>> {
    let wrapped_len = private.rsa()?.size() as usize;
    if blob.len() < wrapped_len + NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::MalformedCiphertext);
    }
    let (wrapped, rest) = blob.split_at(wrapped_len);

    let mut ctx = PkeyCtx::new(private)?;
    ctx.decrypt_init()?;
    ctx.set_rsa_padding(Padding::PKCS1_OAEP)?;
    ctx.set_rsa_oaep_md(Md::sha256())?;
    let mut key = Zeroizing::new(Vec::with_capacity(KEY_SIZE));
    ctx.decrypt_to_vec(wrapped, &mut key)
        .map_err(|_| CryptoError::KeyUnwrapFailed)?;
    if key.len() != KEY_SIZE {
        return Err(CryptoError::KeyUnwrapFailed);
    }

    let (nonce, body_and_tag) = rest.split_at(NONCE_SIZE);
    let (body, tag) = body_and_tag.split_at(body_and_tag.len() - TAG_SIZE);

    decrypt_aead(Cipher::aes_256_gcm(), &key, Some(nonce), &[], body, tag)
        .map_err(|_| CryptoError::AuthenticationFailed)
}
