//! Certificate-request wire form and CSR handling.
//!
//! On the wire a request is JSON: subject fields plus `Signed`, the base64
//! DER of an X.509 CertificateRequest self-signed by the requester's key.
//! The JSON carries the SANs the issued certificate will receive; the DER
//! CSR proves possession of the private key and supplies the public key.

use openssl::hash::MessageDigest;
use openssl::stack::Stack;
use openssl::x509::extension::SubjectAlternativeName;
use openssl::x509::{X509Name, X509Req};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

use crate::{CertError, CertResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertRequest {
    #[serde(rename = "CommonName")]
    pub common_name: String,
    #[serde(rename = "DNSNames", default, deserialize_with = "null_default")]
    pub dns_names: Vec<String>,
    #[serde(rename = "IPAddresses", default, deserialize_with = "null_default")]
    pub ip_addresses: Vec<IpAddr>,
    #[serde(rename = "Emails", default, deserialize_with = "null_default")]
    pub emails: Vec<String>,
    #[serde(rename = "IsCA", default)]
    pub is_ca: bool,
    /// DER X.509 CertificateRequest, base64 in JSON, empty until signed.
    #[serde(rename = "Signed", default, with = "b64")]
    pub signed: Vec<u8>,
}

impl CertRequest {
    pub fn new(
        common_name: &str,
        dns_names: Vec<String>,
        ip_addresses: Vec<IpAddr>,
        emails: Vec<String>,
        is_ca: bool,
    ) -> Self {
        Self {
            common_name: common_name.to_owned(),
            dns_names,
            ip_addresses,
            emails,
            is_ca,
            signed: Vec::new(),
        }
    }

    /// Build and sign the embedded CSR with a PKCS#8 DER private key.
    pub fn sign(&mut self, key_der: &[u8]) -> CertResult<()> {
        let key = gk_crypto::private_key_from_pkcs8_der(key_der)?;

        let mut name = X509Name::builder()?;
        name.append_entry_by_nid(openssl::nid::Nid::COMMONNAME, &self.common_name)?;
        let name = name.build();

        let mut builder = X509Req::builder()?;
        builder.set_version(0)?;
        builder.set_subject_name(&name)?;
        builder.set_pubkey(&key)?;

        if !self.dns_names.is_empty() || !self.ip_addresses.is_empty() || !self.emails.is_empty()
        {
            let mut san = SubjectAlternativeName::new();
            for dns in &self.dns_names {
                san.dns(dns);
            }
            for ip in &self.ip_addresses {
                san.ip(&ip.to_string());
            }
            for email in &self.emails {
                san.email(email);
            }
            let ext = san.build(&builder.x509v3_context(None))?;
            let mut extensions = Stack::new()?;
            extensions.push(ext)?;
            builder.add_extensions(&extensions)?;
        }

        builder.sign(&key, MessageDigest::sha256())?;
        self.signed = builder.build().to_der()?;
        Ok(())
    }

    /// Parse the embedded DER CSR.
    pub fn signed_csr(&self) -> CertResult<X509Req> {
        if self.signed.is_empty() {
            return Err(CertError::MissingCsr);
        }
        Ok(X509Req::from_der(&self.signed)?)
    }

    /// Check the CSR's self-signature against its own declared public key.
    pub fn verify_signature(&self) -> CertResult<()> {
        let csr = self.signed_csr()?;
        let key = csr.public_key()?;
        if csr.verify(&key)? {
            Ok(())
        } else {
            Err(CertError::InvalidSignature)
        }
    }

    pub fn to_bytes(&self) -> CertResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> CertResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

mod b64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if bytes.is_empty() {
            serializer.serialize_none()
        } else {
            serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_request(cn: &str) -> (CertRequest, Vec<u8>) {
        let key = gk_crypto::generate_rsa_key(2048).unwrap();
        let key_der = gk_crypto::private_key_to_pkcs8_der(&key).unwrap();
        let mut req = CertRequest::new(cn, vec!["example.org".into()], vec![], vec![], false);
        req.sign(&key_der).unwrap();
        (req, key_der)
    }

    #[test]
    fn sign_then_verify() {
        let (req, _) = signed_request("alice");
        req.verify_signature().unwrap();
        let csr = req.signed_csr().unwrap();
        let cn = csr
            .subject_name()
            .entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .unwrap()
            .data()
            .as_utf8()
            .unwrap()
            .to_string();
        assert_eq!(cn, "alice");
    }

    #[test]
    fn tampered_csr_fails_verification() {
        let (mut req, _) = signed_request("alice");
        let last = req.signed.len() - 1;
        req.signed[last] ^= 0x01;
        assert!(req.verify_signature().is_err());
    }

    #[test]
    fn unsigned_request_has_no_csr() {
        let req = CertRequest::new("bob", vec![], vec![], vec![], false);
        assert!(matches!(req.signed_csr(), Err(CertError::MissingCsr)));
    }

    #[test]
    fn json_roundtrip() {
        let (req, _) = signed_request("carol");
        let bytes = req.to_bytes().unwrap();
        let decoded = CertRequest::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn decodes_legacy_json_with_null_sans() {
        let json = br#"{"CommonName":"dave","DNSNames":null,"IPAddresses":null,"Emails":null,"IsCA":false,"Signed":null}"#;
        let req = CertRequest::from_bytes(json).unwrap();
        assert_eq!(req.common_name, "dave");
        assert!(req.dns_names.is_empty());
        assert!(req.signed.is_empty());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        assert!(matches!(
            CertRequest::from_bytes(b"not json at all"),
            Err(CertError::BadRequest(_))
        ));
    }
}
