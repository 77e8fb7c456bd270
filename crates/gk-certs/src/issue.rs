//! Root creation and leaf issuance.

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectAlternativeName};
use openssl::x509::{X509Builder, X509Name, X509NameRef, X509};
use std::path::Path;

use crate::{CertRequest, CertResult, CA_VALIDITY_DAYS, LEAF_VALIDITY_DAYS};

const X509_VERSION_3: i32 = 2;

/// The CA signing material, read once at server start and held immutable.
pub struct CaSigner {
    cert: X509,
    cert_der: Vec<u8>,
    key: PKey<Private>,
}

impl CaSigner {
    pub fn from_der(cert_der: Vec<u8>, key_der: &[u8]) -> CertResult<Self> {
        let cert = X509::from_der(&cert_der)?;
        let key = gk_crypto::private_key_from_pkcs8_der(key_der)?;
        Ok(Self {
            cert,
            cert_der,
            key,
        })
    }

    pub fn load(cert_path: &Path, key_path: &Path) -> CertResult<Self> {
        let cert_der = std::fs::read(cert_path)?;
        let key_der = std::fs::read(key_path)?;
        Self::from_der(cert_der, &key_der)
    }

    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    fn subject(&self) -> &X509NameRef {
        self.cert.subject_name()
    }
}

/// Generate the self-signed root: a fresh RSA key and a CA certificate
/// valid for ten years. Returns `(cert_der, key_pkcs8_der)`.
pub fn generate_root(request: &CertRequest) -> CertResult<(Vec<u8>, Vec<u8>)> {
    let key = gk_crypto::generate_rsa_key(gk_crypto::keys::DEFAULT_KEY_BITS)?;
    let name = subject_name(&request.common_name)?;

    let mut builder = certificate_base(&name, &name, CA_VALIDITY_DAYS)?;
    builder.set_pubkey(&key)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_cert_sign()
            .key_encipherment()
            .build()?,
    )?;

    builder.sign(&key, MessageDigest::sha256())?;
    let cert_der = builder.build().to_der()?;
    let key_der = gk_crypto::private_key_to_pkcs8_der(&key)?;
    Ok((cert_der, key_der))
}

/// Issue a leaf for a signed request. The public key comes from the
/// embedded CSR; subject and SANs come from the request fields. Returns
/// the certificate DER.
pub fn issue_leaf(request: &CertRequest, signer: &CaSigner) -> CertResult<Vec<u8>> {
    let csr = request.signed_csr()?;
    let public_key = csr.public_key()?;
    let name = subject_name(&request.common_name)?;

    let mut builder = certificate_base(&name, signer.subject(), LEAF_VALIDITY_DAYS)?;
    builder.set_pubkey(&public_key)?;

    builder.append_extension(BasicConstraints::new().critical().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .digital_signature()
            .key_encipherment()
            .non_repudiation()
            .build()?,
    )?;

    if !request.dns_names.is_empty()
        || !request.ip_addresses.is_empty()
        || !request.emails.is_empty()
    {
        let mut san = SubjectAlternativeName::new();
        for dns in &request.dns_names {
            san.dns(dns);
        }
        for ip in &request.ip_addresses {
            san.ip(&ip.to_string());
        }
        for email in &request.emails {
            san.email(email);
        }
        let ext = san.build(&builder.x509v3_context(Some(signer.cert.as_ref()), None))?;
        builder.append_extension(ext)?;
    }

    builder.sign(&signer.key, MessageDigest::sha256())?;
    Ok(builder.build().to_der()?)
}

fn subject_name(common_name: &str) -> Result<X509Name, openssl::error::ErrorStack> {
    let mut name = X509Name::builder()?;
    name.append_entry_by_nid(openssl::nid::Nid::COMMONNAME, common_name)?;
    Ok(name.build())
}

fn certificate_base(
    subject: &X509NameRef,
    issuer: &X509NameRef,
    validity_days: u32,
) -> Result<X509Builder, openssl::error::ErrorStack> {
    let mut builder = X509::builder()?;
    builder.set_version(X509_VERSION_3)?;

    // Random 128-bit serial
    let mut serial = BigNum::new()?;
    serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
    let serial_asn1 = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial_asn1)?;

    builder.set_subject_name(subject)?;
    builder.set_issuer_name(issuer)?;
    let not_before = Asn1Time::days_from_now(0)?;
    builder.set_not_before(&not_before)?;
    let not_after = Asn1Time::days_from_now(validity_days)?;
    builder.set_not_after(&not_after)?;
    Ok(builder)
}

impl std::fmt::Debug for CaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaSigner")
            .field("cert_der_len", &self.cert_der.len())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CertError;
    use std::net::{IpAddr, Ipv4Addr};

    fn test_root() -> (Vec<u8>, Vec<u8>) {
        let req = CertRequest::new("Test Root CA", vec![], vec![], vec![], true);
        generate_root(&req).unwrap()
    }

    fn signed_leaf_request(cn: &str) -> CertRequest {
        let key = gk_crypto::generate_rsa_key(2048).unwrap();
        let key_der = gk_crypto::private_key_to_pkcs8_der(&key).unwrap();
        let mut req = CertRequest::new(
            cn,
            vec!["localhost".into()],
            vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
            vec![],
            false,
        );
        req.sign(&key_der).unwrap();
        req
    }

    #[test]
    fn root_is_self_signed_ca() {
        let (cert_der, key_der) = test_root();
        let cert = X509::from_der(&cert_der).unwrap();
        let key = gk_crypto::private_key_from_pkcs8_der(&key_der).unwrap();
        assert!(cert.verify(&key).unwrap());
        assert_eq!(
            cert.subject_name().entries().count(),
            cert.issuer_name().entries().count()
        );
    }

    #[test]
    fn issued_leaf_verifies_against_root() {
        let (cert_der, key_der) = test_root();
        let signer = CaSigner::from_der(cert_der.clone(), &key_der).unwrap();

        let req = signed_leaf_request("alice");
        let leaf_der = issue_leaf(&req, &signer).unwrap();

        let leaf = X509::from_der(&leaf_der).unwrap();
        let root = X509::from_der(&cert_der).unwrap();
        assert!(leaf.verify(&root.public_key().unwrap()).unwrap());
    }

    #[test]
    fn leaf_subject_is_request_cn() {
        let (cert_der, key_der) = test_root();
        let signer = CaSigner::from_der(cert_der, &key_der).unwrap();

        let req = signed_leaf_request("bob");
        let leaf = X509::from_der(&issue_leaf(&req, &signer).unwrap()).unwrap();
        let cn = leaf
            .subject_name()
            .entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .unwrap()
            .data()
            .as_utf8()
            .unwrap()
            .to_string();
        assert_eq!(cn, "bob");
    }

    #[test]
    fn leaf_carries_requested_sans() {
        let (cert_der, key_der) = test_root();
        let signer = CaSigner::from_der(cert_der, &key_der).unwrap();

        let req = signed_leaf_request("carol");
        let leaf = X509::from_der(&issue_leaf(&req, &signer).unwrap()).unwrap();
        let sans = leaf.subject_alt_names().expect("leaf must carry SANs");
        let dns: Vec<_> = sans.iter().filter_map(|n| n.dnsname()).collect();
        assert!(dns.contains(&"localhost"));
    }

    #[test]
    fn unsigned_request_cannot_be_issued() {
        let (cert_der, key_der) = test_root();
        let signer = CaSigner::from_der(cert_der, &key_der).unwrap();

        let req = CertRequest::new("dave", vec![], vec![], vec![], false);
        assert!(matches!(
            issue_leaf(&req, &signer),
            Err(CertError::MissingCsr)
        ));
    }

    #[test]
    fn serials_are_random() {
        let req = CertRequest::new("Test Root CA", vec![], vec![], vec![], true);
        let (a, _) = generate_root(&req).unwrap();
        let (b, _) = generate_root(&req).unwrap();
        let serial_a = X509::from_der(&a).unwrap().serial_number().to_bn().unwrap();
        let serial_b = X509::from_der(&b).unwrap().serial_number().to_bn().unwrap();
        assert_ne!(serial_a.to_vec(), serial_b.to_vec());
    }
}
