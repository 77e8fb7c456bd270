//! Field-level crypto adapters: plaintext records ↔ encrypted payloads.
//!
//! Every field is sealed on its own under the user's public key, so the
//! server stores nothing it could correlate, and list views can decrypt
//! the meta label without touching the rest of the record.

use openssl::pkey::{PKeyRef, Private, Public};

use gk_core::record::{
    BankRecord, BinRecord, Encrypted, PasswordRecord, RecordPayload, TextRecord,
};
use gk_core::RecordKind;
use gk_crypto::{decrypt, encrypt, CryptoResult};

/// A record as the operator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPlain {
    Password {
        login: String,
        password: String,
        meta: String,
    },
    Text {
        text: String,
        meta: String,
    },
    Bin {
        data: Vec<u8>,
        meta: String,
    },
    Bank {
        number: String,
        holder: String,
        date: String,
        cvv: String,
        meta: String,
    },
}

impl RecordPlain {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPlain::Password { .. } => RecordKind::Password,
            RecordPlain::Text { .. } => RecordKind::Text,
            RecordPlain::Bin { .. } => RecordKind::Bin,
            RecordPlain::Bank { .. } => RecordKind::Bank,
        }
    }
}

pub fn encrypt_record(
    public: &PKeyRef<Public>,
    plain: &RecordPlain,
) -> CryptoResult<RecordPayload> {
    let seal = |data: &[u8]| -> CryptoResult<Encrypted> {
        Ok(Encrypted(encrypt(public, data)?))
    };
    Ok(match plain {
        RecordPlain::Password {
            login,
            password,
            meta,
        } => RecordPayload::Password(PasswordRecord {
            id: 0,
            login: seal(login.as_bytes())?,
            password: seal(password.as_bytes())?,
            meta: seal(meta.as_bytes())?,
        }),
        RecordPlain::Text { text, meta } => RecordPayload::Text(TextRecord {
            id: 0,
            text: seal(text.as_bytes())?,
            meta: seal(meta.as_bytes())?,
        }),
        RecordPlain::Bin { data, meta } => RecordPayload::Bin(BinRecord {
            id: 0,
            data: seal(data)?,
            meta: seal(meta.as_bytes())?,
        }),
        RecordPlain::Bank {
            number,
            holder,
            date,
            cvv,
            meta,
        } => RecordPayload::Bank(BankRecord {
            id: 0,
            number: seal(number.as_bytes())?,
            holder: seal(holder.as_bytes())?,
            date: seal(date.as_bytes())?,
            cvv: seal(cvv.as_bytes())?,
            meta: seal(meta.as_bytes())?,
        }),
    })
}

pub fn decrypt_record(
    private: &PKeyRef<Private>,
    payload: &RecordPayload,
) -> CryptoResult<RecordPlain> {
    let open_text = |field: &Encrypted| -> CryptoResult<String> {
        Ok(String::from_utf8_lossy(&decrypt(private, field.as_bytes())?).into_owned())
    };
    Ok(match payload {
        RecordPayload::Password(r) => RecordPlain::Password {
            login: open_text(&r.login)?,
            password: open_text(&r.password)?,
            meta: open_text(&r.meta)?,
        },
        RecordPayload::Text(r) => RecordPlain::Text {
            text: open_text(&r.text)?,
            meta: open_text(&r.meta)?,
        },
        RecordPayload::Bin(r) => RecordPlain::Bin {
            data: decrypt(private, r.data.as_bytes())?,
            meta: open_text(&r.meta)?,
        },
        RecordPayload::Bank(r) => RecordPlain::Bank {
            number: open_text(&r.number)?,
            holder: open_text(&r.holder)?,
            date: open_text(&r.date)?,
            cvv: open_text(&r.cvv)?,
            meta: open_text(&r.meta)?,
        },
    })
}

/// Decrypt only the meta label, for list views.
pub fn decrypt_meta(private: &PKeyRef<Private>, meta: &Encrypted) -> CryptoResult<String> {
    Ok(String::from_utf8_lossy(&decrypt(private, meta.as_bytes())?).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_crypto::CryptoError;
    use openssl::pkey::PKey;

    fn keypair() -> (PKey<Private>, PKey<Public>) {
        let private = gk_crypto::generate_rsa_key(2048).unwrap();
        let public = gk_crypto::public_key_of(&private).unwrap();
        (private, public)
    }

    #[test]
    fn password_roundtrip() {
        let (private, public) = keypair();
        let plain = RecordPlain::Password {
            login: "a@x".into(),
            password: "hunter2".into(),
            meta: "github".into(),
        };
        let payload = encrypt_record(&public, &plain).unwrap();
        assert_eq!(payload.kind(), RecordKind::Password);
        assert_eq!(decrypt_record(&private, &payload).unwrap(), plain);
    }

    #[test]
    fn bank_roundtrip() {
        let (private, public) = keypair();
        let plain = RecordPlain::Bank {
            number: "4111 1111 1111 1111".into(),
            holder: "A".into(),
            date: "12/30".into(),
            cvv: "123".into(),
            meta: "visa".into(),
        };
        let payload = encrypt_record(&public, &plain).unwrap();
        assert_eq!(decrypt_record(&private, &payload).unwrap(), plain);
    }

    #[test]
    fn bin_roundtrip_keeps_raw_bytes() {
        let (private, public) = keypair();
        let plain = RecordPlain::Bin {
            data: vec![0, 159, 146, 150],
            meta: "firmware".into(),
        };
        let payload = encrypt_record(&public, &plain).unwrap();
        assert_eq!(decrypt_record(&private, &payload).unwrap(), plain);
    }

    #[test]
    fn meta_only_decryption() {
        let (private, public) = keypair();
        let payload = encrypt_record(
            &public,
            &RecordPlain::Text {
                text: "body".into(),
                meta: "label".into(),
            },
        )
        .unwrap();
        match payload {
            RecordPayload::Text(r) => {
                assert_eq!(decrypt_meta(&private, &r.meta).unwrap(), "label");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn corrupted_field_fails_authentication() {
        let (private, public) = keypair();
        let payload = encrypt_record(
            &public,
            &RecordPlain::Text {
                text: "body".into(),
                meta: "label".into(),
            },
        )
        .unwrap();
        match payload {
            RecordPayload::Text(mut r) => {
                let last = r.text.0.len() - 1;
                r.text.0[last] ^= 0x01;
                let err = decrypt_record(&private, &RecordPayload::Text(r)).unwrap_err();
                assert!(matches!(err, CryptoError::AuthenticationFailed));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn same_plaintext_fields_yield_distinct_ciphertexts() {
        let (_, public) = keypair();
        let plain = RecordPlain::Password {
            login: "same".into(),
            password: "same".into(),
            meta: "same".into(),
        };
        match encrypt_record(&public, &plain).unwrap() {
            RecordPayload::Password(r) => {
                assert_ne!(r.login, r.password);
                assert_ne!(r.login, r.meta);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
