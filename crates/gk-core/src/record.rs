//! Domain record model.
//!
//! Every field of every record is an independently encrypted blob (see
//! gk-crypto): the server never holds plaintext. The per-kind payloads form
//! a tagged union; the four-slot JSON object the wire uses lives in
//! [`crate::wire`] only.

use serde::de::{Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::{kind::RecordKind, RecordId};

/// One encrypted field: RSA-wrapped content key || AES-GCM nonce || ct+tag.
///
/// Serialises as a base64 JSON string, or `null` when empty; list views
/// rely on `null` for the fields they leave out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encrypted(pub Vec<u8>);

impl Encrypted {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Encrypted {
    fn from(bytes: Vec<u8>) -> Self {
        Encrypted(bytes)
    }
}

impl Serialize for Encrypted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use base64::Engine;
        if self.0.is_empty() {
            serializer.serialize_none()
        } else {
            serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(&self.0))
        }
    }
}

impl<'de> Deserialize<'de> for Encrypted {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct B64Visitor;

        impl<'de> Visitor<'de> for B64Visitor {
            type Value = Encrypted;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a base64 string or null")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Encrypted, E> {
                use base64::Engine;
                base64::engine::general_purpose::STANDARD
                    .decode(v)
                    .map(Encrypted)
                    .map_err(E::custom)
            }

            fn visit_none<E>(self) -> Result<Encrypted, E> {
                Ok(Encrypted::default())
            }

            fn visit_unit<E>(self) -> Result<Encrypted, E> {
                Ok(Encrypted::default())
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Encrypted, D::Error> {
                d.deserialize_str(self)
            }
        }

        deserializer.deserialize_option(B64Visitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordRecord {
    pub id: RecordId,
    pub login: Encrypted,
    pub password: Encrypted,
    pub meta: Encrypted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRecord {
    pub id: RecordId,
    pub text: Encrypted,
    pub meta: Encrypted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinRecord {
    pub id: RecordId,
    pub data: Encrypted,
    pub meta: Encrypted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankRecord {
    pub id: RecordId,
    pub number: Encrypted,
    pub holder: Encrypted,
    pub date: Encrypted,
    pub cvv: Encrypted,
    pub meta: Encrypted,
}

/// One record of a single kind, fields encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPayload {
    Password(PasswordRecord),
    Text(TextRecord),
    Bin(BinRecord),
    Bank(BankRecord),
}

impl RecordPayload {
    pub fn kind(&self) -> RecordKind {
        match self {
            RecordPayload::Password(_) => RecordKind::Password,
            RecordPayload::Text(_) => RecordKind::Text,
            RecordPayload::Bin(_) => RecordKind::Bin,
            RecordPayload::Bank(_) => RecordKind::Bank,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            RecordPayload::Password(r) => r.id,
            RecordPayload::Text(r) => r.id,
            RecordPayload::Bin(r) => r.id,
            RecordPayload::Bank(r) => r.id,
        }
    }

    pub fn set_id(&mut self, id: RecordId) {
        match self {
            RecordPayload::Password(r) => r.id = id,
            RecordPayload::Text(r) => r.id = id,
            RecordPayload::Bin(r) => r.id = id,
            RecordPayload::Bank(r) => r.id = id,
        }
    }
}

/// Projection used by list views: record id plus the encrypted meta label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub id: RecordId,
    pub meta: Encrypted,
}

/// Per-kind list projections for a single user.
#[derive(Debug, Clone, Default)]
pub struct Listings {
    pub password: Vec<ListEntry>,
    pub text: Vec<ListEntry>,
    pub bin: Vec<ListEntry>,
    pub bank: Vec<ListEntry>,
}
