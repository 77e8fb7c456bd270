//! JSON wire shapes for record payloads.
//!
//! The transport carries records as JSON bytes inside protobuf messages: an
//! object with four capitalised keys (`Password`, `Text`, `Bin`, `Bank`)
//! of which only the sub-object for the declared kind is populated. Field
//! bytes are base64 strings, absent fields are `null`. This module is the
//! only place that shape exists; both sides convert to [`RecordPayload`]
//! immediately after decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kind::RecordKind;
use crate::record::{
    BankRecord, BinRecord, Encrypted, ListEntry, Listings, PasswordRecord, RecordPayload,
    TextRecord,
};
use crate::RecordId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unknown record kind")]
    UnknownKind,
    #[error("record payload for {0} is missing")]
    MissingPayload(RecordKind),
    #[error("field {0:?} is empty")]
    EmptyField(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordWire {
    #[serde(rename = "ID", default)]
    pub id: RecordId,
    #[serde(rename = "Login", default)]
    pub login: Encrypted,
    #[serde(rename = "Password", default)]
    pub password: Encrypted,
    #[serde(rename = "Meta", default)]
    pub meta: Encrypted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextWire {
    #[serde(rename = "ID", default)]
    pub id: RecordId,
    #[serde(rename = "Text", default)]
    pub text: Encrypted,
    #[serde(rename = "Meta", default)]
    pub meta: Encrypted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BinWire {
    #[serde(rename = "ID", default)]
    pub id: RecordId,
    #[serde(rename = "Data", default)]
    pub data: Encrypted,
    #[serde(rename = "Meta", default)]
    pub meta: Encrypted,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankWire {
    #[serde(rename = "ID", default)]
    pub id: RecordId,
    #[serde(rename = "Number", default)]
    pub number: Encrypted,
    #[serde(rename = "Name", default)]
    pub holder: Encrypted,
    #[serde(rename = "Date", default)]
    pub date: Encrypted,
    #[serde(rename = "Cvv", default)]
    pub cvv: Encrypted,
    #[serde(rename = "Meta", default)]
    pub meta: Encrypted,
}

/// One record on the wire: four maybe-populated sub-objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordWire {
    #[serde(rename = "Password", default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordWire>,
    #[serde(rename = "Text", default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextWire>,
    #[serde(rename = "Bin", default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<BinWire>,
    #[serde(rename = "Bank", default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<BankWire>,
}

impl RecordWire {
    pub fn from_payload(payload: &RecordPayload) -> Self {
        let mut wire = RecordWire::default();
        match payload {
            RecordPayload::Password(r) => {
                wire.password = Some(PasswordWire {
                    id: r.id,
                    login: r.login.clone(),
                    password: r.password.clone(),
                    meta: r.meta.clone(),
                });
            }
            RecordPayload::Text(r) => {
                wire.text = Some(TextWire {
                    id: r.id,
                    text: r.text.clone(),
                    meta: r.meta.clone(),
                });
            }
            RecordPayload::Bin(r) => {
                wire.bin = Some(BinWire {
                    id: r.id,
                    data: r.data.clone(),
                    meta: r.meta.clone(),
                });
            }
            RecordPayload::Bank(r) => {
                wire.bank = Some(BankWire {
                    id: r.id,
                    number: r.number.clone(),
                    holder: r.holder.clone(),
                    date: r.date.clone(),
                    cvv: r.cvv.clone(),
                    meta: r.meta.clone(),
                });
            }
        }
        wire
    }

    /// Extract the payload for `kind`, checking that exactly the declared
    /// field set is present (every ciphertext non-empty).
    pub fn into_payload(self, kind: RecordKind) -> Result<RecordPayload, WireError> {
        fn field(name: &'static str, value: Encrypted) -> Result<Encrypted, WireError> {
            if value.is_empty() {
                Err(WireError::EmptyField(name))
            } else {
                Ok(value)
            }
        }

        match kind {
            RecordKind::Password => {
                let w = self
                    .password
                    .ok_or(WireError::MissingPayload(RecordKind::Password))?;
                Ok(RecordPayload::Password(PasswordRecord {
                    id: w.id,
                    login: field("login", w.login)?,
                    password: field("password", w.password)?,
                    meta: field("meta", w.meta)?,
                }))
            }
            RecordKind::Text => {
                let w = self.text.ok_or(WireError::MissingPayload(RecordKind::Text))?;
                Ok(RecordPayload::Text(TextRecord {
                    id: w.id,
                    text: field("text", w.text)?,
                    meta: field("meta", w.meta)?,
                }))
            }
            RecordKind::Bin => {
                let w = self.bin.ok_or(WireError::MissingPayload(RecordKind::Bin))?;
                Ok(RecordPayload::Bin(BinRecord {
                    id: w.id,
                    data: field("data", w.data)?,
                    meta: field("meta", w.meta)?,
                }))
            }
            RecordKind::Bank => {
                let w = self.bank.ok_or(WireError::MissingPayload(RecordKind::Bank))?;
                Ok(RecordPayload::Bank(BankRecord {
                    id: w.id,
                    number: field("number", w.number)?,
                    holder: field("holder_name", w.holder)?,
                    date: field("date", w.date)?,
                    cvv: field("cvv", w.cvv)?,
                    meta: field("meta", w.meta)?,
                }))
            }
            RecordKind::Unknown => Err(WireError::UnknownKind),
        }
    }
}

/// List projections on the wire: four arrays, always present. Entries carry
/// only id and encrypted meta; the remaining fields serialise as `null`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordListWire {
    #[serde(rename = "Password", default)]
    pub password: Vec<PasswordWire>,
    #[serde(rename = "Text", default)]
    pub text: Vec<TextWire>,
    #[serde(rename = "Bin", default)]
    pub bin: Vec<BinWire>,
    #[serde(rename = "Bank", default)]
    pub bank: Vec<BankWire>,
}

impl RecordListWire {
    /// Wire view with only the array for `kind` populated.
    pub fn for_kind(kind: RecordKind, entries: Vec<ListEntry>) -> Result<Self, WireError> {
        let mut wire = RecordListWire::default();
        match kind {
            RecordKind::Password => wire.password = password_entries(entries),
            RecordKind::Text => wire.text = text_entries(entries),
            RecordKind::Bin => wire.bin = bin_entries(entries),
            RecordKind::Bank => wire.bank = bank_entries(entries),
            RecordKind::Unknown => return Err(WireError::UnknownKind),
        }
        Ok(wire)
    }

    pub fn from_listings(listings: Listings) -> Self {
        RecordListWire {
            password: password_entries(listings.password),
            text: text_entries(listings.text),
            bin: bin_entries(listings.bin),
            bank: bank_entries(listings.bank),
        }
    }

    /// (id, meta) pairs for `kind`, in wire order.
    pub fn entries(&self, kind: RecordKind) -> Vec<ListEntry> {
        match kind {
            RecordKind::Password => self
                .password
                .iter()
                .map(|w| ListEntry {
                    id: w.id,
                    meta: w.meta.clone(),
                })
                .collect(),
            RecordKind::Text => self
                .text
                .iter()
                .map(|w| ListEntry {
                    id: w.id,
                    meta: w.meta.clone(),
                })
                .collect(),
            RecordKind::Bin => self
                .bin
                .iter()
                .map(|w| ListEntry {
                    id: w.id,
                    meta: w.meta.clone(),
                })
                .collect(),
            RecordKind::Bank => self
                .bank
                .iter()
                .map(|w| ListEntry {
                    id: w.id,
                    meta: w.meta.clone(),
                })
                .collect(),
            RecordKind::Unknown => Vec::new(),
        }
    }
}

fn password_entries(entries: Vec<ListEntry>) -> Vec<PasswordWire> {
    entries
        .into_iter()
        .map(|e| PasswordWire {
            id: e.id,
            meta: e.meta,
            ..Default::default()
        })
        .collect()
}

fn text_entries(entries: Vec<ListEntry>) -> Vec<TextWire> {
    entries
        .into_iter()
        .map(|e| TextWire {
            id: e.id,
            meta: e.meta,
            ..Default::default()
        })
        .collect()
}

fn bin_entries(entries: Vec<ListEntry>) -> Vec<BinWire> {
    entries
        .into_iter()
        .map(|e| BinWire {
            id: e.id,
            meta: e.meta,
            ..Default::default()
        })
        .collect()
}

fn bank_entries(entries: Vec<ListEntry>) -> Vec<BankWire> {
    entries
        .into_iter()
        .map(|e| BankWire {
            id: e.id,
            meta: e.meta,
            ..Default::default()
        })
        .collect()
}
