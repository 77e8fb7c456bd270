//! Record categories and their wire enum mapping.

use crate::proto;

/// The four record categories a user can store. `Unknown` only ever appears
/// when a wire value fails to decode; no record is stored under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Unknown,
    Password,
    Text,
    Bin,
    Bank,
}

impl RecordKind {
    /// All storable kinds, in wire order.
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Password,
        RecordKind::Text,
        RecordKind::Bin,
        RecordKind::Bank,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Unknown => "unknown type",
            RecordKind::Password => "password",
            RecordKind::Text => "text",
            RecordKind::Bin => "binary data",
            RecordKind::Bank => "bank's card",
        }
    }

    /// Decode a raw protobuf enum value. Unrecognised values collapse to
    /// `Unknown`, which every operation rejects downstream.
    pub fn from_proto(value: i32) -> Self {
        match proto::RecordKind::try_from(value) {
            Ok(proto::RecordKind::Password) => RecordKind::Password,
            Ok(proto::RecordKind::Text) => RecordKind::Text,
            Ok(proto::RecordKind::Bin) => RecordKind::Bin,
            Ok(proto::RecordKind::Bank) => RecordKind::Bank,
            _ => RecordKind::Unknown,
        }
    }

    pub fn to_proto(self) -> proto::RecordKind {
        match self {
            RecordKind::Unknown => proto::RecordKind::Unknown,
            RecordKind::Password => proto::RecordKind::Password,
            RecordKind::Text => proto::RecordKind::Text,
            RecordKind::Bin => proto::RecordKind::Bin,
            RecordKind::Bank => proto::RecordKind::Bank,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proto_roundtrip() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::from_proto(kind.to_proto() as i32), kind);
        }
    }

    #[test]
    fn unrecognised_value_is_unknown() {
        assert_eq!(RecordKind::from_proto(42), RecordKind::Unknown);
        assert_eq!(RecordKind::from_proto(0), RecordKind::Unknown);
    }
}
