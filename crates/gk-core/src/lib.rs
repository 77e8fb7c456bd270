pub mod config;
pub mod kind;
pub mod record;
pub mod wire;

pub use kind::RecordKind;
pub use record::{Encrypted, ListEntry, Listings, RecordPayload};

/// Generated gRPC types and service traits (from gophkeeper.proto)
pub mod proto {
    tonic::include_proto!("gophkeeper");
}

/// Server-assigned user identifier (monotonic, starts at 1).
pub type UserId = i64;

/// Record identifier, monotonic per (user, kind).
pub type RecordId = i64;
