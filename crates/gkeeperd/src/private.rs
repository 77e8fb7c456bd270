//! Private record service, reachable only through verified mTLS.
//!
//! The transport already rejected anonymous peers at the handshake; here we
//! bind the request to a user by reading the CN out of the verified client
//! leaf and resolving it against the store. Record payloads cross the wire
//! as opaque JSON bytes (see gk_core::wire).

use std::time::Instant;
use tonic::{Request, Response, Status};
use tracing::{error, info, warn};

use gk_core::proto::private_server::Private;
use gk_core::proto::{
    AddRecordRequest, DeleteRecordRequest, Empty, GetRecordRequest, GetRecordResponse,
    ListRequest, ListResponse, UpdateRecordRequest,
};
use gk_core::wire::{RecordListWire, RecordWire, WireError};
use gk_core::{RecordId, RecordKind, UserId};
use gk_store::{Store, StoreError};

pub struct PrivateService {
    store: Store,
}

/// Identity attached to a request after certificate verification.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: UserId,
    pub cn: String,
}

impl PrivateService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Derive the caller's identity from the verified peer certificate.
    /// Everything that can go wrong here is `Unauthenticated`.
    async fn authenticate<T>(&self, request: &Request<T>) -> Result<AuthedUser, Status> {
        let certs = request
            .peer_certs()
            .ok_or_else(|| Status::unauthenticated("client certificate chain not found"))?;
        let leaf = certs
            .first()
            .ok_or_else(|| Status::unauthenticated("client certificate chain is empty"))?;

        let cert = openssl::x509::X509::from_der(leaf.as_ref())
            .map_err(|_| Status::unauthenticated("client certificate not parseable"))?;
        let cn = cert
            .subject_name()
            .entries_by_nid(openssl::nid::Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Status::unauthenticated("client common name not found"))?;

        let id = match self.store.lookup_user_id(&cn).await {
            Ok(id) => id,
            Err(StoreError::Database(e)) => {
                error!(cn = %cn, error = %e, "storage failure during authentication");
                return Err(Status::internal("storage failure"));
            }
            Err(_) => {
                info!(cn = %cn, "certificate presented for unknown user");
                return Err(Status::unauthenticated("unknown user"));
            }
        };
        Ok(AuthedUser { id, cn })
    }

    // ── Handler bodies, identity already resolved ────────────────────────

    async fn list_inner(&self, user: &AuthedUser, kind: RecordKind) -> Result<ListResponse, Status> {
        let entries = self
            .store
            .list(user.id, kind)
            .await
            .map_err(|e| self.store_status(user, e))?;
        let wire = RecordListWire::for_kind(kind, entries).map_err(wire_status)?;
        Ok(ListResponse {
            records: encode(user, &wire)?,
        })
    }

    async fn list_all_inner(&self, user: &AuthedUser) -> Result<ListResponse, Status> {
        let listings = self
            .store
            .list_all(user.id)
            .await
            .map_err(|e| self.store_status(user, e))?;
        let wire = RecordListWire::from_listings(listings);
        Ok(ListResponse {
            records: encode(user, &wire)?,
        })
    }

    async fn create_inner(
        &self,
        user: &AuthedUser,
        kind: RecordKind,
        record: &[u8],
    ) -> Result<Empty, Status> {
        let payload = decode_record(record)?.into_payload(kind).map_err(wire_status)?;
        self.store
            .add(user.id, &payload)
            .await
            .map_err(|e| self.store_status(user, e))?;
        Ok(Empty {})
    }

    async fn read_inner(
        &self,
        user: &AuthedUser,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<GetRecordResponse, Status> {
        let payload = self
            .store
            .get(user.id, kind, id)
            .await
            .map_err(|e| self.store_status(user, e))?;
        Ok(GetRecordResponse {
            kind: kind.to_proto().into(),
            record: encode(user, &RecordWire::from_payload(&payload))?,
        })
    }

    async fn update_inner(
        &self,
        user: &AuthedUser,
        kind: RecordKind,
        id: RecordId,
        record: &[u8],
    ) -> Result<Empty, Status> {
        let payload = decode_record(record)?.into_payload(kind).map_err(wire_status)?;
        self.store
            .update(user.id, id, &payload)
            .await
            .map_err(|e| self.store_status(user, e))?;
        Ok(Empty {})
    }

    async fn delete_inner(
        &self,
        user: &AuthedUser,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<Empty, Status> {
        self.store
            .delete(user.id, kind, id)
            .await
            .map_err(|e| self.store_status(user, e))?;
        Ok(Empty {})
    }

    /// Map store errors to transport codes. The wire carries the category
    /// only; details stay in the server log with identity context.
    fn store_status(&self, user: &AuthedUser, err: StoreError) -> Status {
        match err {
            StoreError::NotFound => Status::not_found("record not found"),
            StoreError::InvalidKind => Status::invalid_argument("unknown record kind"),
            StoreError::UserExists => Status::already_exists("user already registered"),
            StoreError::UserMissing => Status::unauthenticated("unknown user"),
            StoreError::Database(e) => {
                error!(uid = user.id, cn = %user.cn, error = %e, "storage failure");
                Status::internal("storage failure")
            }
        }
    }
}

fn decode_record(bytes: &[u8]) -> Result<RecordWire, Status> {
    serde_json::from_slice(bytes)
        .map_err(|_| Status::invalid_argument("malformed record payload"))
}

fn encode<T: serde::Serialize>(user: &AuthedUser, value: &T) -> Result<Vec<u8>, Status> {
    serde_json::to_vec(value).map_err(|e| {
        error!(uid = user.id, cn = %user.cn, error = %e, "encoding response payload");
        Status::internal("encoding failure")
    })
}

fn wire_status(err: WireError) -> Status {
    Status::invalid_argument(err.to_string())
}

/// One structured line per RPC: identity, method, latency, outcome.
fn finish<T>(
    method: &'static str,
    user: &AuthedUser,
    started: Instant,
    result: Result<T, Status>,
) -> Result<Response<T>, Status> {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => info!(uid = user.id, cn = %user.cn, method, elapsed_ms, "rpc ok"),
        Err(status) => {
            warn!(uid = user.id, cn = %user.cn, method, code = ?status.code(), elapsed_ms, "rpc failed")
        }
    }
    result.map(Response::new)
}

#[tonic::async_trait]
impl Private for PrivateService {
    async fn list(&self, request: Request<ListRequest>) -> Result<Response<ListResponse>, Status> {
        let user = self.authenticate(&request).await?;
        let started = Instant::now();
        let req = request.into_inner();
        let result = self.list_inner(&user, RecordKind::from_proto(req.kind)).await;
        finish("List", &user, started, result)
    }

    async fn list_all(&self, request: Request<Empty>) -> Result<Response<ListResponse>, Status> {
        let user = self.authenticate(&request).await?;
        let started = Instant::now();
        let result = self.list_all_inner(&user).await;
        finish("ListAll", &user, started, result)
    }

    async fn create(
        &self,
        request: Request<AddRecordRequest>,
    ) -> Result<Response<Empty>, Status> {
        let user = self.authenticate(&request).await?;
        let started = Instant::now();
        let req = request.into_inner();
        let result = self
            .create_inner(&user, RecordKind::from_proto(req.kind), &req.record)
            .await;
        finish("Create", &user, started, result)
    }

    async fn read(
        &self,
        request: Request<GetRecordRequest>,
    ) -> Result<Response<GetRecordResponse>, Status> {
        let user = self.authenticate(&request).await?;
        let started = Instant::now();
        let req = request.into_inner();
        let result = self
            .read_inner(&user, RecordKind::from_proto(req.kind), req.record_id)
            .await;
        finish("Read", &user, started, result)
    }

    async fn update(
        &self,
        request: Request<UpdateRecordRequest>,
    ) -> Result<Response<Empty>, Status> {
        let user = self.authenticate(&request).await?;
        let started = Instant::now();
        let req = request.into_inner();
        let result = self
            .update_inner(
                &user,
                RecordKind::from_proto(req.kind),
                req.record_id,
                &req.record,
            )
            .await;
        finish("Update", &user, started, result)
    }

    async fn delete(
        &self,
        request: Request<DeleteRecordRequest>,
    ) -> Result<Response<Empty>, Status> {
        let user = self.authenticate(&request).await?;
        let started = Instant::now();
        let req = request.into_inner();
        let result = self
            .delete_inner(&user, RecordKind::from_proto(req.kind), req.record_id)
            .await;
        finish("Delete", &user, started, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gk_core::record::{Encrypted, PasswordRecord, RecordPayload};
    use tonic::Code;

    async fn test_service() -> (PrivateService, Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).await.unwrap();
        store.init().await.unwrap();
        (PrivateService::new(store.clone()), store, dir)
    }

    async fn enrol(store: &Store, cn: &str) -> AuthedUser {
        let id = store.create_user(cn).await.unwrap();
        AuthedUser { id, cn: cn.into() }
    }

    fn blob(byte: u8) -> Encrypted {
        Encrypted(vec![byte; 300])
    }

    fn password_bytes(meta: u8) -> Vec<u8> {
        let payload = RecordPayload::Password(PasswordRecord {
            id: 0,
            login: blob(1),
            password: blob(2),
            meta: blob(meta),
        });
        serde_json::to_vec(&RecordWire::from_payload(&payload)).unwrap()
    }

    #[tokio::test]
    async fn create_then_read_roundtrip() {
        let (service, store, _dir) = test_service().await;
        let alice = enrol(&store, "alice").await;

        let bytes = password_bytes(1);
        service
            .create_inner(&alice, RecordKind::Password, &bytes)
            .await
            .unwrap();

        let resp = service
            .read_inner(&alice, RecordKind::Password, 1)
            .await
            .unwrap();
        let wire: RecordWire = serde_json::from_slice(&resp.record).unwrap();
        let payload = wire.into_payload(RecordKind::Password).unwrap();
        assert_eq!(payload.id(), 1);
        match payload {
            RecordPayload::Password(r) => {
                assert_eq!(r.login, blob(1));
                assert_eq!(r.password, blob(2));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn records_are_invisible_across_users() {
        let (service, store, _dir) = test_service().await;
        let alice = enrol(&store, "alice").await;
        let bob = enrol(&store, "bob").await;

        service
            .create_inner(&alice, RecordKind::Password, &password_bytes(1))
            .await
            .unwrap();

        let read = service.read_inner(&bob, RecordKind::Password, 1).await;
        assert_eq!(read.unwrap_err().code(), Code::NotFound);
        let update = service
            .update_inner(&bob, RecordKind::Password, 1, &password_bytes(9))
            .await;
        assert_eq!(update.unwrap_err().code(), Code::NotFound);
        let delete = service.delete_inner(&bob, RecordKind::Password, 1).await;
        assert_eq!(delete.unwrap_err().code(), Code::NotFound);

        let list = service.list_inner(&bob, RecordKind::Password).await.unwrap();
        let wire: RecordListWire = serde_json::from_slice(&list.records).unwrap();
        assert!(wire.entries(RecordKind::Password).is_empty());
    }

    #[tokio::test]
    async fn list_populates_only_requested_kind() {
        let (service, store, _dir) = test_service().await;
        let alice = enrol(&store, "alice").await;

        service
            .create_inner(&alice, RecordKind::Password, &password_bytes(1))
            .await
            .unwrap();
        service
            .create_inner(&alice, RecordKind::Password, &password_bytes(2))
            .await
            .unwrap();

        let resp = service
            .list_inner(&alice, RecordKind::Password)
            .await
            .unwrap();
        let wire: RecordListWire = serde_json::from_slice(&resp.records).unwrap();
        assert_eq!(wire.entries(RecordKind::Password).len(), 2);
        assert!(wire.entries(RecordKind::Text).is_empty());
        assert!(wire.entries(RecordKind::Bank).is_empty());
    }

    #[tokio::test]
    async fn update_replaces_and_read_sees_new_ciphertext() {
        let (service, store, _dir) = test_service().await;
        let alice = enrol(&store, "alice").await;

        service
            .create_inner(&alice, RecordKind::Password, &password_bytes(1))
            .await
            .unwrap();
        service
            .update_inner(&alice, RecordKind::Password, 1, &password_bytes(7))
            .await
            .unwrap();

        let resp = service
            .read_inner(&alice, RecordKind::Password, 1)
            .await
            .unwrap();
        let wire: RecordWire = serde_json::from_slice(&resp.record).unwrap();
        match wire.into_payload(RecordKind::Password).unwrap() {
            RecordPayload::Password(r) => assert_eq!(r.meta, blob(7)),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_twice_reports_not_found() {
        let (service, store, _dir) = test_service().await;
        let alice = enrol(&store, "alice").await;

        let missing = service.delete_inner(&alice, RecordKind::Password, 42).await;
        assert_eq!(missing.unwrap_err().code(), Code::NotFound);

        service
            .create_inner(&alice, RecordKind::Password, &password_bytes(1))
            .await
            .unwrap();
        service
            .delete_inner(&alice, RecordKind::Password, 1)
            .await
            .unwrap();
        let again = service.delete_inner(&alice, RecordKind::Password, 1).await;
        assert_eq!(again.unwrap_err().code(), Code::NotFound);
    }

    #[tokio::test]
    async fn malformed_payloads_are_invalid_argument() {
        let (service, store, _dir) = test_service().await;
        let alice = enrol(&store, "alice").await;

        let garbage = service
            .create_inner(&alice, RecordKind::Password, b"not json")
            .await;
        assert_eq!(garbage.unwrap_err().code(), Code::InvalidArgument);

        // right JSON, wrong kind slot
        let mismatched = service
            .create_inner(&alice, RecordKind::Bank, &password_bytes(1))
            .await;
        assert_eq!(mismatched.unwrap_err().code(), Code::InvalidArgument);

        let unknown = service
            .create_inner(&alice, RecordKind::Unknown, &password_bytes(1))
            .await;
        assert_eq!(unknown.unwrap_err().code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn list_all_covers_every_kind() {
        let (service, store, _dir) = test_service().await;
        let alice = enrol(&store, "alice").await;

        service
            .create_inner(&alice, RecordKind::Password, &password_bytes(1))
            .await
            .unwrap();

        let resp = service.list_all_inner(&alice).await.unwrap();
        let wire: RecordListWire = serde_json::from_slice(&resp.records).unwrap();
        assert_eq!(wire.entries(RecordKind::Password).len(), 1);
        assert!(wire.entries(RecordKind::Text).is_empty());
    }
}
