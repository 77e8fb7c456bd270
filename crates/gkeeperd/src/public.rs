//! Public enrolment service: plaintext listener, single Register endpoint.
//!
//! The listener carries no TLS: the CSR is signed by the requester's own
//! key, nothing private is ever returned, and the issued certificate is
//! useless without that key. The user row and the issued certificate
//! commit together; a failed issuance leaves no orphaned user behind.

use std::time::Instant;
use tonic::{Request, Response, Status};
use tracing::{error, info, warn};

use gk_certs::{issue_leaf, CaSigner, CertRequest};
use gk_core::proto::public_server::Public;
use gk_core::proto::{RegisterRequest, RegisterResponse};
use gk_store::{Store, StoreError};

/// Longest accepted common name (X.509 ub-common-name).
const MAX_CN_LEN: usize = 64;

pub struct PublicService {
    store: Store,
    signer: CaSigner,
}

impl PublicService {
    pub fn new(store: Store, signer: CaSigner) -> Self {
        Self { store, signer }
    }

    async fn register_inner(&self, req: RegisterRequest) -> Result<RegisterResponse, Status> {
        let request = CertRequest::from_bytes(&req.csr).map_err(|e| {
            info!(error = %e, "rejecting malformed certificate request");
            Status::invalid_argument("malformed certificate request")
        })?;

        let cn = normalize_cn(&request.common_name)
            .ok_or_else(|| Status::invalid_argument("invalid common name"))?;

        request.verify_signature().map_err(|e| {
            info!(cn = %cn, error = %e, "rejecting certificate request signature");
            Status::invalid_argument("certificate request signature invalid")
        })?;

        // The user row becomes durable only once the certificate exists.
        let mut tx = self.store.begin().await.map_err(|e| {
            error!(error = %e, "opening enrolment transaction");
            Status::internal("storage failure")
        })?;

        let uid = Store::create_user_with(&mut *tx, &cn)
            .await
            .map_err(|e| match e {
                StoreError::UserExists => Status::already_exists("user already registered"),
                other => {
                    error!(cn = %cn, error = %other, "creating user");
                    Status::internal("storage failure")
                }
            })?;

        let issue_request = CertRequest {
            common_name: cn.clone(),
            ..request
        };
        let client_certificate = issue_leaf(&issue_request, &self.signer).map_err(|e| {
            error!(uid, cn = %cn, error = %e, "issuing client certificate");
            Status::internal("certificate issuance failed")
        })?;

        tx.commit().await.map_err(|e| {
            error!(uid, cn = %cn, error = %e, "committing enrolment");
            Status::internal("storage failure")
        })?;

        info!(uid, cn = %cn, "user enrolled");
        Ok(RegisterResponse {
            ca_certificate: self.signer.cert_der().to_vec(),
            client_certificate,
        })
    }
}

#[tonic::async_trait]
impl Public for PublicService {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let started = Instant::now();
        let result = self.register_inner(request.into_inner()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(method = "Register", elapsed_ms, "rpc ok"),
            Err(status) => {
                warn!(method = "Register", code = ?status.code(), elapsed_ms, "rpc failed")
            }
        }
        result.map(Response::new)
    }
}

/// Canonicalise a client-submitted common name: trimmed, lowercased,
/// non-empty, printable, at most [`MAX_CN_LEN`] bytes.
fn normalize_cn(cn: &str) -> Option<String> {
    let trimmed = cn.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_CN_LEN {
        return None;
    }
    if trimmed.chars().any(char::is_control) {
        return None;
    }
    Some(trimmed.to_lowercase())
}
