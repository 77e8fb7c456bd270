//! Client core: mTLS channel, key material, typed RPC wrappers.

use anyhow::{anyhow, Context, Result};
use openssl::pkey::{PKey, Private, Public};
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};

use gk_certs::{cert_der_to_pem, key_pkcs8_der_to_pem};
use gk_core::config::{
    ClientConfig, CA_CERT_FILENAME, CLIENT_CERT_FILENAME, CLIENT_KEY_FILENAME,
};
use gk_core::proto::private_client::PrivateClient;
use gk_core::proto::{
    AddRecordRequest, DeleteRecordRequest, Empty, GetRecordRequest, ListRequest,
    UpdateRecordRequest,
};
use gk_core::wire::{RecordListWire, RecordWire};
use gk_core::{RecordId, RecordKind};

use crate::records::{decrypt_meta, decrypt_record, encrypt_record, RecordPlain};

pub struct ClientCore {
    private: PrivateClient<Channel>,
    public_key: PKey<Public>,
    private_key: PKey<Private>,
}

impl ClientCore {
    /// Load the cached key material and dial the private endpoint.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let dir = &config.cache_dir;
        let key_der = std::fs::read(dir.join(CLIENT_KEY_FILENAME)).with_context(|| {
            format!(
                "reading {}; run `gkeeper register` first",
                dir.join(CLIENT_KEY_FILENAME).display()
            )
        })?;
        let cert_der =
            std::fs::read(dir.join(CLIENT_CERT_FILENAME)).context("reading client certificate")?;
        let ca_der = std::fs::read(dir.join(CA_CERT_FILENAME)).context("reading CA certificate")?;

        let private_key =
            gk_crypto::private_key_from_pkcs8_der(&key_der).context("parsing private key")?;
        let public_key = gk_crypto::public_key_of(&private_key).context("deriving public key")?;

        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(cert_der_to_pem(&ca_der)?))
            .identity(Identity::from_pem(
                cert_der_to_pem(&cert_der)?,
                key_pkcs8_der_to_pem(&key_der)?,
            ));

        let channel = Channel::from_shared(format!("https://{}", config.private_addr))
            .context("invalid server address")?
            .tls_config(tls)
            .context("building TLS configuration")?
            .connect()
            .await
            .with_context(|| format!("connecting to {}", config.private_addr))?;

        Ok(Self {
            private: PrivateClient::new(channel),
            public_key,
            private_key,
        })
    }

    /// Ids and decrypted meta labels of one kind.
    pub async fn list(&mut self, kind: RecordKind) -> Result<Vec<(RecordId, String)>> {
        let response = self
            .private
            .list(ListRequest {
                kind: kind.to_proto().into(),
            })
            .await
            .map_err(server_error)?
            .into_inner();
        let wire: RecordListWire =
            serde_json::from_slice(&response.records).context("decoding list response")?;
        self.decrypt_entries(&wire, kind)
    }

    /// Ids and decrypted meta labels of every kind.
    pub async fn list_all(&mut self) -> Result<Vec<(RecordKind, RecordId, String)>> {
        let response = self
            .private
            .list_all(Empty {})
            .await
            .map_err(server_error)?
            .into_inner();
        let wire: RecordListWire =
            serde_json::from_slice(&response.records).context("decoding list response")?;

        let mut all = Vec::new();
        for kind in RecordKind::ALL {
            for (id, meta) in self.decrypt_entries(&wire, kind)? {
                all.push((kind, id, meta));
            }
        }
        Ok(all)
    }

    pub async fn create(&mut self, plain: &RecordPlain) -> Result<()> {
        let payload = encrypt_record(&self.public_key, plain).context("encrypting record")?;
        let record = serde_json::to_vec(&RecordWire::from_payload(&payload))
            .context("encoding record")?;
        self.private
            .create(AddRecordRequest {
                kind: plain.kind().to_proto().into(),
                record,
            })
            .await
            .map_err(server_error)?;
        Ok(())
    }

    pub async fn read(&mut self, kind: RecordKind, id: RecordId) -> Result<RecordPlain> {
        let response = self
            .private
            .read(GetRecordRequest {
                kind: kind.to_proto().into(),
                record_id: id,
            })
            .await
            .map_err(server_error)?
            .into_inner();
        let wire: RecordWire =
            serde_json::from_slice(&response.record).context("decoding record")?;
        let payload = wire
            .into_payload(kind)
            .map_err(|e| anyhow!("unexpected record shape: {e}"))?;
        decrypt_record(&self.private_key, &payload).context("decrypting record")
    }

    pub async fn update(
        &mut self,
        kind: RecordKind,
        id: RecordId,
        plain: &RecordPlain,
    ) -> Result<()> {
        let payload = encrypt_record(&self.public_key, plain).context("encrypting record")?;
        let record = serde_json::to_vec(&RecordWire::from_payload(&payload))
            .context("encoding record")?;
        self.private
            .update(UpdateRecordRequest {
                kind: kind.to_proto().into(),
                record_id: id,
                record,
            })
            .await
            .map_err(server_error)?;
        Ok(())
    }

    pub async fn delete(&mut self, kind: RecordKind, id: RecordId) -> Result<()> {
        self.private
            .delete(DeleteRecordRequest {
                kind: kind.to_proto().into(),
                record_id: id,
            })
            .await
            .map_err(server_error)?;
        Ok(())
    }

    fn decrypt_entries(
        &self,
        wire: &RecordListWire,
        kind: RecordKind,
    ) -> Result<Vec<(RecordId, String)>> {
        wire.entries(kind)
            .into_iter()
            .map(|entry| {
                let meta = decrypt_meta(&self.private_key, &entry.meta)
                    .with_context(|| format!("decrypting meta of record {}", entry.id))?;
                Ok((entry.id, meta))
            })
            .collect()
    }
}

/// The server only ever sends category strings; show them as-is.
fn server_error(status: tonic::Status) -> anyhow::Error {
    anyhow!("server error: {}", status.message())
}
