//! Enrolment: generate the keypair, submit a CSR, store the returned certs.
//!
//! Runs over the plaintext public endpoint. The private key never leaves
//! this machine; the server only ever sees the signed request.

use anyhow::{anyhow, Context, Result};
use tonic::transport::Channel;

use gk_certs::{save_file, CertRequest};
use gk_core::config::{
    ClientConfig, CA_CERT_FILENAME, CLIENT_CERT_FILENAME, CLIENT_KEY_FILENAME,
};
use gk_core::proto::public_client::PublicClient;
use gk_core::proto::RegisterRequest;

pub async fn register(config: &ClientConfig, name: &str) -> Result<()> {
    create_cache_dir(config)?;

    let key = gk_crypto::generate_rsa_key(gk_crypto::keys::DEFAULT_KEY_BITS)
        .context("generating keypair")?;
    let key_der = gk_crypto::private_key_to_pkcs8_der(&key).context("encoding private key")?;
    save_file(&config.cache_dir.join(CLIENT_KEY_FILENAME), &key_der, 0o600)
        .context("saving private key")?;

    let mut request = CertRequest::new(name, vec![], vec![], vec![], false);
    request
        .sign(&key_der)
        .context("signing certificate request")?;

    let channel = Channel::from_shared(format!("http://{}", config.public_addr))
        .context("invalid server address")?
        .connect()
        .await
        .with_context(|| format!("connecting to {}", config.public_addr))?;
    let mut client = PublicClient::new(channel);

    let response = client
        .register(RegisterRequest {
            csr: request.to_bytes().context("encoding certificate request")?,
        })
        .await
        .map_err(|status| anyhow!("registration rejected: {}", status.message()))?
        .into_inner();

    save_file(
        &config.cache_dir.join(CA_CERT_FILENAME),
        &response.ca_certificate,
        0o644,
    )
    .context("saving CA certificate")?;
    save_file(
        &config.cache_dir.join(CLIENT_CERT_FILENAME),
        &response.client_certificate,
        0o644,
    )
    .context("saving client certificate")?;

    println!(
        "Registered {name}; certificates stored in {}",
        config.cache_dir.display()
    );
    Ok(())
}

fn create_cache_dir(config: &ClientConfig) -> Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(&config.cache_dir)
        .with_context(|| format!("creating cache dir {}", config.cache_dir.display()))
}
