//! Destructive server initialisation: database, root CA, server leaf.

use anyhow::{Context, Result};
use tracing::info;

use gk_certs::{generate_root, issue_leaf, save_file, CaSigner, CertRequest};
use gk_core::config::{
    ServerConfig, CA_CERT_FILENAME, CA_KEY_FILENAME, CA_COMMON_NAME, DB_FILENAME,
    SERVER_CERT_FILENAME, SERVER_COMMON_NAME, SERVER_KEY_FILENAME,
};
use gk_store::Store;

/// Overwrite the cache directory with a fresh database, root CA and server
/// certificate. Existing users and records are destroyed.
pub async fn init(config: &ServerConfig) -> Result<()> {
    std::fs::create_dir_all(&config.cache_dir)
        .with_context(|| format!("creating cache dir {}", config.cache_dir.display()))?;

    create_database(config).await?;
    let (ca_cert, ca_key) = create_ca(config)?;
    create_server_cert(config, ca_cert, &ca_key)?;

    info!(dir = %config.cache_dir.display(), "server initialised");
    Ok(())
}

async fn create_database(config: &ServerConfig) -> Result<()> {
    let db_path = config.cache_dir.join(DB_FILENAME);
    // Truncate whatever was there before
    std::fs::File::create(&db_path)
        .with_context(|| format!("creating database {}", db_path.display()))?;

    let store = Store::open(&db_path).await.context("opening database")?;
    store.init().await.context("creating tables")?;
    store.close().await;

    info!(db = %db_path.display(), "database created");
    Ok(())
}

fn create_ca(config: &ServerConfig) -> Result<(Vec<u8>, Vec<u8>)> {
    let request = CertRequest::new(CA_COMMON_NAME, vec![], vec![], vec![], true);
    let (cert_der, key_der) = generate_root(&request).context("generating root CA")?;

    save_file(&config.cache_dir.join(CA_KEY_FILENAME), &key_der, 0o600)
        .context("saving CA key")?;
    save_file(&config.cache_dir.join(CA_CERT_FILENAME), &cert_der, 0o644)
        .context("saving CA certificate")?;

    info!(cn = CA_COMMON_NAME, "root CA created");
    Ok((cert_der, key_der))
}

fn create_server_cert(config: &ServerConfig, ca_cert: Vec<u8>, ca_key: &[u8]) -> Result<()> {
    let key = gk_crypto::generate_rsa_key(gk_crypto::keys::DEFAULT_KEY_BITS)
        .context("generating server key")?;
    let key_der = gk_crypto::private_key_to_pkcs8_der(&key).context("encoding server key")?;

    let mut request = CertRequest::new(
        SERVER_COMMON_NAME,
        config.dns_names.clone(),
        crate::net::local_ip_addresses(),
        vec![],
        false,
    );
    request
        .sign(&key_der)
        .context("signing server certificate request")?;

    let signer = CaSigner::from_der(ca_cert, ca_key).context("loading CA signer")?;
    let cert_der = issue_leaf(&request, &signer).context("issuing server certificate")?;

    save_file(&config.cache_dir.join(SERVER_KEY_FILENAME), &key_der, 0o600)
        .context("saving server key")?;
    save_file(&config.cache_dir.join(SERVER_CERT_FILENAME), &cert_der, 0o644)
        .context("saving server certificate")?;

    info!(
        dns = ?config.dns_names,
        "server certificate created"
    );
    Ok(())
}
