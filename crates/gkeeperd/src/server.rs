//! Server lifecycle: dual listeners, mTLS wiring, graceful shutdown.

use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use tonic::transport::server::ServerTlsConfig;
use tonic::transport::{Certificate, Identity, Server};
use tracing::info;

use gk_certs::{cert_der_to_pem, key_pkcs8_der_to_pem, CaSigner};
use gk_core::config::{
    ServerConfig, CA_CERT_FILENAME, CA_KEY_FILENAME, DB_FILENAME, SERVER_CERT_FILENAME,
    SERVER_KEY_FILENAME,
};
use gk_core::proto::private_server::PrivateServer;
use gk_core::proto::public_server::PublicServer;
use gk_store::Store;

use crate::private::PrivateService;
use crate::public::PublicService;

pub async fn run(config: ServerConfig) -> Result<()> {
    let db_path = config.cache_dir.join(DB_FILENAME);
    if !db_path.exists() {
        bail!(
            "cache directory {} not initialised; run `gkeeperd init` first",
            config.cache_dir.display()
        );
    }

    let store = Store::open(&db_path).await.context("opening store")?;
    let signer = CaSigner::load(
        &config.cache_dir.join(CA_CERT_FILENAME),
        &config.cache_dir.join(CA_KEY_FILENAME),
    )
    .context("loading CA signer")?;

    let tls = tls_config(&config, &signer).context("building TLS configuration")?;

    let public_addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], config.public_port));
    let private_addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], config.private_port));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, draining listeners");
        let _ = shutdown_tx.send(true);
    });

    info!(addr = %public_addr, "starting public server");
    let mut public_shutdown = shutdown_rx.clone();
    let public = Server::builder()
        .add_service(PublicServer::new(PublicService::new(
            store.clone(),
            signer,
        )))
        .serve_with_shutdown(public_addr, async move {
            let _ = public_shutdown.changed().await;
        });

    info!(addr = %private_addr, "starting private server");
    let mut private_shutdown = shutdown_rx;
    let private = Server::builder()
        .tls_config(tls)
        .context("applying TLS configuration")?
        .add_service(PrivateServer::new(PrivateService::new(store.clone())))
        .serve_with_shutdown(private_addr, async move {
            let _ = private_shutdown.changed().await;
        });

    let served = tokio::try_join!(public, private);
    store.close().await;
    served.context("serving")?;

    info!("server stopped");
    Ok(())
}

/// mTLS for the private listener: server identity plus our root as the only
/// accepted client CA. tonic's rustls transport then refuses any handshake
/// without a valid client certificate, so anonymous traffic never reaches a
/// handler.
fn tls_config(config: &ServerConfig, signer: &CaSigner) -> Result<ServerTlsConfig> {
    let cert_der = std::fs::read(config.cache_dir.join(SERVER_CERT_FILENAME))
        .context("reading server certificate")?;
    let key_der =
        std::fs::read(config.cache_dir.join(SERVER_KEY_FILENAME)).context("reading server key")?;

    let identity = Identity::from_pem(cert_der_to_pem(&cert_der)?, key_pkcs8_der_to_pem(&key_der)?);
    let ca_pem = cert_der_to_pem(signer.cert_der())?;

    Ok(ServerTlsConfig::new()
        .identity(identity)
        .client_ca_root(Certificate::from_pem(ca_pem)))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
