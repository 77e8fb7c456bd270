//! Shared configuration and cache-directory layout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PUBLIC_PORT: u16 = 3200;
pub const DEFAULT_PRIVATE_PORT: u16 = 3201;
pub const DEFAULT_SERVER_HOST: &str = "localhost";

pub const DB_FILENAME: &str = "database.db";
pub const CA_CERT_FILENAME: &str = "ca.crt";
pub const CA_KEY_FILENAME: &str = "ca.key";
pub const SERVER_CERT_FILENAME: &str = "server.crt";
pub const SERVER_KEY_FILENAME: &str = "server.key";
pub const CLIENT_CERT_FILENAME: &str = "client.crt";
pub const CLIENT_KEY_FILENAME: &str = "client.key";

pub const CA_COMMON_NAME: &str = "GophKeeper Root CA";
pub const SERVER_COMMON_NAME: &str = "GophKeeper Server";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Directory holding database and certificate material
    pub cache_dir: PathBuf,
    /// Plaintext enrolment listener port
    pub public_port: u16,
    /// mTLS record listener port
    pub private_port: u16,
    /// DNS names for the server leaf certificate
    pub dns_names: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir("gophkeeper-server"),
            public_port: DEFAULT_PUBLIC_PORT,
            private_port: DEFAULT_PRIVATE_PORT,
            dns_names: vec!["localhost".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Directory holding the client keypair and certificates
    pub cache_dir: PathBuf,
    /// host:port of the enrolment listener
    pub public_addr: String,
    /// host:port of the record listener
    pub private_addr: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir("gophkeeper"),
            public_addr: format!("{DEFAULT_SERVER_HOST}:{DEFAULT_PUBLIC_PORT}"),
            private_addr: format!("{DEFAULT_SERVER_HOST}:{DEFAULT_PRIVATE_PORT}"),
        }
    }
}

/// Platform cache directory for `app`, falling back to a dot-directory in
/// the working directory when the platform gives us nothing.
pub fn default_cache_dir(app: &str) -> PathBuf {
    directories::ProjectDirs::from("", "", app)
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(format!(".{app}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.public_port, 3200);
        assert_eq!(cfg.private_port, 3201);
        assert_eq!(cfg.dns_names, vec!["localhost".to_string()]);

        let cfg = ClientConfig::default();
        assert_eq!(cfg.private_addr, "localhost:3201");
    }
}
