use std::{fs, path::Path, time::Duration};

use crate::config::{DbOptions, SslPaths};
use crate::error::BootstrapError;

/// TLS material read into memory. Shared by the database connection and the
/// host-selection probe.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub ca: String,
    pub cert: Option<String>,
    pub key: Option<String>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca", &"<pem>")
            .field("cert", &self.cert.as_ref().map(|_| "<pem>"))
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Driver options with every file path replaced by its contents.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub tls: Option<TlsMaterial>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub application_name: Option<String>,
}

impl SslPaths {
    pub fn resolve(&self) -> Result<TlsMaterial, BootstrapError> {
        let ca = read_pem(&self.ca)?;
        let (cert, key) = match &self.cert {
            // The key always travels with the certificate.
            Some(cert_path) => {
                let key_path = self.key.as_ref().ok_or(BootstrapError::MissingClientKey)?;
                (Some(read_pem(cert_path)?), Some(read_pem(key_path)?))
            }
            None => (None, None),
        };
        Ok(TlsMaterial { ca, cert, key })
    }
}

impl DbOptions {
    pub fn resolve(&self) -> Result<ResolvedOptions, BootstrapError> {
        let tls = self.ssl.as_ref().map(SslPaths::resolve).transpose()?;
        Ok(ResolvedOptions {
            tls,
            max_connections: self.max_connections,
            acquire_timeout: Duration::from_secs(self.acquire_timeout_secs),
            application_name: self.application_name.clone(),
        })
    }
}

fn read_pem(path: &Path) -> Result<String, BootstrapError> {
    fs::read_to_string(path).map_err(|source| BootstrapError::TlsMaterial {
        path: path.to_path_buf(),
        source,
    })
}
