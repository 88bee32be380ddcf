use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::{fmt, future::Future, pin::Pin, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{Endpoint, Endpoints, Timer, TlsMaterial};
use crate::config::ProbeConfig;
use crate::error::BootstrapError;

/// Health check run against a candidate host before connecting to it.
#[async_trait]
pub trait HostProbe: Send + Sync + 'static {
    /// Called once per host selection, before any candidate is checked. Errors are
    /// configuration problems and abort the selection.
    fn prepare(&self, _tls: Option<&TlsMaterial>) -> Result<(), BootstrapError> {
        Ok(())
    }

    async fn is_responding(&self, host: &str, tls: Option<&TlsMaterial>) -> bool;
}

/// Probes the management API on a fixed port (`GET {scheme}://{host}:{port}/`).
/// Only HTTP 200 counts as responding.
///
/// The HTTP client is built once per CA and reused until the CA changes.
pub struct HttpProbe {
    scheme: String,
    port: u16,
    timeout: Duration,
    client: Mutex<Option<CachedClient>>,
}

struct CachedClient {
    ca: Option<String>,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(cfg: &ProbeConfig) -> Self {
        Self {
            scheme: cfg.scheme.clone(),
            port: cfg.port,
            timeout: Duration::from_secs(cfg.timeout_secs),
            client: Mutex::new(None),
        }
    }

    fn client(&self, tls: Option<&TlsMaterial>) -> Result<reqwest::Client, BootstrapError> {
        let ca = tls.map(|tls| tls.ca.as_str());
        let mut cached = self.client.lock();
        if let Some(entry) = cached.as_ref().filter(|entry| entry.ca.as_deref() == ca) {
            return Ok(entry.client.clone());
        }

        let client = self.build_client(ca).map_err(BootstrapError::ProbeClient)?;
        *cached = Some(CachedClient {
            ca: ca.map(str::to_owned),
            client: client.clone(),
        });
        Ok(client)
    }

    fn build_client(&self, ca: Option<&str>) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(self.timeout)
            .timeout(self.timeout);
        if let Some(ca) = ca {
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(ca.as_bytes())?);
        }
        builder.build()
    }
}

impl fmt::Debug for HttpProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProbe")
            .field("scheme", &self.scheme)
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new(&ProbeConfig::default())
    }
}

#[async_trait]
impl HostProbe for HttpProbe {
    fn prepare(&self, tls: Option<&TlsMaterial>) -> Result<(), BootstrapError> {
        self.client(tls).map(drop)
    }

    async fn is_responding(&self, host: &str, tls: Option<&TlsMaterial>) -> bool {
        let client = match self.client(tls) {
            Ok(client) => client,
            Err(e) => {
                warn!(host, error = %e, "Failed to build probe HTTP client");
                return false;
            }
        };

        let url = format!("{}://{}:{}/", self.scheme, host, self.port);
        match client.get(&url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                debug!(host, status = %resp.status(), "DB host probe returned non-200");
                false
            }
            Err(e) => {
                debug!(host, error = %e, "Error occurred when requesting DB host");
                false
            }
        }
    }
}

/// Picks the endpoint to connect to.
///
/// A single endpoint is returned without probing. Candidates are probed strictly in
/// order and the first responder wins; after a pass with no responder the whole list
/// is retried after `backoff`, with no limit on the number of passes.
pub async fn select_endpoint(
    endpoints: &Endpoints,
    probe: &dyn HostProbe,
    tls: Option<&TlsMaterial>,
    timer: Arc<dyn Timer>,
    backoff: Duration,
) -> Result<Endpoint, BootstrapError> {
    let candidates = match endpoints {
        Endpoints::Single(endpoint) => {
            info!(host = %endpoint.host(), "Selected DB host");
            return Ok(endpoint.clone());
        }
        Endpoints::Candidates(candidates) => candidates,
    };

    probe.prepare(tls)?;

    info!("Selecting DB host...");
    let pass = || async move {
        find_responding(candidates, probe, tls)
            .await
            .ok_or(BootstrapError::NoRespondingHost)
    };

    let selection: Pin<Box<dyn Future<Output = Result<Endpoint, BootstrapError>> + Send + '_>> =
        Box::pin(
            pass.retry(
                ConstantBuilder::default()
                    .with_delay(backoff)
                    .without_max_times(),
            )
            .sleep(move |delay| {
                let timer = timer.clone();
                async move {
                    timer.sleep(delay).await;
                    info!("Retrying DB host selection...");
                }
            }),
        );
    let selected = selection.await?;

    info!(host = %selected.host(), "Selected DB host");
    Ok(selected)
}

async fn find_responding(
    candidates: &[Endpoint],
    probe: &dyn HostProbe,
    tls: Option<&TlsMaterial>,
) -> Option<Endpoint> {
    for (i, candidate) in candidates.iter().enumerate() {
        info!("Checking DB host {}: {}", i, candidate.host());
        if probe.is_responding(candidate.host(), tls).await {
            debug!(host = %candidate.host(), "DB host has responded");
            return Some(candidate.clone());
        }
        debug!(host = %candidate.host(), "DB host not responding");
    }
    None
}
