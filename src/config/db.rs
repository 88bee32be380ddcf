use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{path::PathBuf, time::Duration};

use crate::db::{Endpoint, Endpoints};
use crate::error::BootstrapError;

/// Database bootstrap configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    /// One URL (used as-is) or an ordered list of candidate URLs (probed in order).
    /// TOML: `db.url`. Default: empty, which `init` rejects.
    #[serde(default)]
    pub url: DbUrl,

    /// Driver options, including TLS material paths.
    /// TOML: `db.options`.
    #[serde(default)]
    pub options: DbOptions,

    /// Fixed wait between host-selection passes and before a restart reconnects.
    /// TOML: `db.backoff_ms`. Default: `1000`.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Management-port health probe used for host selection.
    /// TOML: `db.probe`.
    #[serde(default)]
    pub probe: ProbeConfig,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: DbUrl::default(),
            options: DbOptions::default(),
            backoff_ms: default_backoff_ms(),
            probe: ProbeConfig::default(),
        }
    }
}

impl DbConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Raw `db.url` value. Shapes other than a string or a list of strings land in
/// `Other` so the bootstrapper can reject them with a configuration error.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DbUrl {
    Single(String),
    Candidates(Vec<String>),
    Other(Value),
}

impl Default for DbUrl {
    fn default() -> Self {
        DbUrl::Single(String::new())
    }
}

impl From<&str> for DbUrl {
    fn from(url: &str) -> Self {
        DbUrl::Single(url.to_string())
    }
}

impl From<Vec<String>> for DbUrl {
    fn from(urls: Vec<String>) -> Self {
        DbUrl::Candidates(urls)
    }
}

impl DbUrl {
    /// Validates the shape and parses every URL.
    pub fn endpoints(&self) -> Result<Endpoints, BootstrapError> {
        match self {
            DbUrl::Single(url) if !url.is_empty() => Ok(Endpoints::Single(Endpoint::parse(url)?)),
            DbUrl::Candidates(urls) if !urls.is_empty() => {
                let endpoints = urls
                    .iter()
                    .map(|u| Endpoint::parse(u))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Endpoints::Candidates(endpoints))
            }
            _ => Err(BootstrapError::InvalidUrl),
        }
    }
}

/// Connection options handed to the driver.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbOptions {
    /// TLS material paths; resolved into memory once per connect cycle.
    /// TOML: `db.options.ssl`.
    #[serde(default)]
    pub ssl: Option<SslPaths>,

    /// Pool size.
    /// TOML: `db.options.max_connections`. Default: `5`.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Time to wait for a pooled connection.
    /// TOML: `db.options.acquire_timeout_secs`. Default: `30`.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Optional `application_name` reported to the server.
    /// TOML: `db.options.application_name`.
    #[serde(default)]
    pub application_name: Option<String>,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            ssl: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            application_name: None,
        }
    }
}

/// Filesystem paths of the TLS material. If `cert` is set, `key` must be too.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SslPaths {
    pub ca: PathBuf,
    #[serde(default)]
    pub cert: Option<PathBuf>,
    #[serde(default)]
    pub key: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    /// TOML: `db.probe.port`. Default: `8008`.
    #[serde(default = "default_probe_port")]
    pub port: u16,

    /// TOML: `db.probe.scheme`. Default: `https`.
    #[serde(default = "default_probe_scheme")]
    pub scheme: String,

    /// TOML: `db.probe.timeout_secs`. Default: `5`.
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: default_probe_port(),
            scheme: default_probe_scheme(),
            timeout_secs: default_probe_timeout_secs(),
        }
    }
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_probe_port() -> u16 {
    8008
}

fn default_probe_scheme() -> String {
    "https".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_shapes_are_rejected() {
        for url in [
            DbUrl::Single(String::new()),
            DbUrl::Candidates(Vec::new()),
            DbUrl::Other(json!(42)),
            DbUrl::Other(json!({"host": "db"})),
            DbUrl::Other(json!([1, 2])),
        ] {
            let err = url.endpoints().expect_err("shape must be rejected");
            assert!(matches!(err, BootstrapError::InvalidUrl), "{url:?}");
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn single_url_is_not_a_candidate_list() {
        let endpoints = DbUrl::from("postgres://db1:5432/app").endpoints().unwrap();
        match endpoints {
            Endpoints::Single(ep) => assert_eq!(ep.host(), "db1"),
            Endpoints::Candidates(_) => panic!("single url must not be probed"),
        }
    }

    #[test]
    fn candidate_order_is_preserved() {
        let endpoints = DbUrl::from(vec![
            "postgres://b/app".to_string(),
            "postgres://a/app".to_string(),
        ])
        .endpoints()
        .unwrap();
        let Endpoints::Candidates(list) = endpoints else {
            panic!("expected candidates");
        };
        let hosts: Vec<&str> = list.iter().map(Endpoint::host).collect();
        assert_eq!(hosts, vec!["b", "a"]);
    }

    #[test]
    fn unparsable_url_is_a_configuration_error() {
        let err = DbUrl::from("not a url").endpoints().unwrap_err();
        assert!(matches!(err, BootstrapError::UrlParse { .. }));
        assert!(err.is_configuration());
    }
}
