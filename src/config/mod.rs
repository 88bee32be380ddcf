mod basic;
mod db;

pub use basic::LoggingConfig;
pub use db::{DbConfig, DbOptions, DbUrl, ProbeConfig, SslPaths};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Logging sinks and level (see `logging` table in dbstrap.toml).
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Database endpoints and connection options (see `db` table in dbstrap.toml).
    #[serde(default)]
    pub db: DbConfig,
}

const DEFAULT_CONFIG_FILE: &str = "dbstrap.toml";
const ENV_PREFIX: &str = "DBSTRAP_";

impl Config {
    /// Builds a Figment that merges defaults, `dbstrap.toml` if present, and
    /// `DBSTRAP_`-prefixed environment variables (`__` separates nested keys).
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extracts the merged configuration.
    ///
    /// Shape checks on `db.url` are deferred to `DbModule::init`, which reports them
    /// as a configuration error before any network activity.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment().extract().map_err(Box::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::{Format, Toml};

    fn from_toml(toml: &str) -> Config {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string(toml))
            .extract()
            .expect("valid config")
    }

    #[test]
    fn defaults_apply_when_tables_are_missing() {
        let cfg = from_toml("");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.db.backoff_ms, 1000);
        assert_eq!(cfg.db.probe.port, 8008);
        assert_eq!(cfg.db.probe.scheme, "https");
        assert!(matches!(cfg.db.url, DbUrl::Single(ref s) if s.is_empty()));
    }

    #[test]
    fn url_accepts_string_or_list() {
        let single = from_toml(r#"db.url = "postgres://db1/app""#);
        assert!(matches!(single.db.url, DbUrl::Single(ref s) if s == "postgres://db1/app"));

        let list = from_toml(r#"db.url = ["postgres://a/app", "postgres://b/app"]"#);
        match list.db.url {
            DbUrl::Candidates(urls) => assert_eq!(urls.len(), 2),
            other => panic!("expected candidates, got {other:?}"),
        }
    }

    #[test]
    fn url_of_unexpected_shape_is_kept_for_init_to_reject() {
        let cfg = from_toml("db.url = 42");
        assert!(matches!(cfg.db.url, DbUrl::Other(_)));
    }

    #[test]
    fn ssl_paths_are_read_from_options_table() {
        let cfg = from_toml(
            r#"
            [db.options.ssl]
            ca = "/etc/ssl/ca.pem"
            cert = "/etc/ssl/client.pem"
            key = "/etc/ssl/client.key"
            "#,
        );
        let ssl = cfg.db.options.ssl.expect("ssl table");
        assert_eq!(ssl.ca, PathBuf::from("/etc/ssl/ca.pem"));
        assert_eq!(ssl.cert, Some(PathBuf::from("/etc/ssl/client.pem")));
        assert_eq!(ssl.key, Some(PathBuf::from("/etc/ssl/client.key")));
    }
}
