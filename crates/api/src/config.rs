//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use anyhow::{Context, Result};

use siteledger_infra::services::DEFAULT_CAS_RETRIES;
use siteledger_observability::LogFormat;

pub const HTTP_ADDR_VAR: &str = "SITELEDGER_HTTP_ADDR";
pub const CAS_RETRIES_VAR: &str = "SITELEDGER_CAS_RETRIES";
pub const LOG_FORMAT_VAR: &str = "SITELEDGER_LOG_FORMAT";
/// Selects the Postgres stores when set; the in-memory stores otherwise.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const DB_MAX_CONNECTIONS_VAR: &str = "SITELEDGER_DB_MAX_CONNECTIONS";

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub cas_retries: u32,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cas_retries: DEFAULT_CAS_RETRIES,
            log_format: LogFormat::default(),
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let http_addr = lookup(HTTP_ADDR_VAR)
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string())
            .parse::<SocketAddr>()
            .with_context(|| format!("{HTTP_ADDR_VAR} must be a socket address"))?;

        let cas_retries = match lookup(CAS_RETRIES_VAR) {
            Some(raw) => {
                let n = raw
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("{CAS_RETRIES_VAR} must be a positive integer"))?;
                anyhow::ensure!(n > 0, "{CAS_RETRIES_VAR} must be at least 1");
                n
            }
            None => DEFAULT_CAS_RETRIES,
        };

        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw
                .parse::<LogFormat>()
                .map_err(|e| anyhow::anyhow!("invalid {LOG_FORMAT_VAR}: {e}"))?,
            None => LogFormat::default(),
        };

        let database_url = lookup(DATABASE_URL_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|url| !url.is_empty());

        let db_max_connections = match lookup(DB_MAX_CONNECTIONS_VAR) {
            Some(raw) => {
                let n = raw.trim().parse::<u32>().with_context(|| {
                    format!("{DB_MAX_CONNECTIONS_VAR} must be a positive integer")
                })?;
                anyhow::ensure!(n > 0, "{DB_MAX_CONNECTIONS_VAR} must be at least 1");
                n
            }
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        Ok(Self {
            http_addr,
            cas_retries,
            log_format,
            database_url,
            db_max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let cfg = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.http_addr.port(), 8080);
        assert_eq!(cfg.cas_retries, 5);
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn reads_overrides() {
        let cfg = AppConfig::from_lookup(lookup(&[
            (HTTP_ADDR_VAR, "127.0.0.1:9000"),
            (CAS_RETRIES_VAR, "12"),
            (LOG_FORMAT_VAR, "pretty"),
        ]))
        .unwrap();
        assert_eq!(cfg.http_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.cas_retries, 12);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn database_url_selects_postgres() {
        let cfg = AppConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, " postgres://siteledger@db/siteledger "),
            (DB_MAX_CONNECTIONS_VAR, "4"),
        ]))
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://siteledger@db/siteledger"));
        assert_eq!(cfg.db_max_connections, 4);

        // Blank counts as unset.
        let cfg = AppConfig::from_lookup(lookup(&[(DATABASE_URL_VAR, "  ")])).unwrap();
        assert_eq!(cfg.database_url, None);

        assert!(AppConfig::from_lookup(lookup(&[(DB_MAX_CONNECTIONS_VAR, "0")])).is_err());
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(AppConfig::from_lookup(lookup(&[(HTTP_ADDR_VAR, "nowhere")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(CAS_RETRIES_VAR, "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(CAS_RETRIES_VAR, "-3")])).is_err());

        let err = AppConfig::from_lookup(lookup(&[(LOG_FORMAT_VAR, "xml")])).unwrap_err();
        assert!(format!("{err:#}").contains(LOG_FORMAT_VAR));
    }
}
