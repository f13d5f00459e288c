// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`Config`] loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Base directory that document paths resolve against | `/data` |
//! | `DOCUMENT_DB_PATH` | redb record store file | `{DATA_DIR}/records.redb` |
//! | `ARCHIVE_MASTER_KEY` | 256-bit master key as 64 hex characters | Required |
//! | `ARCHIVE_DECRYPT_ROLLBACK` | Keep ciphertext backups during un-archive until committed | `false` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::archive::MasterKey;
use crate::storage::paths::{DATA_ROOT, RECORDS_DB_FILE};

/// Environment variable name for the data directory path.
///
/// Every logical document path is resolved inside this directory and may
/// not escape it.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the redb record store file.
pub const DOCUMENT_DB_PATH_ENV: &str = "DOCUMENT_DB_PATH";

/// Environment variable name for the archive master key (64 hex characters).
///
/// The value is never logged.
pub const MASTER_KEY_ENV: &str = "ARCHIVE_MASTER_KEY";

/// Environment variable toggling ciphertext backup retention on un-archive.
pub const DECRYPT_ROLLBACK_ENV: &str = "ARCHIVE_DECRYPT_ROLLBACK";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// Fatal startup configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("invalid master key: {0}")]
    InvalidMasterKey(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read the format from the environment. Unknown values fall back to pretty.
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Process configuration, loaded once at startup.
pub struct Config {
    pub data_dir: PathBuf,
    pub document_db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub decrypt_rollback: bool,
    pub master_key: MasterKey,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("document_db_path", &self.document_db_path)
            .field("bind_addr", &self.bind_addr)
            .field("decrypt_rollback", &self.decrypt_rollback)
            .field("master_key", &self.master_key)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// The master key is validated here, before anything else is started.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let master_key_hex = lookup(MASTER_KEY_ENV).ok_or(ConfigError::Missing(MASTER_KEY_ENV))?;
        let master_key = MasterKey::from_hex(&master_key_hex)?;

        let data_dir = PathBuf::from(lookup(DATA_DIR_ENV).unwrap_or_else(|| DATA_ROOT.to_string()));
        let document_db_path = lookup(DOCUMENT_DB_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(RECORDS_DB_FILE));

        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                var: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidValue {
                    var: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let decrypt_rollback = match lookup(DECRYPT_ROLLBACK_ENV) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: DECRYPT_ROLLBACK_ENV,
                reason: format!("expected true or false, got {raw:?}"),
            })?,
            None => false,
        };

        Ok(Self {
            data_dir,
            document_db_path,
            bind_addr,
            decrypt_rollback,
            master_key,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY_64: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_master_key_is_fatal() {
        let result = Config::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::Missing(MASTER_KEY_ENV))));
    }

    #[test]
    fn master_key_of_63_hex_chars_is_rejected() {
        let short = &KEY_64[..63];
        let result = Config::from_lookup(lookup_from(&[(MASTER_KEY_ENV, short)]));
        assert!(matches!(result, Err(ConfigError::InvalidMasterKey(_))));
    }

    #[test]
    fn master_key_of_64_hex_chars_is_accepted() {
        let config = Config::from_lookup(lookup_from(&[(MASTER_KEY_ENV, KEY_64)])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.document_db_path, PathBuf::from("/data/records.redb"));
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert!(!config.decrypt_rollback);
    }

    #[test]
    fn non_hex_master_key_is_rejected() {
        let bad = "zz".repeat(32);
        let result = Config::from_lookup(lookup_from(&[(MASTER_KEY_ENV, &bad)]));
        assert!(matches!(result, Err(ConfigError::InvalidMasterKey(_))));
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            (MASTER_KEY_ENV, KEY_64),
            (DATA_DIR_ENV, "/srv/records"),
            (PORT_ENV, "9443"),
            (HOST_ENV, "127.0.0.1"),
            (DECRYPT_ROLLBACK_ENV, "true"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/records"));
        assert_eq!(
            config.document_db_path,
            PathBuf::from("/srv/records/records.redb")
        );
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9443");
        assert!(config.decrypt_rollback);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let result = Config::from_lookup(lookup_from(&[(MASTER_KEY_ENV, KEY_64), (PORT_ENV, "http")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { var: PORT_ENV, .. })
        ));
    }

    #[test]
    fn debug_output_redacts_master_key() {
        let config = Config::from_lookup(lookup_from(&[(MASTER_KEY_ENV, KEY_64)])).unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(KEY_64));
        assert!(rendered.contains("REDACTED"));
    }
}
