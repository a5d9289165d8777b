// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the vault database file | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JOURNAL_SECRET` | Service-wide encryption secret (min 32 bytes) | Required |
//! | `JOURNAL_KDF_ITERATIONS` | PBKDF2 work factor | `100000` |
//! | `WELCOME_CREDITS` | Credits granted at signup | `5` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! The secret check is a hard startup precondition: without a sufficiently
//! long `JOURNAL_SECRET` the process refuses to boot rather than degrade.

use std::env;
use std::path::PathBuf;

use crate::crypto::DEFAULT_KDF_ITERATIONS;

pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const SECRET_ENV: &str = "JOURNAL_SECRET";
pub const KDF_ITERATIONS_ENV: &str = "JOURNAL_KDF_ITERATIONS";
pub const WELCOME_CREDITS_ENV: &str = "WELCOME_CREDITS";

/// Minimum length of the service secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Name of the database file under `DATA_DIR`.
pub const DATABASE_FILE: &str = "journal-vault.redb";

const DEFAULT_WELCOME_CREDITS: i64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{SECRET_ENV} is not set")]
    MissingSecret,

    #[error("{SECRET_ENV} is too short: {len} bytes, minimum {MIN_SECRET_LEN}")]
    SecretTooShort { len: usize },

    #[error("invalid value for {variable}")]
    InvalidValue { variable: &'static str },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub secret: String,
    pub kdf_iterations: u32,
    pub welcome_credits: i64,
}

impl Config {
    /// Load configuration from the environment, failing fast on a missing
    /// or undersized service secret.
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = env::var(SECRET_ENV).map_err(|_| ConfigError::MissingSecret)?;
        validate_secret(&secret)?;

        let data_dir = env::var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/data"));
        let host = env::var(HOST_ENV).unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_or_default(PORT_ENV, 8080)?;
        let kdf_iterations = parse_or_default(KDF_ITERATIONS_ENV, DEFAULT_KDF_ITERATIONS)?;
        let welcome_credits = parse_or_default(WELCOME_CREDITS_ENV, DEFAULT_WELCOME_CREDITS)?;

        Ok(Self {
            data_dir,
            host,
            port,
            secret,
            kdf_iterations,
            welcome_credits,
        })
    }

    /// Path of the redb database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn validate_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::SecretTooShort { len: secret.len() });
    }
    Ok(())
}

fn parse_or_default<T: std::str::FromStr>(
    variable: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue { variable }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // from_env reads process-wide state, so tests stick to the pure helpers.

    #[test]
    fn secret_length_is_enforced() {
        let short = "x".repeat(MIN_SECRET_LEN - 1);
        assert!(matches!(
            validate_secret(&short),
            Err(ConfigError::SecretTooShort { len }) if len == MIN_SECRET_LEN - 1
        ));
        assert!(validate_secret(&"x".repeat(MIN_SECRET_LEN)).is_ok());
    }

    #[test]
    fn database_path_appends_file_name() {
        let config = Config {
            data_dir: PathBuf::from("/tmp/vault"),
            host: "127.0.0.1".into(),
            port: 8080,
            secret: "x".repeat(MIN_SECRET_LEN),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            welcome_credits: 5,
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/vault/journal-vault.redb")
        );
    }
}
