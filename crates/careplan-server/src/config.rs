//! Configuration for the care plan server
//!
//! Values come from environment variables layered over defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use tracing::{info, warn};

use careplan_content_store::StorageProvider;
use careplan_monitoring::LogFormat;

use crate::error::{ServerError, ServerResult};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub bind_address: String,

    /// `memory://`, `postgres://..` or `sqlite:..`
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Pool size for SQL stores
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    /// Attachment backend
    #[serde(default)]
    pub storage_provider: StorageProvider,

    /// Root directory of the filesystem attachment backend
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_database_url() -> String {
    "memory://".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_upload_dir() -> String {
    "public/uploads".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_host(),
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            storage_provider: StorageProvider::default(),
            upload_dir: default_upload_dir(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn load() -> ServerResult<Self> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let mut config = Self::default();

        if let Some(port) = lookup("SERVER_PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!("Invalid SERVER_PORT value: {}", port),
            }
        }

        if let Some(host) = lookup("SERVER_HOST") {
            config.bind_address = host;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = url;
        }

        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(max) if max > 0 => config.database_max_connections = max,
                _ => warn!("Invalid DATABASE_MAX_CONNECTIONS value: {}", max),
            }
        }

        if let Some(provider) = lookup("STORAGE_PROVIDER") {
            config.storage_provider = provider.parse().map_err(|_| {
                ServerError::ConfigurationError(format!("Unknown STORAGE_PROVIDER: {}", provider))
            })?;
        }

        if let Some(dir) = lookup("UPLOAD_DIR") {
            config.upload_dir = dir;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(format) = lookup("LOG_FORMAT") {
            match LogFormat::parse(&format) {
                Some(format) => config.log_format = format,
                None => warn!("Invalid LOG_FORMAT value: {}", format),
            }
        }

        info!(
            port = config.port,
            storage_provider = ?config.storage_provider,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Address to bind the listener to
    pub fn socket_addr(&self) -> ServerResult<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| {
                ServerError::ConfigurationError(format!(
                    "Invalid bind address {}:{}: {}",
                    self.bind_address, self.port, e
                ))
            })
    }
}
