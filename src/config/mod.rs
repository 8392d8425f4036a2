/// Configuration management for the process manager
///
/// Handles server binding, the SQLite database location, and the notification
/// channel size. Every value can be overridden through environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Approval notification relay
    pub notifications: NotificationConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// SQLite database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the database file (default: "data")
    pub data_dir: String,
    /// Database file name inside `data_dir` (default: "process_manager.db")
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Events buffered per subscriber before slow subscribers start lagging
    pub channel_capacity: usize,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("PROCESS_MANAGER_HOST", "0.0.0.0"),
                port: env_or("PROCESS_MANAGER_PORT", "5001").parse().unwrap_or(5001),
            },
            database: DatabaseConfig {
                data_dir: env_or("PROCESS_MANAGER_DATA_DIR", "data"),
                file_name: env_or("PROCESS_MANAGER_DB_FILE", "process_manager.db"),
            },
            notifications: NotificationConfig {
                channel_capacity: env_or("PROCESS_MANAGER_NOTIFY_CAPACITY", "256")
                    .parse()
                    .unwrap_or(256),
            },
        }
    }
}

impl Config {
    /// `host:port` string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
