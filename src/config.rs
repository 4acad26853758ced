//! This module holds the configuration for the server

use std::net::IpAddr;

use actix_toolbox::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Configuration regarding the server
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ServerConfig {
    /// The address the server should bind to
    pub listen_address: IpAddr,
    /// The port the server should bind to
    pub listen_port: u16,
    /// Base64 encoded key of at least 64 bytes, used to sign the session cookies
    pub secret_key: String,
    /// The token that grants access to the admin endpoints
    pub admin_token: String,
}

/// Configuration regarding the database
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct DBConfig {
    /// The address of the database server
    pub host: String,
    /// The port of the database server
    pub port: u16,
    /// The database name
    pub name: String,
    /// The user to use for the database connection
    pub user: String,
    /// Password for the user
    pub password: String,
}

/// Configuration regarding the account cache
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct CacheConfig {
    /// Seconds an account is served from the cache before it is read again
    pub account_ttl: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { account_ttl: 900 }
    }
}

/// This struct can be parsed from the configuration file
#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Configuration regarding the server
    pub server: ServerConfig,
    /// Configuration regarding the database
    pub database: DBConfig,
    /// Configuration regarding the account cache
    #[serde(default)]
    pub cache: CacheConfig,
    /// The logging configuration
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_section_is_optional() {
        let config: CacheConfig = toml::from_str("AccountTtl = 60").unwrap();
        assert_eq!(config.account_ttl, 60);
        assert_eq!(CacheConfig::default().account_ttl, 900);
    }

    #[test]
    fn server_section() {
        let config: ServerConfig = toml::from_str(
            r#"
            ListenAddress = "127.0.0.1"
            ListenPort = 8080
            SecretKey = "c2VjcmV0"
            AdminToken = "admin"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.admin_token, "admin");
    }
}
