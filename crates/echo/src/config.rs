//! Configuration for the echo server and client
//!
//! Defaults mirror the echo interop contract: HTTP on `0.0.0.0:8080`,
//! offers posted to `/offer`, a ten second connection deadline, and Google's
//! public STUN server.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default URL a client posts its offer to
pub const DEFAULT_ECHO_SERVER_URL: &str = "http://localhost:8080/offer";

/// Default STUN server used for candidate gathering
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

/// Top-level configuration shared by both roles
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EchoConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client connection attempt configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// ICE servers handed to the media engine
    #[serde(default)]
    pub ice: IceConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for any path other than the signaling endpoints
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// TLS certificate file; HTTPS is enabled when both this and `key_file`
    /// are set
    #[serde(default)]
    pub cert_file: Option<PathBuf>,

    /// TLS private key file
    #[serde(default)]
    pub key_file: Option<PathBuf>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> String {
    "./html".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            cert_file: None,
            key_file: None,
        }
    }
}

impl ServerConfig {
    /// Address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when a complete TLS pair is configured
    pub fn tls_enabled(&self) -> bool {
        self.cert_file.is_some() && self.key_file.is_some()
    }
}

/// Client connection attempt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// URL the offer is posted to
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Wall-clock deadline for the whole attempt, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_server_url() -> String {
    DEFAULT_ECHO_SERVER_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// ICE servers handed to the media engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceConfig {
    /// STUN server URLs; may be empty for loopback-only setups
    #[serde(default = "default_stun_servers")]
    pub stun_servers: Vec<String>,
}

fn default_stun_servers() -> Vec<String> {
    vec![DEFAULT_STUN_SERVER.to_string()]
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_servers: default_stun_servers(),
        }
    }
}

impl EchoConfig {
    /// Validate the configuration, returning the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(Error::InvalidConfig("server host must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(Error::InvalidConfig("server port must not be 0".into()));
        }
        if self.server.cert_file.is_some() != self.server.key_file.is_some() {
            return Err(Error::InvalidConfig(
                "TLS requires both cert-file and key-file".into(),
            ));
        }
        if self.client.server_url.is_empty() {
            return Err(Error::InvalidConfig("server URL must not be empty".into()));
        }
        if self.client.connect_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "connection timeout must be at least 1 second".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EchoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.client.server_url, DEFAULT_ECHO_SERVER_URL);
        assert_eq!(config.client.connect_timeout_secs, 10);
        assert_eq!(config.ice.stun_servers, vec![DEFAULT_STUN_SERVER]);
        assert!(!config.server.tls_enabled());
    }

    #[test]
    fn half_configured_tls_is_rejected() {
        let mut config = EchoConfig::default();
        config.server.cert_file = Some(PathBuf::from("cert.pem"));
        assert!(config.validate().is_err());

        config.server.key_file = Some(PathBuf::from("key.pem"));
        assert!(config.validate().is_ok());
        assert!(config.server.tls_enabled());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = EchoConfig::default();
        config.client.connect_timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
