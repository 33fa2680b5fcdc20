//! # Configuration Management
//!
//! Configuration for a routing process and its reliable transport.
//!
//! This module provides structured configuration for the routing process,
//! its EIGRP-enabled interfaces, the retransmission policy and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! ## Authentication
//! Keyed MD5 is active on an interface only when its mode is `md5` *and* a key
//! is configured. A mode without a key behaves like no authentication.

use crate::core::packet::{AuthKey, IP_HEADER_LEN};
use crate::core::header::HEADER_LEN;
use crate::core::tlv::{AUTH_MD5_TLV_LEN, IPV4_INTERNAL_MAX_LEN};
use crate::error::{Result, RtpError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default retransmission interval
pub const DEFAULT_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(5000);

/// Default number of transmissions before a neighbor is declared dead
pub const DEFAULT_MAX_RETRANSMISSIONS: u32 = 16;

/// Default interface MTU
pub const DEFAULT_MTU: u32 = 1500;

/// Smallest MTU that still fits a header, an auth TLV and one route TLV
pub const MIN_MTU: u32 = (IP_HEADER_LEN + HEADER_LEN + AUTH_MD5_TLV_LEN + IPV4_INTERNAL_MAX_LEN) as u32;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RtpConfig {
    /// Routing process configuration
    #[serde(default)]
    pub process: ProcessConfig,

    /// EIGRP-enabled interfaces
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,

    /// Retransmission policy
    #[serde(default)]
    pub reliable: ReliableConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RtpConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| RtpError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RtpError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| RtpError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(asn) = std::env::var("EIGRP_RTP_ASN") {
            config.process.asn = asn
                .parse::<u16>()
                .map_err(|e| RtpError::ConfigError(format!("Invalid EIGRP_RTP_ASN: {e}")))?;
        }

        if let Ok(router_id) = std::env::var("EIGRP_RTP_ROUTER_ID") {
            config.process.router_id = router_id
                .parse::<Ipv4Addr>()
                .map_err(|e| RtpError::ConfigError(format!("Invalid EIGRP_RTP_ROUTER_ID: {e}")))?;
        }

        if let Ok(interval) = std::env::var("EIGRP_RTP_RETRANSMIT_INTERVAL_MS") {
            if let Ok(val) = interval.parse::<u64>() {
                config.reliable.retransmit_interval = Duration::from_millis(val);
            }
        }

        if let Ok(max) = std::env::var("EIGRP_RTP_MAX_RETRANSMISSIONS") {
            if let Ok(val) = max.parse::<u32>() {
                config.reliable.max_retransmissions = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        let example = Self::default_with_overrides(|c| {
            c.interfaces.push(InterfaceConfig::default());
        });
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RtpError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| RtpError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        errors.extend(self.process.validate());

        let mut seen = HashSet::new();
        for iface in &self.interfaces {
            if !seen.insert(iface.ifindex) {
                errors.push(format!("Duplicate interface index: {}", iface.ifindex));
            }
            errors.extend(iface.validate());
        }

        errors.extend(self.reliable.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RtpError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Routing process configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessConfig {
    /// Autonomous system number
    pub asn: u16,

    /// Router identifier
    pub router_id: Ipv4Addr,

    /// First sequence number assigned to an outbound packet
    pub initial_sequence: u32,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            asn: 1,
            router_id: Ipv4Addr::new(10, 0, 0, 1),
            initial_sequence: 1,
        }
    }
}

impl ProcessConfig {
    /// Validate process configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.asn == 0 {
            errors.push("Autonomous system number must be greater than 0".to_string());
        }

        if self.router_id.is_unspecified() {
            errors.push("Router ID cannot be 0.0.0.0".to_string());
        } else if self.router_id.is_multicast() || self.router_id.is_broadcast() {
            errors.push(format!(
                "Router ID must be a unicast address, got {}",
                self.router_id
            ));
        }

        // Sequence 0 marks an unreliable packet on the wire
        if self.initial_sequence == 0 {
            errors.push("Initial sequence number must be greater than 0".to_string());
        }

        errors
    }
}

/// Interface authentication mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    None,
    Md5,
}

/// Interface authentication settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Authentication mode
    #[serde(default)]
    pub mode: AuthMode,

    /// Key identifier advertised in the authentication TLV
    #[serde(default)]
    pub key_id: u32,

    /// Shared secret; only the first 16 bytes are used
    #[serde(default)]
    pub key: Option<String>,
}

impl AuthConfig {
    /// The active key, if keyed MD5 is configured
    pub fn key(&self) -> Option<AuthKey> {
        match (self.mode, &self.key) {
            (AuthMode::Md5, Some(key)) => Some(AuthKey::new(self.key_id, key.as_bytes())),
            _ => None,
        }
    }
}

/// EIGRP-enabled interface configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterfaceConfig {
    /// Interface index
    pub ifindex: u32,

    /// Interface name (e.g., "eth0")
    pub name: String,

    /// Physical MTU
    pub mtu: u32,

    /// Authentication settings
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            ifindex: 1,
            name: String::from("eth0"),
            mtu: DEFAULT_MTU,
            auth: AuthConfig::default(),
        }
    }
}

impl InterfaceConfig {
    /// Validate interface configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push(format!("Interface {} name cannot be empty", self.ifindex));
        }

        if self.mtu < MIN_MTU {
            errors.push(format!(
                "Interface {} MTU too small: {} (minimum: {MIN_MTU})",
                self.name, self.mtu
            ));
        } else if self.mtu > 65_535 {
            errors.push(format!(
                "Interface {} MTU too large: {} (maximum: 65535)",
                self.name, self.mtu
            ));
        }

        if self.auth.mode == AuthMode::Md5 {
            match &self.auth.key {
                None => errors.push(format!(
                    "WARNING: Interface {} has md5 authentication without a key - authentication disabled",
                    self.name
                )),
                Some(key) if key.is_empty() => {
                    errors.push(format!("Interface {} md5 key cannot be empty", self.name))
                }
                Some(key) if key.len() > 16 => errors.push(format!(
                    "Interface {} md5 key longer than 16 bytes will be truncated",
                    self.name
                )),
                Some(_) => {}
            }
        }

        errors
    }
}

/// Retransmission policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReliableConfig {
    /// Time to wait for an acknowledgement before resending
    #[serde(with = "duration_serde")]
    pub retransmit_interval: Duration,

    /// Transmissions of one packet before the neighbor is declared dead
    pub max_retransmissions: u32,
}

impl Default for ReliableConfig {
    fn default() -> Self {
        Self {
            retransmit_interval: DEFAULT_RETRANSMIT_INTERVAL,
            max_retransmissions: DEFAULT_MAX_RETRANSMISSIONS,
        }
    }
}

impl ReliableConfig {
    /// Validate retransmission policy
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.retransmit_interval.as_millis() < 100 {
            errors.push("Retransmit interval too short (minimum: 100ms)".to_string());
        } else if self.retransmit_interval.as_secs() > 60 {
            errors.push("Retransmit interval too long (maximum: 60s)".to_string());
        }

        if self.max_retransmissions == 0 {
            errors.push("Max retransmissions must be greater than 0".to_string());
        } else if self.max_retransmissions > 64 {
            errors.push(format!(
                "Max retransmissions too large: {} (maximum: 64)",
                self.max_retransmissions
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("eigrp-rtp"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
