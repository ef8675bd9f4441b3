//! # Configuration Management
//!
//! Declarative description of a protocol: identity, opcode space, static
//! reservations, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Example
//! ```toml
//! name = "game"
//! default_port = 25565
//! max_opcode = 256
//! dynamic_allocation = "enabled"
//!
//! [[reservations]]
//! message_type = "ping"
//! opcode = 0
//! ```

use crate::error::{ProtocolError, Result};
use crate::registry::{DynamicPolicy, MessageType, Opcode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Default opcode space: a one-byte opcode.
pub const DEFAULT_MAX_OPCODE: u32 = 256;

/// Largest opcode space accepted by validation.
pub const MAX_OPCODE_LIMIT: u32 = 1 << 20;

/// Port used when nothing else is configured.
pub const DEFAULT_PORT: u16 = 9000;

/// Protocol definition loaded from configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolConfig {
    /// Protocol name, used in logs and metrics
    pub name: String,

    /// Port used by bind/connect helpers when none is given
    pub default_port: u16,

    /// One more than the largest opcode
    pub max_opcode: u32,

    /// Whether unreserved message types may receive opcodes on first use
    #[serde(default)]
    pub dynamic_allocation: DynamicPolicy,

    /// Static reservations, fixed per protocol version
    #[serde(default)]
    pub reservations: Vec<ReservationConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            name: String::from("protocol"),
            default_port: DEFAULT_PORT,
            max_opcode: DEFAULT_MAX_OPCODE,
            dynamic_allocation: DynamicPolicy::Enabled,
            reservations: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// One static `(message type, opcode)` reservation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReservationConfig {
    pub message_type: String,
    pub opcode: u32,
}

impl ReservationConfig {
    pub fn new(message_type: impl Into<String>, opcode: u32) -> Self {
        Self {
            message_type: message_type.into(),
            opcode,
        }
    }

    pub fn message_type(&self) -> MessageType {
        MessageType::new(self.message_type.clone())
    }

    pub fn opcode(&self) -> Opcode {
        Opcode::new(self.opcode)
    }
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("PROTOCOL_REGISTRY_NAME") {
            config.name = name;
        }

        if let Ok(port) = std::env::var("PROTOCOL_REGISTRY_DEFAULT_PORT") {
            config.default_port = port.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PROTOCOL_REGISTRY_DEFAULT_PORT: {e}"))
            })?;
        }

        if let Ok(max) = std::env::var("PROTOCOL_REGISTRY_MAX_OPCODE") {
            config.max_opcode = max.parse::<u32>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PROTOCOL_REGISTRY_MAX_OPCODE: {e}"))
            })?;
        }

        if let Ok(dynamic) = std::env::var("PROTOCOL_REGISTRY_DYNAMIC") {
            config.dynamic_allocation = match dynamic.to_ascii_lowercase().as_str() {
                "enabled" | "true" | "1" => DynamicPolicy::Enabled,
                "disabled" | "false" | "0" => DynamicPolicy::Disabled,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid PROTOCOL_REGISTRY_DYNAMIC: {other}"
                    )))
                }
            };
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
        let example = Self::default_with_overrides(|config| {
            config.reservations = vec![
                ReservationConfig::new("ping", 0),
                ReservationConfig::new("pong", 1),
            ];
        });
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push("Protocol name cannot be empty".to_string());
        }

        if self.default_port == 0 {
            errors.push("Default port must be greater than 0".to_string());
        }

        if self.max_opcode == 0 {
            errors.push("Max opcode must be greater than 0".to_string());
        } else if self.max_opcode > MAX_OPCODE_LIMIT {
            errors.push(format!(
                "Max opcode too large: {} (maximum: {MAX_OPCODE_LIMIT})",
                self.max_opcode
            ));
        }

        let mut seen_types = HashSet::new();
        let mut seen_opcodes = HashSet::new();
        for reservation in &self.reservations {
            if reservation.message_type.is_empty() {
                errors.push(format!(
                    "Reservation for opcode {} has an empty message type",
                    reservation.opcode
                ));
            }
            if reservation.opcode >= self.max_opcode {
                errors.push(format!(
                    "Reservation '{}' uses opcode {} outside [0, {})",
                    reservation.message_type, reservation.opcode, self.max_opcode
                ));
            }
            if !seen_types.insert(reservation.message_type.as_str()) {
                errors.push(format!(
                    "Message type '{}' is reserved more than once",
                    reservation.message_type
                ));
            }
            if !seen_opcodes.insert(reservation.opcode) {
                errors.push(format!(
                    "Opcode {} is reserved more than once",
                    reservation.opcode
                ));
            }
        }

        if self.dynamic_allocation == DynamicPolicy::Enabled
            && self.reservations.len() as u64 >= u64::from(self.max_opcode)
            && self.max_opcode > 0
        {
            errors.push(
                "WARNING: Static reservations fill the opcode space - dynamic allocation will always fail"
                    .to_string(),
            );
        }

        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
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

    /// Whether to log to file instead of the console
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("protocol-registry"),
            log_level: Level::INFO,
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

        errors
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
