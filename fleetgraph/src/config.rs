//! Fleet configuration: the device roster and runtime settings.
//!
//! Loaded from a TOML file, then selectively overridden from the
//! environment:
//!
//! ```toml
//! output_path = "./static/topology.json"
//! poll_interval_secs = 60
//!
//! [[devices]]
//! address = "10.105.254.161"
//! port = 2024
//! username = "admin"
//! password = "secret"
//! timeout_secs = 30
//! terminal_width = 511
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use regex::bytes::Regex;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "FLEETGRAPH_CONFIG";
/// Environment variable overriding [`FleetConfig::output_path`].
pub const OUTPUT_PATH_ENV: &str = "TOPOLOGY_JSON_PATH";
/// Environment variable overriding [`FleetConfig::poll_interval_secs`].
pub const POLL_INTERVAL_ENV: &str = "POLL_INTERVAL";

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and learn unknown keys, reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. For lab use only.
    Disabled,
}

/// Authentication method resolved from a descriptor.
#[derive(Debug)]
pub enum AuthMethod<'a> {
    /// No credentials configured.
    None,

    /// Password authentication.
    Password(&'a SecretString),

    /// Private key authentication.
    PrivateKey {
        path: &'a Path,
        passphrase: Option<&'a SecretString>,
    },
}

/// Connection parameters for one device.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceDescriptor {
    /// Management address (hostname or IP).
    pub address: String,

    /// SSH port (default: 22).
    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,

    /// Private key; takes precedence over `password` when both are set.
    #[serde(default)]
    pub key_path: Option<PathBuf>,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub key_passphrase: Option<SecretString>,

    /// Command and read timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect/handshake timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub banner_timeout_secs: u64,

    #[serde(default)]
    pub host_key_verification: HostKeyVerification,

    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,

    /// PTY columns; wide enough that peer tables do not wrap.
    #[serde(default = "default_terminal_width")]
    pub terminal_width: u32,

    /// PTY rows.
    #[serde(default = "default_terminal_height")]
    pub terminal_height: u32,

    /// Idle seconds before the connection is dropped (default: `timeout_secs`).
    #[serde(default)]
    pub inactivity_timeout_secs: Option<u64>,
}

impl DeviceDescriptor {
    /// Create a descriptor with default port and timeouts and no credentials.
    pub fn new(address: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: default_port(),
            username: username.into(),
            password: None,
            key_path: None,
            key_passphrase: None,
            timeout_secs: default_timeout_secs(),
            banner_timeout_secs: default_timeout_secs(),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            terminal_width: default_terminal_width(),
            terminal_height: default_terminal_height(),
            inactivity_timeout_secs: None,
        }
    }

    /// Set the SSH port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// Set both timeouts.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self.banner_timeout_secs = timeout.as_secs();
        self
    }

    /// Set host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set the PTY size.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set the idle timeout of the SSH connection.
    pub fn inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.banner_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs.unwrap_or(self.timeout_secs))
    }

    /// `address:port`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Resolve which authentication method to use.
    pub fn auth(&self) -> AuthMethod<'_> {
        if let Some(ref path) = self.key_path {
            AuthMethod::PrivateKey {
                path,
                passphrase: self.key_passphrase.as_ref(),
            }
        } else if let Some(ref password) = self.password {
            AuthMethod::Password(password)
        } else {
            AuthMethod::None
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    /// Where the snapshot JSON is written.
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Seconds between collection passes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Regex marking the end of a command's output.
    #[serde(default = "default_terminator")]
    pub terminator: String,

    /// Devices, probed in this order.
    #[serde(default)]
    pub devices: Vec<DeviceDescriptor>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            poll_interval_secs: default_poll_interval_secs(),
            terminator: default_terminator(),
            devices: Vec::new(),
        }
    }
}

impl FleetConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: FleetConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Apply `TOPOLOGY_JSON_PATH` and `POLL_INTERVAL` from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(OUTPUT_PATH_ENV) {
            self.output_path = PathBuf::from(path);
        }
        if let Some(interval) = lookup(POLL_INTERVAL_ENV) {
            self.poll_interval_secs = interval.trim().parse().map_err(|_| ConfigError::Invalid {
                message: format!("{POLL_INTERVAL_ENV} must be whole seconds, got '{interval}'"),
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check the configuration for inconsistencies.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "poll_interval_secs must be greater than zero".to_string(),
            });
        }
        self.terminator_pattern()?;

        for (idx, device) in self.devices.iter().enumerate() {
            if device.address.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("device {idx} has an empty address"),
                });
            }
            if device.username.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: format!("device {} has an empty username", device.address),
                });
            }
            if device.timeout_secs == 0 || device.banner_timeout_secs == 0 {
                return Err(ConfigError::Invalid {
                    message: format!("device {} has a zero timeout", device.address),
                });
            }
            if device.inactivity_timeout_secs == Some(0) {
                return Err(ConfigError::Invalid {
                    message: format!("device {} has a zero inactivity timeout", device.address),
                });
            }
            if device.terminal_width == 0 || device.terminal_height == 0 {
                return Err(ConfigError::Invalid {
                    message: format!("device {} has an empty terminal size", device.address),
                });
            }
            if matches!(device.auth(), AuthMethod::None) {
                warn!("device {} has no password or key configured", device.address);
            }
        }

        if self.devices.is_empty() {
            warn!("device roster is empty; snapshots will be empty");
        }
        Ok(())
    }

    /// Compile the command terminator.
    pub fn terminator_pattern(&self) -> Result<Regex, ConfigError> {
        Ok(Regex::new(&self.terminator)?)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_terminal_width() -> u32 {
    511
}

fn default_terminal_height() -> u32 {
    24
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./static/topology.json")
}

fn default_terminator() -> String {
    r"#\s*$".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    const CONFIG: &str = r#"
output_path = "/var/lib/fleetgraph/topology.json"
poll_interval_secs = 120

[[devices]]
address = "10.105.254.161"
port = 2024
username = "admin"
password = "lab-secret"

[[devices]]
address = "10.105.254.162"
username = "admin"
key_path = "/etc/fleetgraph/id_ed25519"
host_key_verification = "disabled"
"#;

    #[test]
    fn test_parse_config() {
        let config = FleetConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(120));
        assert_eq!(config.devices.len(), 2);

        let first = &config.devices[0];
        assert_eq!(first.socket_addr(), "10.105.254.161:2024");
        assert_eq!(first.command_timeout(), Duration::from_secs(30));
        match first.auth() {
            AuthMethod::Password(p) => assert_eq!(p.expose_secret(), "lab-secret"),
            other => panic!("unexpected auth {other:?}"),
        }

        let second = &config.devices[1];
        assert_eq!(second.port, 22);
        assert_eq!(second.host_key_verification, HostKeyVerification::Disabled);
        assert!(matches!(second.auth(), AuthMethod::PrivateKey { passphrase: None, .. }));
        assert_eq!((second.terminal_width, second.terminal_height), (511, 24));
        assert_eq!(second.idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_session_tuning() {
        let config = FleetConfig::from_toml_str(
            r#"
[[devices]]
address = "10.105.254.163"
username = "admin"
timeout_secs = 10
terminal_width = 200
terminal_height = 50
inactivity_timeout_secs = 300
"#,
        )
        .unwrap();
        let device = &config.devices[0];
        assert_eq!((device.terminal_width, device.terminal_height), (200, 50));
        assert_eq!(device.command_timeout(), Duration::from_secs(10));
        assert_eq!(device.idle_timeout(), Duration::from_secs(300));

        assert!(matches!(
            FleetConfig::from_toml_str(
                "[[devices]]\naddress = \"10.0.0.1\"\nusername = \"admin\"\nterminal_width = 0"
            ),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            FleetConfig::from_toml_str(
                "[[devices]]\naddress = \"10.0.0.1\"\nusername = \"admin\"\ninactivity_timeout_secs = 0"
            ),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_defaults() {
        let config = FleetConfig::from_toml_str("").unwrap();
        assert_eq!(config.output_path, PathBuf::from("./static/topology.json"));
        assert_eq!(config.poll_interval_secs, 60);
        let terminator = config.terminator_pattern().unwrap();
        assert!(terminator.is_match(b"cp-bgl-01# "));
        assert!(!terminator.is_match(b"cp-bgl-01> "));
    }

    #[test]
    fn test_env_overrides() {
        let config = FleetConfig::from_toml_str(CONFIG)
            .unwrap()
            .with_overrides_from(|key| match key {
                OUTPUT_PATH_ENV => Some("/tmp/out.json".to_string()),
                POLL_INTERVAL_ENV => Some("15".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.output_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.poll_interval_secs, 15);
    }

    #[test]
    fn test_bad_interval_override() {
        let err = FleetConfig::default()
            .with_overrides_from(|key| (key == POLL_INTERVAL_ENV).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            FleetConfig::from_toml_str("poll_interval_secs = 0"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            FleetConfig::from_toml_str("terminator = \"(\""),
            Err(ConfigError::InvalidPattern(_))
        ));
        assert!(matches!(
            FleetConfig::from_toml_str("[[devices]]\naddress = \"\"\nusername = \"admin\""),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            FleetConfig::from_toml_str("unknown_key = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_descriptor_builder() {
        let device = DeviceDescriptor::new("192.0.2.10", "ops")
            .port(2024)
            .password("pw")
            .timeout(Duration::from_secs(5))
            .terminal_size(132, 40)
            .inactivity_timeout(Duration::from_secs(90));
        assert_eq!(device.socket_addr(), "192.0.2.10:2024");
        assert_eq!(device.connect_timeout(), Duration::from_secs(5));
        assert_eq!(device.idle_timeout(), Duration::from_secs(90));
        assert_eq!((device.terminal_width, device.terminal_height), (132, 40));
        assert!(matches!(device.auth(), AuthMethod::Password(_)));
    }
}
