use castline_core::IceServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_DISCONNECT_GRACE: Duration = Duration::from_secs(10);
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings shared by broadcasters and viewers.
///
/// Durations are written as whole milliseconds in JSON
/// (`"connect_timeout_ms": 15000`); missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastConfig {
    /// Reflection services, tried in order. Empty means host candidates only.
    pub ice_servers: Vec<IceServerConfig>,

    /// How long a viewer waits for inbound media before giving up.
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,

    /// How long the broadcaster keeps a link that has not connected since
    /// its offer went out.
    #[serde(rename = "negotiation_timeout_ms", with = "millis")]
    pub negotiation_timeout: Duration,

    /// How long a disconnected link may stay that way before it is failed.
    #[serde(rename = "disconnect_grace_ms", with = "millis")]
    pub disconnect_grace: Duration,

    /// Capacity of the transport event channel of each actor.
    pub event_buffer: usize,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            ice_servers: IceServerConfig::default_stun(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            negotiation_timeout: DEFAULT_NEGOTIATION_TIMEOUT,
            disconnect_grace: DEFAULT_DISCONNECT_GRACE,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl CastConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Same settings without any reflection service, for loopback use.
    pub fn without_ice_servers(mut self) -> Self {
        self.ice_servers.clear();
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
