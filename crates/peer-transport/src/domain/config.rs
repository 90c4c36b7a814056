//! Transport configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use super::headers::{ProtocolHeaders, MAX_MAGIC_LEN, MAX_OS_LEN, MAX_VERSION_LEN};

/// Main transport configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TransportConfig {
    /// Peer-facing HTTP server
    pub http: HttpConfig,
    /// Identity advertised in protocol headers
    pub protocol: ProtocolConfig,
    /// Outbound requests, gossip fan-out and peer penalties
    pub peers: PeersConfig,
    /// Transaction admission
    pub admission: AdmissionConfig,
    /// Consensus slot timing
    pub slots: SlotConfig,
    /// Block sync endpoint
    pub blocks: BlocksConfig,
}

impl TransportConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let protocol = &self.protocol;
        if protocol.magic.is_empty() || protocol.magic.chars().count() > MAX_MAGIC_LEN {
            return Err(ConfigError::InvalidProtocol(format!(
                "magic must be 1..={MAX_MAGIC_LEN} characters"
            )));
        }
        if protocol.version.is_empty() || protocol.version.chars().count() > MAX_VERSION_LEN {
            return Err(ConfigError::InvalidProtocol(format!(
                "version must be 1..={MAX_VERSION_LEN} characters"
            )));
        }
        if protocol.os.chars().count() > MAX_OS_LEN {
            return Err(ConfigError::InvalidProtocol(format!(
                "os must be at most {MAX_OS_LEN} characters"
            )));
        }

        if self.http.port == 0 {
            return Err(ConfigError::InvalidLimit("http.port cannot be 0".into()));
        }
        if self.http.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "http.max_body_bytes cannot be 0".into(),
            ));
        }

        if self.peers.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "peers.request_timeout cannot be 0".into(),
            ));
        }
        if self.peers.broadcast_limit == 0 || self.peers.broadcast_concurrency == 0 {
            return Err(ConfigError::InvalidLimit(
                "broadcast limit and concurrency must be at least 1".into(),
            ));
        }

        if self.admission.invalid_cache_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "admission.invalid_cache_capacity cannot be 0".into(),
            ));
        }
        if self.slots.interval_secs == 0 {
            return Err(ConfigError::InvalidTimeout(
                "slots.interval_secs cannot be 0".into(),
            ));
        }
        if self.blocks.max_per_request == 0 {
            return Err(ConfigError::InvalidLimit(
                "blocks.max_per_request cannot be 0".into(),
            ));
        }
        Ok(())
    }

    /// Address the peer-facing server binds to.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// The headers this node stamps on every request and response.
    pub fn protocol_headers(&self) -> ProtocolHeaders {
        ProtocolHeaders {
            os: self.protocol.os.clone(),
            version: self.protocol.version.clone(),
            port: self.http.port,
            magic: self.protocol.magic.clone(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 4096), also advertised in the `port` header
    pub port: u16,
    /// Maximum accepted request body
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4096,
            max_body_bytes: 8 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Network identifier; requests carrying another magic are refused
    pub magic: String,
    pub version: String,
    pub os: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            magic: "594fe0f3".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
        }
    }
}

/// Outbound requests and peer penalties
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Peers sampled per broadcast
    pub broadcast_limit: usize,
    /// Outbound requests in flight per broadcast
    pub broadcast_concurrency: usize,
    /// Peers returned by `GET /peer/list`
    pub list_limit: usize,
    /// Ban applied when an outbound request fails
    #[serde(with = "duration_serde")]
    pub failure_ban: Duration,
    /// Ban applied when a peer pushes an undecodable block or transaction
    #[serde(with = "duration_serde")]
    pub malformed_ban: Duration,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(4),
            broadcast_limit: 20,
            broadcast_concurrency: 5,
            list_limit: 100,
            failure_ban: Duration::from_secs(600),
            malformed_ban: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Transactions are refused once the chain tip is this many slots behind
    pub max_slot_lag: u64,
    /// Capacity of the rejected-transaction cache
    pub invalid_cache_capacity: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_slot_lag: 12,
            invalid_cache_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    /// Chain epoch as unix seconds (2016-06-27T20:00:00Z)
    pub epoch_unix_secs: u64,
    pub interval_secs: u64,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            epoch_unix_secs: 1_467_057_600,
            interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlocksConfig {
    pub max_per_request: usize,
}

impl Default for BlocksConfig {
    fn default() -> Self {
        Self {
            max_per_request: 200,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {error}")]
    Io { path: String, error: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid protocol identity: {0}")]
    InvalidProtocol(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

/// Duration (de)serialization as `"4s"`, `"500ms"`, `"10m"` or plain seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Secs(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.http.port, 4096);
        assert_eq!(config.peers.broadcast_limit, 20);
        assert_eq!(config.peers.broadcast_concurrency, 5);
        assert_eq!(config.peers.failure_ban, Duration::from_secs(600));
        assert_eq!(config.admission.max_slot_lag, 12);
        assert_eq!(config.blocks.max_per_request, 200);
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = TransportConfig::from_toml_str(
            r#"
            [http]
            port = 5000

            [protocol]
            magic = "abcd1234"
            version = "2.1.0"

            [peers]
            request_timeout = "1500ms"
            failure_ban = "10m"
            malformed_ban = 7200
            "#,
        )
        .unwrap();

        assert_eq!(config.http.port, 5000);
        assert_eq!(config.protocol.magic, "abcd1234");
        assert_eq!(config.peers.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.peers.failure_ban, Duration::from_secs(600));
        assert_eq!(config.peers.malformed_ban, Duration::from_secs(7200));
        // untouched sections keep their defaults
        assert_eq!(config.peers.broadcast_limit, 20);
        assert_eq!(config.slots.interval_secs, 10);

        let headers = config.protocol_headers();
        assert_eq!(headers.port, 5000);
        assert_eq!(headers.version, "2.1.0");
    }

    #[test]
    fn test_magic_too_long() {
        let result = TransportConfig::from_toml_str("[protocol]\nmagic = \"123456789\"\n");
        assert!(matches!(result, Err(ConfigError::InvalidProtocol(_))));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut config = TransportConfig::default();
        config.peers.broadcast_concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLimit(_))));

        let mut config = TransportConfig::default();
        config.peers.request_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            TransportConfig::from_toml_str("[http\nport = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            TransportConfig::load("/nonexistent/transport.toml"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_parse_duration_formats() {
        use duration_serde::parse_duration;
        assert_eq!(parse_duration("4s"), Ok(Duration::from_secs(4)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("2m"), Ok(Duration::from_secs(120)));
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
        assert!(parse_duration("soon").is_err());
    }
}
