//! Client Configuration
//!
//! Limits and timeouts shared by every hop of a fetch.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::NetError;

/// Default `User-Agent` sent with every request
pub const DEFAULT_USER_AGENT: &str = "BarebonesHTTP/1.1";

/// What the dynamic-content check reports when one of its fetches fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Return the fetch error to the caller
    #[default]
    Propagate,
    /// Report the resource as dynamic
    TreatAsDynamic,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// User agent string
    pub user_agent: String,
    /// Max redirects to follow (0 = disable)
    pub max_redirects: u32,
    /// Connection timeout
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    /// Per-read (and per-write) timeout
    #[serde(rename = "read_timeout_ms", with = "duration_ms")]
    pub read_timeout: Duration,
    /// Bytes requested per socket read
    pub receive_buffer_size: usize,
    /// Largest accepted status line + header block
    pub max_header_bytes: usize,
    /// Dynamic check behaviour when a fetch fails
    pub failure_policy: FailurePolicy,
    /// Run the two dynamic-check fetches concurrently
    pub concurrent_check: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.into(),
            max_redirects: 5,
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            receive_buffer_size: 4096,
            max_header_bytes: 1024 * 1024,
            failure_policy: FailurePolicy::Propagate,
            concurrent_check: false,
        }
    }
}

impl ClientConfig {
    /// Load from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json)
            .map_err(|e| NetError::Config(e.to_string()))
    }

    pub(crate) fn receive_buffer_size(&self) -> usize {
        self.receive_buffer_size.max(1)
    }

    pub(crate) fn max_header_bytes(&self) -> usize {
        self.max_header_bytes.max(1)
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.max_redirects, 5);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(10));
        assert_eq!(config.receive_buffer_size, 4096);
        assert_eq!(config.user_agent, "BarebonesHTTP/1.1");
        assert_eq!(config.failure_policy, FailurePolicy::Propagate);
    }

    #[test]
    fn test_config_from_json() {
        let config = ClientConfig::from_json(
            r#"{"max_redirects": 2, "read_timeout_ms": 250, "failure_policy": "treat_as_dynamic"}"#,
        )
        .unwrap();
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.failure_policy, FailurePolicy::TreatAsDynamic);
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = ClientConfig {
            concurrent_check: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"connect_timeout_ms\":10000"));
        assert_eq!(ClientConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_config_rejects_garbage() {
        assert!(ClientConfig::from_json("{\"max_redirects\": -1}").is_err());
    }

    #[test]
    fn test_sizes_clamped() {
        let config = ClientConfig {
            receive_buffer_size: 0,
            max_header_bytes: 0,
            ..Default::default()
        };
        assert_eq!(config.receive_buffer_size(), 1);
        assert_eq!(config.max_header_bytes(), 1);
    }
}
