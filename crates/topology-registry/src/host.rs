//! HostDetails — connection parameters of one host inside a cluster.

use serde::Deserialize;
use serde_json::{json, Value};

/// Default socket buffer size for a host connection (2 MiB).
pub const DEFAULT_TCP_BUFFER_SIZE: usize = 2 << 20;

/// Default connect timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Connection parameters for a single cluster host.
///
/// Hosts are identified by name inside their cluster; `host_id` is the
/// numeric identity used on the wire by replication peers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostDetails {
    pub host_id: u8,
    /// `host:port` to connect to, e.g. `"10.0.1.42:7001"`.
    pub connect_uri: String,
    pub tcp_buffer_size: usize,
    pub timeout_ms: u64,
}

impl Default for HostDetails {
    fn default() -> Self {
        Self {
            host_id: 0,
            connect_uri: String::new(),
            tcp_buffer_size: DEFAULT_TCP_BUFFER_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl HostDetails {
    pub fn new(host_id: u8, connect_uri: impl Into<String>) -> Self {
        Self {
            host_id,
            connect_uri: connect_uri.into(),
            ..Self::default()
        }
    }

    /// Overwrite only the fields the patch carries.
    pub fn apply(&mut self, patch: HostPatch) {
        if let Some(host_id) = patch.host_id {
            self.host_id = host_id;
        }
        if let Some(connect_uri) = patch.connect_uri {
            self.connect_uri = connect_uri;
        }
        if let Some(size) = patch.tcp_buffer_size {
            self.tcp_buffer_size = size;
        }
        if let Some(timeout_ms) = patch.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
    }

    pub fn to_value(&self) -> Value {
        json!({
            "hostId": self.host_id,
            "connectUri": self.connect_uri,
            "tcpBufferSize": self.tcp_buffer_size,
            "timeoutMs": self.timeout_ms,
        })
    }
}

/// Partial host update as it appears in a record body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HostPatch {
    pub host_id: Option<u8>,
    pub connect_uri: Option<String>,
    pub tcp_buffer_size: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl HostPatch {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        // `null` clears nothing; it only creates the host with defaults.
        if value.is_null() {
            return Ok(Self::default());
        }
        HostPatch::deserialize(value)
    }
}
