//! Cluster — the named set of hosts one registry entry describes.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::host::{HostDetails, HostPatch};
use crate::{CloseError, Closeable, WireError};

// ─────────────────────────────────────────────
// ClusterDefinition
// ─────────────────────────────────────────────

/// What the registry needs from a cluster definition.
///
/// Merges go through `&self`: the registry hands out `Arc`s, and every holder
/// must observe a merge without re-resolving the entry. Implementations are
/// responsible for their own field-level synchronisation.
pub trait ClusterDefinition: Closeable + 'static {
    /// An empty definition for `name`.
    fn with_name(name: &str) -> Self
    where
        Self: Sized;

    fn name(&self) -> &str;

    /// Merge one decoded record body into this definition in place.
    fn merge_record(&self, body: &Value) -> Result<(), WireError>;

    /// The record body describing the current state.
    fn to_record(&self) -> Value;
}

// ─────────────────────────────────────────────
// Phase
// ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    /// `notify_closing` has run; still usable.
    Closing,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Open    => write!(f, "open"),
            Phase::Closing => write!(f, "closing"),
            Phase::Closed  => write!(f, "closed"),
        }
    }
}

// ─────────────────────────────────────────────
// Cluster
// ─────────────────────────────────────────────

/// A named cluster and its hosts, sorted by host name.
///
/// Equality and hashing cover the name and hosts; the lifecycle phase is
/// runtime state and is ignored.
pub struct Cluster {
    name: String,
    hosts: RwLock<BTreeMap<String, HostDetails>>,
    phase: RwLock<Phase>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: RwLock::new(BTreeMap::new()),
            phase: RwLock::new(Phase::Open),
        }
    }

    /// Add or replace a host outright.
    pub fn insert_host(&self, name: impl Into<String>, host: HostDetails) -> Option<HostDetails> {
        self.hosts.write().insert(name.into(), host)
    }

    pub fn host(&self, name: &str) -> Option<HostDetails> {
        self.hosts.read().get(name).cloned()
    }

    /// Sorted snapshot of every host.
    pub fn hosts(&self) -> Vec<(String, HostDetails)> {
        self.hosts
            .read()
            .iter()
            .map(|(name, host)| (name.clone(), host.clone()))
            .collect()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.read().len()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    fn invalid(&self, reason: impl fmt::Display) -> WireError {
        WireError::InvalidBody {
            record: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

impl ClusterDefinition for Cluster {
    fn with_name(name: &str) -> Self {
        Cluster::new(name)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn merge_record(&self, body: &Value) -> Result<(), WireError> {
        let entries = match body {
            Value::Null => return Ok(()),
            Value::Object(entries) => entries,
            _ => return Err(self.invalid("expected an object of hosts")),
        };

        // Validate everything first so a bad body changes nothing.
        let mut patches = Vec::with_capacity(entries.len());
        for (host_name, value) in entries {
            let patch = HostPatch::from_value(value)
                .map_err(|e| self.invalid(format!("host '{host_name}': {e}")))?;
            patches.push((host_name, patch));
        }

        let mut hosts = self.hosts.write();
        for (host_name, patch) in patches {
            hosts.entry(host_name.clone()).or_default().apply(patch);
        }
        tracing::debug!(cluster = %self.name, hosts = hosts.len(), "cluster merged");
        Ok(())
    }

    fn to_record(&self) -> Value {
        let hosts = self.hosts.read();
        let mut body = Map::new();
        for (name, host) in hosts.iter() {
            body.insert(name.clone(), host.to_value());
        }
        Value::Object(body)
    }
}

impl Closeable for Cluster {
    fn notify_closing(&self) {
        let mut phase = self.phase.write();
        if *phase == Phase::Open {
            *phase = Phase::Closing;
            tracing::debug!(cluster = %self.name, "cluster closing");
        }
    }

    fn close(&self) -> Result<(), CloseError> {
        // Never hold one of this cluster's locks while taking the other.
        let hosts = self.host_count();
        let mut phase = self.phase.write();
        if *phase != Phase::Closed {
            *phase = Phase::Closed;
            tracing::debug!(cluster = %self.name, hosts, "cluster closed");
        }
        Ok(())
    }
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.name != other.name {
            return false;
        }
        let mine = self.hosts.read().clone();
        mine == *other.hosts.read()
    }
}

impl Eq for Cluster {}

impl Hash for Cluster {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.hosts.read().hash(state);
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hosts = self.hosts.read().clone();
        f.debug_struct("Cluster")
            .field("name", &self.name)
            .field("hosts", &hosts)
            .field("phase", &self.phase())
            .finish()
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.to_record())
    }
}
