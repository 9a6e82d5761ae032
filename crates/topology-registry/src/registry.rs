//! Clusters — the live, name-keyed registry of cluster definitions.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::lifecycle::close_all;
use crate::namespace::AssetTree;
use crate::wire::{RecordReader, RecordWriter};
use crate::{CloseError, Closeable, Cluster, ClusterDefinition, ClusterError, NamespaceError};

// ─────────────────────────────────────────────
// Clusters
// ─────────────────────────────────────────────

/// Thread-safe registry of every known cluster definition.
///
/// Definitions are shared as `Arc<C>`. A record stream merged through
/// [`decode`](Self::decode) mutates existing definitions in place, so any
/// component that already holds one sees the update without looking it up
/// again.
///
/// Lookups and inserts are per-key atomic (`DashMap`); whole-registry passes
/// (encode, close, notify_closing, equality) work on a snapshot sorted by
/// name. Entries added while a pass is running may or may not be part of it.
pub struct Clusters<C: ClusterDefinition = Cluster> {
    clusters: DashMap<String, Arc<C>>,
    closed: AtomicBool,
}

impl<C: ClusterDefinition> Clusters<C> {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self {
            clusters: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Seed a registry from a prior mapping.
    pub fn with_clusters<I>(clusters: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<C>)>,
    {
        Self {
            clusters: clusters.into_iter().collect(),
            closed: AtomicBool::new(false),
        }
    }

    // ── Record stream ────────────────────────────────────────

    /// Merge every record of `reader` into the registry.
    ///
    /// Each record resolves (or atomically creates) the definition named by
    /// the record and merges the body into it. Nothing is ever removed.
    /// On the first structural error the error is returned; records merged
    /// before it stay merged.
    ///
    /// Returns the number of records merged.
    pub fn decode<R>(&self, reader: &mut R) -> Result<usize, ClusterError>
    where
        R: RecordReader + ?Sized,
    {
        self.ensure_open()?;

        let mut merged = 0;
        while reader.has_more() {
            let record = reader.read_record()?;
            let cluster = self.acquire(&record.name);
            cluster.merge_record(&record.body)?;
            merged += 1;
        }
        debug!(records = merged, clusters = self.clusters.len(), "cluster records merged");
        Ok(merged)
    }

    /// Write one record per cluster, in ascending name order.
    ///
    /// Returns the number of records written.
    pub fn encode<W>(&self, writer: &mut W) -> Result<usize, ClusterError>
    where
        W: RecordWriter + ?Sized,
    {
        let snapshot = self.snapshot();
        for (name, cluster) in &snapshot {
            writer.write_record(name, cluster.to_record())?;
        }
        Ok(snapshot.len())
    }

    /// Resolve `name`, creating an empty definition if absent.
    ///
    /// Racing callers on an unseen name all get the same instance.
    fn acquire(&self, name: &str) -> Arc<C> {
        if let Some(existing) = self.clusters.get(name) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .clusters
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(cluster = name, "cluster created");
                Arc::new(C::with_name(name))
            });
        Arc::clone(entry.value())
    }

    // ── Direct access ────────────────────────────────────────

    /// The live definition registered under `name`, shared with every other
    /// holder. Later merges into it are visible through the returned `Arc`.
    pub fn get(&self, name: &str) -> Option<Arc<C>> {
        self.clusters.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Associate `name` with `cluster`, replacing any previous definition.
    ///
    /// The replaced definition is returned, not closed: it may still be in
    /// use elsewhere, and closing it is up to the caller.
    pub fn put(&self, name: impl Into<String>, cluster: Arc<C>) -> Result<Option<Arc<C>>, ClusterError> {
        self.ensure_open()?;
        Ok(self.clusters.insert(name.into(), cluster))
    }

    /// Whether `name` is registered. Does not create the entry.
    pub fn contains(&self, name: &str) -> bool {
        self.clusters.contains_key(name)
    }

    /// Number of registered clusters at this instant.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// `true` when no cluster is registered.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Every cluster name, ascending.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Point-in-time view of every entry, sorted by name.
    pub fn snapshot(&self) -> Vec<(String, Arc<C>)> {
        let mut entries: Vec<(String, Arc<C>)> = self
            .clusters
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    // ── Namespace ────────────────────────────────────────────

    /// Attach this registry as the `Clusters<C>` view of the tree's root.
    pub fn install(self: &Arc<Self>, tree: &AssetTree) -> Result<(), NamespaceError> {
        tree.root().add_view(Arc::clone(self))?;
        info!(clusters = self.len(), "cluster registry installed");
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// `true` once [`Closeable::close`] has started on this registry. Mutation
    /// is refused from then on.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), ClusterError> {
        if self.is_closed() {
            Err(ClusterError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<C: ClusterDefinition> Default for Clusters<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ClusterDefinition> Closeable for Clusters<C> {
    fn notify_closing(&self) {
        let snapshot = self.snapshot();
        debug!(clusters = snapshot.len(), "notifying clusters of shutdown");
        for (_, cluster) in &snapshot {
            cluster.notify_closing();
        }
    }

    /// Close every cluster present now. Failures are collected, never fatal
    /// to the rest of the cascade.
    fn close(&self) -> Result<(), CloseError> {
        self.closed.store(true, Ordering::Release);
        let snapshot = self.snapshot();
        info!(clusters = snapshot.len(), "closing cluster registry");
        close_all(snapshot.iter().map(|(name, cluster)| (name.as_str(), cluster.as_ref())))
    }
}

// ── Structural equality / hash / string form ───────────────────

impl<C: ClusterDefinition + PartialEq> PartialEq for Clusters<C> {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let (ours, theirs) = (self.snapshot(), other.snapshot());
        ours.len() == theirs.len()
            && ours
                .iter()
                .zip(&theirs)
                .all(|((a_name, a), (b_name, b))| a_name == b_name && **a == **b)
    }
}

impl<C: ClusterDefinition + Eq> Eq for Clusters<C> {}

impl<C: ClusterDefinition + Hash> Hash for Clusters<C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let snapshot = self.snapshot();
        snapshot.len().hash(state);
        for (name, cluster) in &snapshot {
            name.hash(state);
            cluster.hash(state);
        }
    }
}

impl<C: ClusterDefinition + fmt::Debug> fmt::Debug for Clusters<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_map()
            .entries(snapshot.iter().map(|(name, cluster)| (name, cluster)))
            .finish()
    }
}

/// Renders the canonical encoding as one JSON object.
impl<C: ClusterDefinition> fmt::Display for Clusters<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut all = Map::new();
        for (name, cluster) in self.snapshot() {
            all.insert(name, cluster.to_record());
        }
        write!(f, "{}", Value::Object(all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostDetails;
    use crate::wire::{JsonRecordReader, JsonRecordWriter, RecordBuffer};
    use serde_json::json;

    fn host_record(host: &str, id: u8) -> Value {
        let mut body = Map::new();
        body.insert(host.to_string(), json!({ "hostId": id, "connectUri": format!("{host}:7001") }));
        Value::Object(body)
    }

    #[test]
    fn decode_creates_and_merges() {
        let clusters: Clusters = Clusters::new();
        let mut records = RecordBuffer::new();
        records.push("east", host_record("h1", 1));
        records.push("west", host_record("h2", 2));
        records.push("east", host_record("h3", 3));

        assert_eq!(clusters.decode(&mut records).unwrap(), 3);
        assert_eq!(clusters.names(), vec!["east", "west"]);
        assert_eq!(clusters.get("east").unwrap().host_count(), 2);
    }

    #[test]
    fn merge_preserves_identity() {
        let clusters: Clusters = Clusters::new();
        let mut first = RecordBuffer::new();
        first.push("east", host_record("h1", 1));
        clusters.decode(&mut first).unwrap();
        let held = clusters.get("east").unwrap();

        let mut second = RecordBuffer::new();
        second.push("east", json!({"h1": {"timeoutMs": 42}}));
        clusters.decode(&mut second).unwrap();

        assert!(Arc::ptr_eq(&held, &clusters.get("east").unwrap()));
        assert_eq!(held.host("h1").unwrap().timeout_ms, 42);
    }

    #[test]
    fn decode_error_keeps_earlier_records() {
        let clusters: Clusters = Clusters::new();
        let input = br#"{"a": {"h": {"hostId": 1}}} {"b": {"h": {"hostId": 2}}} {"c": {"h":"#;
        let mut reader = JsonRecordReader::from_slice(input);

        let err = clusters.decode(&mut reader).unwrap_err();
        assert!(matches!(err, ClusterError::Wire(crate::WireError::Unterminated { .. })));
        assert_eq!(clusters.names(), vec!["a", "b"]);
    }

    #[test]
    fn encode_is_sorted_regardless_of_insertion_order() {
        let clusters: Clusters = Clusters::new();
        for name in ["zeta", "alpha", "mike"] {
            clusters.put(name, Arc::new(Cluster::new(name))).unwrap();
        }
        let mut out = RecordBuffer::new();
        assert_eq!(clusters.encode(&mut out).unwrap(), 3);
        assert_eq!(out.names(), vec!["alpha", "mike", "zeta"]);
    }

    #[test]
    fn encode_is_byte_stable() {
        let build = |order: &[&str]| {
            let clusters: Clusters = Clusters::new();
            for name in order {
                let cluster = Cluster::new(*name);
                cluster.insert_host("h", HostDetails::new(1, "h:1"));
                clusters.put(*name, Arc::new(cluster)).unwrap();
            }
            let mut writer = JsonRecordWriter::new(Vec::new());
            clusters.encode(&mut writer).unwrap();
            writer.into_inner()
        };
        assert_eq!(build(&["b", "c", "a"]), build(&["a", "b", "c"]));
    }

    #[test]
    fn put_replaces_without_closing() {
        let clusters: Clusters = Clusters::new();
        let d1 = Arc::new(Cluster::new("x"));
        let d2 = Arc::new(Cluster::new("x"));

        assert!(clusters.put("x", Arc::clone(&d1)).unwrap().is_none());
        assert!(Arc::ptr_eq(&clusters.get("x").unwrap(), &d1));

        let displaced = clusters.put("x", Arc::clone(&d2)).unwrap().unwrap();
        assert!(Arc::ptr_eq(&displaced, &d1));
        assert!(Arc::ptr_eq(&clusters.get("x").unwrap(), &d2));
        assert_eq!(d1.phase(), crate::Phase::Open);
    }

    #[test]
    fn get_unknown_is_none() {
        let clusters: Clusters = Clusters::new();
        assert!(clusters.get("nope").is_none());
        assert!(!clusters.contains("nope"));
    }

    #[test]
    fn closed_registry_rejects_mutation() {
        let clusters: Clusters = Clusters::new();
        clusters.put("a", Arc::new(Cluster::new("a"))).unwrap();
        clusters.close().unwrap();

        assert!(clusters.is_closed());
        assert!(matches!(clusters.put("b", Arc::new(Cluster::new("b"))), Err(ClusterError::Closed)));
        let mut records = RecordBuffer::new();
        records.push("c", json!({}));
        assert!(matches!(clusters.decode(&mut records), Err(ClusterError::Closed)));
        assert_eq!(records.len(), 1, "closed registry must not consume the stream");
        assert_eq!(clusters.get("a").unwrap().phase(), crate::Phase::Closed);
    }

    #[test]
    fn display_is_canonical_json() {
        let clusters: Clusters = Clusters::new();
        clusters.put("b", Arc::new(Cluster::new("b"))).unwrap();
        clusters.put("a", Arc::new(Cluster::new("a"))).unwrap();
        assert_eq!(clusters.to_string(), r#"{"a":{},"b":{}}"#);
    }

    #[test]
    fn seeded_registry_keeps_entries() {
        let seed = vec![("s".to_string(), Arc::new(Cluster::new("s")))];
        let clusters = Clusters::with_clusters(seed);
        assert_eq!(clusters.len(), 1);
        assert!(!clusters.is_empty());
    }
}
