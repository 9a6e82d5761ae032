//! # topology-registry
//!
//! The authoritative, live-updatable set of named cluster definitions for a
//! resource-addressing engine:
//!
//! - [`Clusters`] — concurrent registry merged from a record stream, encoded
//!   back in ascending name order
//! - [`Cluster`] — one named cluster and its [`HostDetails`]
//! - [`wire`] — the self-describing record stream ([`JsonRecordReader`],
//!   [`JsonRecordWriter`], [`RecordBuffer`])
//! - [`AssetTree`] — the resource namespace the registry installs itself into
//!
//! ## Design principles
//!
//! - **Merge, never replace**: decoding a record for a known name mutates the
//!   existing definition, so every `Arc` already handed out sees the change.
//! - **Deterministic output**: every whole-registry pass runs over a
//!   name-sorted snapshot; encoding an unchanged registry is byte-stable.
//! - **Two-phase shutdown**: `notify_closing` then `close`, cascaded over a
//!   snapshot, continuing past individual failures.

pub mod cluster;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod namespace;
pub mod registry;
pub mod wire;

pub use cluster::{Cluster, ClusterDefinition, Phase};
pub use error::{CloseError, ClusterError, NamespaceError, WireError};
pub use host::HostDetails;
pub use lifecycle::Closeable;
pub use namespace::{Asset, AssetTree};
pub use registry::Clusters;
pub use wire::{JsonRecordReader, JsonRecordWriter, Record, RecordBuffer, RecordReader, RecordWriter};
