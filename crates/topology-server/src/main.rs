//! Cluster topology server.
//!
//! Reads configuration from environment variables (see [`config::Config`]),
//! builds a resource namespace, installs a cluster registry at its root,
//! merges the configured cluster file into it, prints the canonical encoding
//! on stdout, then shuts the namespace down (notify, then close).
//!
//! ## Quick start
//!
//! ```bash
//! TOPOLOGY_CLUSTERS_FILE=./clusters.json \
//! TOPOLOGY_LOG_LEVEL=debug \
//!   cargo run --bin topology-server
//! ```

use std::io;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use topology_registry::{AssetTree, Clusters};

mod config;
mod loader;
use config::Config;

fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────────
    let config = Config::from_env();

    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .compact()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        file    = %config.clusters_file.display(),
        "topology server starting"
    );

    // ── Namespace + registry ──────────────────────────────────────────────────
    let tree = AssetTree::new();
    let clusters: Arc<Clusters> = Arc::new(Clusters::new());
    clusters.install(&tree)?;

    // ── Load, print, shutdown ─────────────────────────────────────────────────
    let served = loader::run_once(
        &tree,
        &clusters,
        &config.clusters_file,
        io::stdout().lock(),
        config.pretty,
    );
    info!("topology server stopped");

    served
}
