//! Cluster file loading and canonical output.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use topology_registry::{AssetTree, Clusters, JsonRecordReader, JsonRecordWriter};

/// Merge the record stream stored at `path` into `clusters`.
///
/// A missing file is not an error: the registry simply stays as it is.
/// Records before a malformed one stay merged.
pub fn merge_file(clusters: &Clusters, path: &Path) -> anyhow::Result<usize> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "cluster file not found, starting empty");
            return Ok(0);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("cannot open cluster file {}", path.display()));
        }
    };

    let mut reader = JsonRecordReader::new(BufReader::new(file));
    let merged = clusters
        .decode(&mut reader)
        .with_context(|| format!("cannot merge cluster file {}", path.display()))?;
    info!(path = %path.display(), records = merged, clusters = clusters.len(), "cluster file merged");
    Ok(merged)
}

/// Write the canonical encoding of `clusters` to `out`.
pub fn write_canonical<W: Write>(clusters: &Clusters, out: W, pretty: bool) -> anyhow::Result<W> {
    let mut writer = if pretty {
        JsonRecordWriter::pretty(out)
    } else {
        JsonRecordWriter::new(out)
    };
    clusters.encode(&mut writer).context("cannot encode clusters")?;
    Ok(writer.into_inner())
}

/// Load `path` into `clusters`, print the canonical encoding to `out`, then
/// shut `tree` down.
///
/// The shutdown runs whether or not loading or printing failed; the first of
/// those failures is returned afterwards. Shutdown failures are only logged.
pub fn run_once<W: Write>(
    tree: &AssetTree,
    clusters: &Clusters,
    path: &Path,
    out: W,
    pretty: bool,
) -> anyhow::Result<()> {
    let served = merge_file(clusters, path).and_then(|records| {
        for (name, cluster) in clusters.snapshot() {
            info!(cluster = %name, hosts = cluster.host_count(), "cluster ready");
        }
        info!(records, clusters = clusters.len(), "topology loaded");
        write_canonical(clusters, out, pretty).map(|_| ())
    });

    if let Err(e) = tree.shutdown() {
        warn!(error = %e, "namespace shutdown reported failures");
    }
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use topology_registry::{ClusterDefinition, Phase};

    /// A sink whose every write fails, like a closed stdout pipe.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn installed() -> (AssetTree, Arc<Clusters>) {
        let tree = AssetTree::new();
        let clusters = Arc::new(Clusters::new());
        clusters.install(&tree).unwrap();
        (tree, clusters)
    }

    #[test]
    fn merges_file_and_prints_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clusters.json");
        std::fs::write(
            &path,
            r#"{"west": {"w1": {"hostId": 2, "connectUri": "w1:7001"}}}
               {"east": {"e1": {"hostId": 1, "connectUri": "e1:7001"}}}"#,
        )
        .unwrap();

        let clusters = Clusters::new();
        assert_eq!(merge_file(&clusters, &path).unwrap(), 2);

        let out = write_canonical(&clusters, Vec::new(), false).unwrap();
        let text = String::from_utf8(out).unwrap();
        let names: Vec<&str> = text.lines().map(|l| &l[2..6]).collect();
        assert_eq!(names, vec!["east", "west"]);
    }

    #[test]
    fn missing_file_leaves_registry_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let clusters = Clusters::new();
        assert_eq!(merge_file(&clusters, &dir.path().join("absent.json")).unwrap(), 0);
        assert!(clusters.is_empty());
    }

    #[test]
    fn malformed_file_reports_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"ok": {}} {"broken": "#).unwrap();

        let clusters = Clusters::new();
        let err = merge_file(&clusters, &path).unwrap_err();
        assert!(format!("{err:#}").contains("broken.json"));
        assert!(clusters.contains("ok"));
    }

    #[test]
    fn failed_write_still_shuts_down() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clusters.json");
        std::fs::write(&path, r#"{"east": {"e1": {"hostId": 1}}}"#).unwrap();

        let (tree, clusters) = installed();
        let err = run_once(&tree, &clusters, &path, BrokenPipe, false).unwrap_err();
        assert!(format!("{err:#}").contains("stdout closed"));

        assert!(clusters.is_closed());
        assert_eq!(clusters.get("east").unwrap().phase(), Phase::Closed);
    }

    #[test]
    fn failed_load_still_shuts_down() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"ok": {}} [1]"#).unwrap();

        let (tree, clusters) = installed();
        let mut out = Vec::new();
        assert!(run_once(&tree, &clusters, &path, &mut out, false).is_err());
        assert!(out.is_empty(), "nothing printed after a failed load");
        assert!(clusters.is_closed());
        assert_eq!(clusters.get("ok").unwrap().phase(), Phase::Closed);
    }

    #[test]
    fn clean_run_prints_then_closes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("clusters.json");
        std::fs::write(&path, r#"{"west": {}} {"east": {}}"#).unwrap();

        let (tree, clusters) = installed();
        let mut out = Vec::new();
        run_once(&tree, &clusters, &path, &mut out, false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"east\":{}}\n{\"west\":{}}\n");
        assert!(clusters.snapshot().iter().all(|(_, c)| c.phase() == Phase::Closed));
        assert_eq!(clusters.get("east").unwrap().name(), "east");
    }
}
